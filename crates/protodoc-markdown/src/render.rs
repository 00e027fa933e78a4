//! Markdown to HTML rendering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex, OnceLock};

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

use crate::parser::headings;

/// Largest input accepted by default (1 MiB).
pub const DEFAULT_MAX_INPUT_LEN: usize = 1024 * 1024;

const UNSAFE_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:"];

// Shortest prefix ending in a sentence terminator
static SENTENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*?[.!?](?:\s|$)").expect("Invalid sentence regex")
});

/// Errors for input the renderer refuses to process.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("Control character at byte {offset}")]
    ControlCharacter { offset: usize },

    #[error("Input of {len} bytes exceeds limit of {limit}")]
    TooLarge { len: usize, limit: usize },
}

/// Output of rendering one comment.
#[derive(Debug, Default)]
struct Rendered {
    html: String,
    summary: String,
}

/// Renders markdown comments to sanitized HTML.
///
/// Results are cached by source text, so a comment shared by the index and a
/// detail document is only rendered once per run. Concurrent callers asking
/// for the same text wait for the first render instead of repeating it.
#[derive(Debug)]
pub struct MarkdownRenderer {
    max_input_len: usize,
    cache: Mutex<HashMap<String, Arc<OnceLock<Rendered>>>>,
    renders: AtomicUsize,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self::with_max_input_len(DEFAULT_MAX_INPUT_LEN)
    }

    pub fn with_max_input_len(max_input_len: usize) -> Self {
        Self {
            max_input_len,
            cache: Mutex::new(HashMap::new()),
            renders: AtomicUsize::new(0),
        }
    }

    /// Render markdown to an HTML fragment, or an empty string if the input
    /// is rejected.
    pub fn render(&self, source: &str) -> String {
        self.with_rendered(source, |r| r.html.clone())
    }

    /// Render an optional comment; absent comments render empty.
    pub fn render_opt(&self, source: Option<&str>) -> String {
        source.map(|s| self.render(s)).unwrap_or_default()
    }

    /// Plain-text first sentence of the rendered comment.
    pub fn summary(&self, source: &str) -> String {
        self.with_rendered(source, |r| r.summary.clone())
    }

    pub fn summary_opt(&self, source: Option<&str>) -> String {
        source.map(|s| self.summary(s)).unwrap_or_default()
    }

    /// Render without caching or degradation.
    ///
    /// Headings carry the same `id` anchors that [`crate::parse_page`]
    /// records in the table of contents.
    pub fn try_render(&self, source: &str) -> Result<String, RenderError> {
        self.check(source)?;

        let mut events: Vec<_> = Parser::new_ext(source, options()).collect();
        let mut anchors = headings(&events).into_iter().map(|entry| entry.id);
        for event in &mut events {
            if let Event::Start(Tag::Heading { id, .. }) = event {
                *id = anchors.next().map(CowStr::from);
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, sanitize(events.into_iter()));
        Ok(html_output)
    }

    /// Number of distinct sources rendered so far.
    pub fn cached(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Number of renders actually performed (cache misses).
    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::Relaxed)
    }

    fn check(&self, source: &str) -> Result<(), RenderError> {
        if source.len() > self.max_input_len {
            return Err(RenderError::TooLarge {
                len: source.len(),
                limit: self.max_input_len,
            });
        }
        if let Some((offset, _)) = source
            .char_indices()
            .find(|(_, c)| c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r'))
        {
            return Err(RenderError::ControlCharacter { offset });
        }
        Ok(())
    }

    fn with_rendered<T>(&self, source: &str, f: impl FnOnce(&Rendered) -> T) -> T {
        let slot = match self.cache.lock() {
            Ok(mut cache) => match cache.get(source) {
                Some(slot) => Arc::clone(slot),
                None => Arc::clone(cache.entry(source.to_string()).or_default()),
            },
            // Poisoned cache: render without it
            Err(_) => Arc::new(OnceLock::new()),
        };

        f(slot.get_or_init(|| self.render_uncached(source)))
    }

    fn render_uncached(&self, source: &str) -> Rendered {
        self.renders.fetch_add(1, Ordering::Relaxed);
        match self.try_render(source) {
            Ok(html) => Rendered {
                html,
                summary: first_sentence(&plain_text(source)),
            },
            Err(e) => {
                tracing::warn!("Rendering comment as empty: {}", e);
                Rendered::default()
            }
        }
    }
}

pub(crate) fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
}

/// Escape raw HTML and neutralise script-capable link targets.
fn sanitize<'a>(events: impl Iterator<Item = Event<'a>>) -> impl Iterator<Item = Event<'a>> {
    events.map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        other => other,
    })
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let lower = url.trim_start().to_ascii_lowercase();
    if UNSAFE_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

/// Text content of the rendered markdown, whitespace collapsed.
fn plain_text(source: &str) -> String {
    let mut text = String::new();
    for event in Parser::new_ext(source, options()) {
        match event {
            Event::Text(t) | Event::Code(t) | Event::Html(t) | Event::InlineHtml(t) => {
                text.push_str(&t)
            }
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item) => text.push(' '),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_sentence(text: &str) -> String {
    match SENTENCE_RE.find(text) {
        Some(m) => m.as_str().trim_end().to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_basic_markdown() {
        let renderer = MarkdownRenderer::new();

        let html = renderer.render("Hello **world**");

        assert_eq!(html, "<p>Hello <strong>world</strong></p>\n");
    }

    #[test]
    fn escapes_raw_html() {
        let renderer = MarkdownRenderer::new();

        let html = renderer.render("Click <script>alert(1)</script> here");

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn neutralises_script_links() {
        let renderer = MarkdownRenderer::new();

        let html = renderer.render("[x](javascript:alert(1)) and [y](https://example.com)");

        assert!(html.contains(r##"<a href="#">x</a>"##));
        assert!(html.contains(r#"<a href="https://example.com">y</a>"#));
    }

    #[test]
    fn rejects_control_characters() {
        let renderer = MarkdownRenderer::new();

        assert_eq!(
            renderer.try_render("ok\u{0}bad"),
            Err(RenderError::ControlCharacter { offset: 2 })
        );
        assert_eq!(renderer.render("ok\u{0}bad"), "");
        assert_eq!(renderer.summary("ok\u{0}bad"), "");
    }

    #[test]
    fn rejects_oversized_input() {
        let renderer = MarkdownRenderer::with_max_input_len(4);

        assert!(matches!(
            renderer.try_render("too long"),
            Err(RenderError::TooLarge { len: 8, limit: 4 })
        ));
        assert_eq!(renderer.render("too long"), "");
    }

    #[test]
    fn summarises_first_sentence() {
        let renderer = MarkdownRenderer::new();

        assert_eq!(
            renderer.summary("A *user* account. Holds v1.2 credentials."),
            "A user account."
        );
        assert_eq!(renderer.summary("No terminator"), "No terminator");
        assert_eq!(renderer.summary("Multi\nline text! Rest"), "Multi line text!");
        assert_eq!(renderer.summary_opt(None), "");
    }

    #[test]
    fn caches_by_source() {
        let renderer = MarkdownRenderer::new();

        renderer.render("same");
        renderer.summary("same");
        renderer.render("other");

        assert_eq!(renderer.cached(), 2);
        assert_eq!(renderer.renders(), 2);
    }

    #[test]
    fn headings_carry_toc_anchors() {
        let renderer = MarkdownRenderer::new();
        let page = crate::parse_page("# Guide\n\n## Install steps\n\ntext\n\n## Install steps").unwrap();

        let html = renderer.render(&page.content);

        assert!(html.starts_with(r#"<h1 id="guide">Guide</h1>"#));
        for entry in &page.toc {
            assert!(
                html.contains(&format!(r#"id="{}""#, entry.id)),
                "missing anchor {}",
                entry.id
            );
        }
        assert_eq!(page.toc[2].id, "install-steps-2");
    }

    #[test]
    fn concurrent_callers_share_one_render() {
        let renderer = MarkdownRenderer::new();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    assert_eq!(renderer.render("Shared *comment*."), "<p>Shared <em>comment</em>.</p>\n");
                    assert_eq!(renderer.summary("Shared *comment*."), "Shared comment.");
                });
            }
        });

        assert_eq!(renderer.cached(), 1);
        assert_eq!(renderer.renders(), 1);
    }
}
