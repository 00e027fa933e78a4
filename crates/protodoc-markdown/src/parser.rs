//! Authored page parser.

use std::collections::HashSet;

use pulldown_cmark::{Event, Parser, Tag, TagEnd};

use crate::frontmatter::{extract_frontmatter, Frontmatter, FrontmatterError};
use crate::render::options;

/// A parsed authored page.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// Parsed frontmatter (if present)
    pub frontmatter: Option<Frontmatter>,

    /// Markdown content (without frontmatter)
    pub content: String,

    /// Table of contents entries
    pub toc: Vec<TocEntry>,
}

impl ParsedPage {
    /// Declared title, else the first heading.
    pub fn title(&self) -> Option<&str> {
        self.frontmatter
            .as_ref()
            .and_then(|f| f.title.as_deref())
            .or_else(|| self.toc.first().map(|e| e.title.as_str()))
    }

    /// Declared ordering hint.
    pub fn order(&self) -> Option<i32> {
        self.frontmatter.as_ref().and_then(|f| f.order)
    }
}

/// A table of contents entry.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TocEntry {
    /// Heading text
    pub title: String,
    /// Anchor ID
    pub id: String,
    /// Heading level (1-6)
    pub level: u8,
}

/// Errors that can occur when parsing a page.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Frontmatter error: {0}")]
    Frontmatter(#[from] FrontmatterError),
}

/// Parse an authored page.
///
/// Extracts frontmatter and generates a table of contents.
pub fn parse_page(source: &str) -> Result<ParsedPage, ParseError> {
    let (frontmatter, content) = extract_frontmatter(source)?;

    let events: Vec<_> = Parser::new_ext(content, options()).collect();
    let toc = headings(&events);

    Ok(ParsedPage {
        frontmatter,
        content: content.to_string(),
        toc,
    })
}

/// Every heading of a document with its anchor, in document order.
///
/// Repeated slugs get `-2`, `-3`, ... so anchors stay unique.
pub(crate) fn headings(events: &[Event<'_>]) -> Vec<TocEntry> {
    let mut used = HashSet::new();
    let mut toc = Vec::new();
    let mut current_heading: Option<(u8, String)> = None; // (level, text)

    for event in events {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current_heading = Some((*level as u8, String::new()));
            }

            Event::Text(text) | Event::Code(text) => {
                if let Some((_, ref mut heading_text)) = current_heading {
                    heading_text.push_str(text);
                }
            }

            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, title)) = current_heading.take() {
                    let id = unique_anchor(&mut used, &title);
                    toc.push(TocEntry { title, id, level });
                }
            }

            _ => {}
        }
    }

    toc
}

fn unique_anchor(used: &mut HashSet<String>, title: &str) -> String {
    let base = match slugify(title) {
        slug if slug.is_empty() => "section".to_string(),
        slug => slug,
    };

    let mut id = base.clone();
    let mut n = 1;
    while !used.insert(id.clone()) {
        n += 1;
        id = format!("{}-{}", base, n);
    }
    id
}

/// Convert a heading to a URL-safe slug.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_page() {
        let source = r#"---
title: Introduction
order: 1
---

# Intro

Welcome.

## Installing `protodoc`

Run the installer.
"#;

        let page = parse_page(source).unwrap();

        assert_eq!(page.title(), Some("Introduction"));
        assert_eq!(page.order(), Some(1));
        assert_eq!(page.toc.len(), 2);
        assert_eq!(page.toc[0].title, "Intro");
        assert_eq!(page.toc[0].level, 1);
        assert_eq!(page.toc[1].title, "Installing protodoc");
        assert_eq!(page.toc[1].id, "installing-protodoc");
        assert_eq!(page.toc[1].level, 2);
    }

    #[test]
    fn title_falls_back_to_first_heading() {
        let page = parse_page("# Just Markdown\n\nNo frontmatter.").unwrap();

        assert!(page.frontmatter.is_none());
        assert_eq!(page.title(), Some("Just Markdown"));
        assert_eq!(page.order(), None);
    }

    #[test]
    fn untitled_page_has_no_title() {
        let page = parse_page("Plain paragraph.").unwrap();
        assert_eq!(page.title(), None);
    }

    #[test]
    fn reports_bad_frontmatter() {
        assert!(matches!(
            parse_page("---\ntitle: x\n"),
            Err(ParseError::Frontmatter(FrontmatterError::Unclosed))
        ));
    }

    #[test]
    fn repeated_headings_get_distinct_anchors() {
        let page = parse_page("# Usage\n\n## Usage\n\n## Usage 2\n\n## Usage\n\n## !!!").unwrap();

        let ids: Vec<_> = page.toc.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["usage", "usage-2", "usage-2-2", "usage-3", "section"]);
    }

    #[test]
    fn slugify_works() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("API Reference"), "api-reference");
        assert_eq!(slugify("Button (Primary)"), "button-primary");
        assert_eq!(slugify("  Multiple   Spaces  "), "multiple-spaces");
    }
}
