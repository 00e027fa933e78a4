//! Authored pages and the navigation tree.
//!
//! Pages are discovered under the pages root, placed at the tree position
//! mirroring their relative path, and merged with the reference entries,
//! which hang under their own `reference` subtree.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use walkdir::WalkDir;

use protodoc_markdown::{parse_page, ParsedPage, TocEntry};
use protodoc_model::{DocumentKind, SchemaRegistry};

use crate::builder::BuildError;
use crate::stage::{BuildContext, Stage, StageReport};
use crate::tree::{capitalize, NodeKind, Origin, PageTree, TreeNode};

/// Output subtree for authored pages and the tree document.
pub const PAGES_NAMESPACE: &str = "pages";

/// Tree-shape document. Page stems starting with `_` are reserved, so no
/// authored page can land here.
pub const TREE_DOCUMENT: &str = "pages/_tree.json";

const PAGE_EXTENSIONS: &[&str] = &["md", "markdown"];

/// An authored page read from the pages root.
#[derive(Debug)]
pub struct SourcePage {
    /// Relative path without extension, `/`-separated; for `index` pages the
    /// path of the section they describe (empty for the root)
    pub id: String,

    /// Path segments without extension
    pub segments: Vec<String>,

    /// Whether this is the body of a section (`index.md`)
    pub is_index: bool,

    pub parsed: ParsedPage,
}

impl SourcePage {
    /// Relative URL of the page's JSON document.
    pub fn document_path(&self) -> String {
        match (self.is_index, self.id.is_empty()) {
            (true, true) => format!("{}/index.json", PAGES_NAMESPACE),
            (true, false) => format!("{}/{}/index.json", PAGES_NAMESPACE, self.id),
            (false, _) => format!("{}/{}.json", PAGES_NAMESPACE, self.id),
        }
    }

    fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    fn dirs(&self) -> &[String] {
        &self.segments[..self.segments.len().saturating_sub(1)]
    }

    fn title(&self) -> String {
        self.parsed
            .title()
            .map(str::to_string)
            .unwrap_or_else(|| self.name().to_string())
    }

    fn in_nav(&self) -> bool {
        self.parsed.frontmatter.as_ref().map_or(true, |f| f.nav)
    }

    fn declared_parent(&self) -> Option<&str> {
        self.parsed
            .frontmatter
            .as_ref()
            .and_then(|f| f.parent.as_deref())
    }
}

#[derive(Debug, Serialize)]
struct PageView<'a> {
    id: &'a str,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    content: String,
    toc: &'a [TocEntry],
}

/// Writes every authored page body and the navigation tree.
pub struct PagesStage;

impl Stage for PagesStage {
    fn name(&self) -> &'static str {
        "pages"
    }

    fn compile(&self, ctx: &BuildContext<'_>) -> Result<StageReport, BuildError> {
        let sources = match ctx.pages_dir {
            Some(dir) => discover_pages(dir),
            None => Vec::new(),
        };

        let tree = build_tree(ctx.title, &sources, ctx.registry)?;

        for page in &sources {
            let view = PageView {
                id: &page.id,
                title: page.title(),
                description: page
                    .parsed
                    .frontmatter
                    .as_ref()
                    .and_then(|f| f.description.as_deref()),
                content: ctx.markdown.render(&page.parsed.content),
                toc: &page.parsed.toc,
            };
            ctx.output.write_json(&page.document_path(), &view)?;
        }

        ctx.output.write_json(TREE_DOCUMENT, &tree.to_view())?;

        tracing::info!(
            "Built navigation with {} nodes from {} pages",
            tree.len(),
            sources.len()
        );

        Ok(StageReport {
            documents: 1,
            pages: sources.len(),
        })
    }
}

/// Discover authored pages in path order.
///
/// Unreadable or unparsable pages are reported and skipped; a broken
/// `index.md` also drops the rest of its section.
pub fn discover_pages(pages_dir: &Path) -> Vec<SourcePage> {
    if !pages_dir.exists() {
        tracing::info!("No pages directory at {}", pages_dir.display());
        return Vec::new();
    }

    let mut pages = Vec::new();
    let mut failed_sections = Vec::new();

    let walker = WalkDir::new(pages_dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_reserved(e.file_name().to_str()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable pages entry: {}", e);
                continue;
            }
        };
        let path = entry.path();

        if !entry.file_type().is_file() {
            continue;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !PAGE_EXTENSIONS.contains(&ext) {
            continue;
        }

        let relative = path.strip_prefix(pages_dir).unwrap_or(path);
        let Some(segments) = page_segments(relative) else {
            tracing::warn!("Skipping page with non UTF-8 path: {}", path.display());
            continue;
        };

        let is_index = segments.last().map(String::as_str) == Some("index");
        let id = if is_index {
            segments[..segments.len() - 1].join("/")
        } else {
            segments.join("/")
        };

        let parsed = match fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|source| parse_page(&source).map_err(|e| e.to_string()))
        {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Skipping page {}: {}", path.display(), e);
                if is_index && !id.is_empty() {
                    failed_sections.push(id);
                }
                continue;
            }
        };

        pages.push(SourcePage {
            id,
            segments,
            is_index,
            parsed,
        });
    }

    if !failed_sections.is_empty() {
        pages.retain(|page| {
            !failed_sections
                .iter()
                .any(|section| page.id == *section || page.id.starts_with(&format!("{}/", section)))
        });
    }

    pages
}

/// Merge authored pages and reference entries into one sorted tree.
pub fn build_tree(
    title: &str,
    sources: &[SourcePage],
    registry: &SchemaRegistry<'_>,
) -> Result<PageTree, BuildError> {
    let mut tree = PageTree::new(title);
    let mut section_bodies = HashSet::new();

    for page in sources {
        if page.is_index {
            if !section_bodies.insert(page.id.as_str()) {
                return Err(BuildError::DuplicatePage {
                    parent: page.id.clone(),
                    id: "index".to_string(),
                });
            }
            let index = ensure_section(&mut tree, page.dirs())?;
            let node = tree.node_mut(index);
            node.document = Some(page.document_path());
            // The root keeps the site title
            if index == PageTree::ROOT {
                continue;
            }
            if let Some(title) = page.parsed.title() {
                node.title = title.to_string();
            }
            node.order = page.parsed.order();
        } else if page.in_nav() {
            let parent = ensure_section(&mut tree, page.dirs())?;
            tree.add_child(
                parent,
                TreeNode::new(NodeKind::Page, &page.id, page.name(), page.title())
                    .with_order(page.parsed.order())
                    .with_document(page.document_path()),
            )?;
        }
    }

    for page in sources.iter().filter(|p| !p.is_index && p.in_nav()) {
        let Some(declared) = page.declared_parent() else {
            continue;
        };
        let target = declared.trim_matches('/');
        let section = if target.is_empty() {
            Some(PageTree::ROOT)
        } else {
            tree.find(Origin::Page, target)
                .filter(|&i| tree.node(i).kind == NodeKind::Section)
        };
        match (section, tree.find(Origin::Page, &page.id)) {
            (Some(section), Some(index)) => tree.move_to(index, section)?,
            _ => tracing::warn!(
                "Page {} declares unknown parent '{}', keeping it in place",
                page.id,
                declared
            ),
        }
    }

    graft_reference(&mut tree, registry)?;
    tree.sort();

    Ok(tree)
}

/// Section node for `dirs`, creating missing levels.
fn ensure_section(tree: &mut PageTree, dirs: &[String]) -> Result<usize, BuildError> {
    let mut current = PageTree::ROOT;

    for (depth, dir) in dirs.iter().enumerate() {
        current = match tree.child_named(current, Origin::Page, dir) {
            Some(existing) if tree.node(existing).kind == NodeKind::Section => existing,
            Some(existing) => {
                return Err(BuildError::DuplicatePage {
                    parent: tree.node(current).id.clone(),
                    id: tree.node(existing).id.clone(),
                })
            }
            None => tree.add_child(
                current,
                TreeNode::new(
                    NodeKind::Section,
                    dirs[..=depth].join("/"),
                    dir.as_str(),
                    capitalize(dir),
                ),
            )?,
        };
    }

    Ok(current)
}

fn graft_reference(tree: &mut PageTree, registry: &SchemaRegistry<'_>) -> Result<(), BuildError> {
    let root = tree.add_child(
        PageTree::ROOT,
        TreeNode::new(NodeKind::ReferenceRoot, "reference", "reference", "API Reference"),
    )?;

    for (position, kind) in DocumentKind::ALL.iter().enumerate() {
        let mut entries = registry.entries_of(*kind).peekable();
        if entries.peek().is_none() {
            continue;
        }

        let group = tree.add_child(
            root,
            TreeNode::new(
                NodeKind::ReferenceGroup,
                format!("reference/{}", kind),
                kind.as_str(),
                group_title(*kind),
            )
            .with_order(Some(position as i32)),
        )?;

        for entry in entries {
            tree.add_child(
                group,
                TreeNode::new(
                    NodeKind::Reference,
                    format!("reference/{}/{}", kind, entry.qualified_name),
                    entry.qualified_name.as_str(),
                    entry.qualified_name.as_str(),
                )
                .with_document(entry.document_path()),
            )?;
        }
    }

    Ok(())
}

fn group_title(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Proto => "Files",
        DocumentKind::Message => "Messages",
        DocumentKind::Enum => "Enums",
        DocumentKind::Service => "Services",
    }
}

fn is_reserved(name: Option<&str>) -> bool {
    name.map_or(true, |n| n.starts_with('_') || n.starts_with('.'))
}

/// Relative path segments with the extension stripped from the last one.
fn page_segments(relative: &Path) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    if let Some(parent) = relative.parent() {
        for component in parent.components() {
            segments.push(component.as_os_str().to_str()?.to_string());
        }
    }
    segments.push(relative.file_stem()?.to_str()?.to_string());
    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use protodoc_model::{Message, Module, ProtoFile};
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn titles(tree: &PageTree, index: usize) -> Vec<String> {
        tree.node(index)
            .children()
            .iter()
            .map(|&c| tree.node(c).title.clone())
            .collect()
    }

    fn empty_module() -> Module {
        Module::new("m", "dist")
    }

    #[test]
    fn discovers_pages_in_path_order() {
        let temp = tempdir().unwrap();
        write(temp.path(), "guide/setup.md", "# Setup");
        write(temp.path(), "guide/intro.md", "# Intro");
        write(temp.path(), "index.md", "# Home");
        write(temp.path(), "notes.txt", "ignored");
        write(temp.path(), "_draft.md", "# Draft");
        write(temp.path(), ".hidden/secret.md", "# Secret");

        let pages = discover_pages(temp.path());
        let ids: Vec<_> = pages.iter().map(|p| (p.id.as_str(), p.is_index)).collect();

        assert_eq!(
            ids,
            vec![("guide/intro", false), ("guide/setup", false), ("", true)]
        );
        assert_eq!(pages[0].document_path(), "pages/guide/intro.json");
        assert_eq!(pages[2].document_path(), "pages/index.json");
    }

    #[test]
    fn skips_unparsable_page() {
        let temp = tempdir().unwrap();
        write(temp.path(), "broken.md", "---\ntitle: [oops\n---\n");
        write(temp.path(), "fine.md", "# Fine");

        let pages = discover_pages(temp.path());

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].id, "fine");
    }

    #[test]
    fn broken_section_index_drops_its_subtree() {
        let temp = tempdir().unwrap();
        write(temp.path(), "guide/index.md", "---\nunclosed");
        write(temp.path(), "guide/intro.md", "# Intro");
        write(temp.path(), "other.md", "# Other");

        let pages = discover_pages(temp.path());
        let ids: Vec<_> = pages.iter().map(|p| p.id.as_str()).collect();

        assert_eq!(ids, vec!["other"]);
    }

    #[test]
    fn missing_pages_dir_yields_nothing() {
        let temp = tempdir().unwrap();
        assert!(discover_pages(&temp.path().join("nope")).is_empty());
    }

    #[test]
    fn builds_sections_in_declared_order() {
        let temp = tempdir().unwrap();
        write(
            temp.path(),
            "guide/index.md",
            "---\ntitle: User Guide\norder: 1\n---\n",
        );
        write(temp.path(), "guide/setup.md", "---\norder: 2\n---\n# Setup");
        write(temp.path(), "guide/intro.md", "---\norder: 1\n---\n# Intro");
        write(temp.path(), "changelog.md", "# Changes");

        let module = empty_module();
        let registry = SchemaRegistry::build(&module).unwrap();
        let tree = build_tree("Docs", &discover_pages(temp.path()), &registry).unwrap();

        assert_eq!(
            titles(&tree, PageTree::ROOT),
            vec!["User Guide", "Changes", "API Reference"]
        );
        let guide = tree.find(Origin::Page, "guide").unwrap();
        assert_eq!(tree.node(guide).document.as_deref(), Some("pages/guide/index.json"));
        assert_eq!(titles(&tree, guide), vec!["Intro", "Setup"]);
    }

    #[test]
    fn root_index_supplies_only_the_body() {
        let temp = tempdir().unwrap();
        write(temp.path(), "index.md", "---\ntitle: Overview\norder: 3\n---\n# Welcome");

        let module = empty_module();
        let registry = SchemaRegistry::build(&module).unwrap();
        let tree = build_tree("Shop API", &discover_pages(temp.path()), &registry).unwrap();

        let root = tree.node(PageTree::ROOT);
        assert_eq!(root.title, "Shop API");
        assert_eq!(root.order, None);
        assert_eq!(root.document.as_deref(), Some("pages/index.json"));
    }

    #[test]
    fn hint_overrides_path_order() {
        let temp = tempdir().unwrap();
        write(temp.path(), "alpha.md", "# Alpha");
        write(temp.path(), "zeta.md", "---\norder: 1\n---\n# Zeta");

        let module = empty_module();
        let registry = SchemaRegistry::build(&module).unwrap();
        let tree = build_tree("Docs", &discover_pages(temp.path()), &registry).unwrap();

        assert_eq!(
            titles(&tree, PageTree::ROOT),
            vec!["Zeta", "Alpha", "API Reference"]
        );
    }

    #[test]
    fn colliding_identities_are_fatal() {
        let temp = tempdir().unwrap();
        write(temp.path(), "guide/intro.md", "# A");
        write(temp.path(), "guide/intro.markdown", "# B");

        let module = empty_module();
        let registry = SchemaRegistry::build(&module).unwrap();
        let err = build_tree("Docs", &discover_pages(temp.path()), &registry).unwrap_err();

        assert!(matches!(err, BuildError::DuplicatePage { ref id, .. } if id == "guide/intro"));
    }

    #[test]
    fn page_and_directory_with_same_name_collide() {
        let temp = tempdir().unwrap();
        write(temp.path(), "guide.md", "# Guide");
        write(temp.path(), "guide/intro.md", "# Intro");

        let module = empty_module();
        let registry = SchemaRegistry::build(&module).unwrap();

        assert!(matches!(
            build_tree("Docs", &discover_pages(temp.path()), &registry),
            Err(BuildError::DuplicatePage { .. })
        ));
    }

    #[test]
    fn declared_parent_rehomes_page() {
        let temp = tempdir().unwrap();
        write(temp.path(), "guide/intro.md", "# Intro");
        write(temp.path(), "faq.md", "---\nparent: guide\n---\n# FAQ");
        write(temp.path(), "misc.md", "---\nparent: nowhere\n---\n# Misc");

        let module = empty_module();
        let registry = SchemaRegistry::build(&module).unwrap();
        let tree = build_tree("Docs", &discover_pages(temp.path()), &registry).unwrap();

        let guide = tree.find(Origin::Page, "guide").unwrap();
        assert_eq!(titles(&tree, guide), vec!["FAQ", "Intro"]);
        assert_eq!(
            titles(&tree, PageTree::ROOT),
            vec!["Guide", "Misc", "API Reference"]
        );
    }

    #[test]
    fn hidden_pages_stay_out_of_navigation() {
        let temp = tempdir().unwrap();
        write(temp.path(), "secret.md", "---\nnav: false\n---\n# Secret");

        let module = empty_module();
        let registry = SchemaRegistry::build(&module).unwrap();
        let sources = discover_pages(temp.path());
        let tree = build_tree("Docs", &sources, &registry).unwrap();

        assert_eq!(sources.len(), 1);
        assert_eq!(titles(&tree, PageTree::ROOT), vec!["API Reference"]);
    }

    #[test]
    fn grafts_reference_entries_by_kind() {
        let mut file = ProtoFile::new("a.proto");
        file.messages.push(Message::new("Zed"));
        file.messages.push(Message::new("Alpha"));
        let mut module = empty_module();
        module.files.push(file);
        let registry = SchemaRegistry::build(&module).unwrap();

        let tree = build_tree("Docs", &[], &registry).unwrap();

        let reference = tree.find(Origin::Reference, "reference").unwrap();
        assert_eq!(titles(&tree, reference), vec!["Files", "Messages"]);
        let messages = tree.find(Origin::Reference, "reference/message").unwrap();
        assert_eq!(titles(&tree, messages), vec!["Alpha", "Zed"]);
        let alpha = tree.find(Origin::Reference, "reference/message/Alpha").unwrap();
        assert_eq!(
            tree.node(alpha).document.as_deref(),
            Some("data/message/Alpha.json")
        );
    }

    #[test]
    fn authored_reference_section_does_not_clash_with_graft() {
        let temp = tempdir().unwrap();
        write(temp.path(), "reference/message/Foo.md", "# Notes on Foo");

        let mut file = ProtoFile::new("a.proto");
        file.messages.push(Message::new("Foo"));
        let mut module = empty_module();
        module.files.push(file);
        let registry = SchemaRegistry::build(&module).unwrap();

        let tree = build_tree("Docs", &discover_pages(temp.path()), &registry).unwrap();

        let authored = tree.find(Origin::Page, "reference/message/Foo").unwrap();
        let generated = tree.find(Origin::Reference, "reference/message/Foo").unwrap();
        assert_ne!(authored, generated);
        assert_eq!(
            tree.node(authored).document.as_deref(),
            Some("pages/reference/message/Foo.json")
        );
        assert_eq!(
            tree.node(generated).document.as_deref(),
            Some("data/message/Foo.json")
        );
    }
}
