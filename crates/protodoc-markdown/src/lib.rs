//! Markdown rendering for protodoc.
//!
//! Renders schema comments and authored pages to sanitized HTML fragments,
//! extracts page frontmatter and builds heading tables of contents.

pub mod frontmatter;
pub mod parser;
pub mod render;

pub use frontmatter::{Frontmatter, FrontmatterError};
pub use parser::{parse_page, slugify, ParseError, ParsedPage, TocEntry};
pub use render::{MarkdownRenderer, RenderError, DEFAULT_MAX_INPUT_LEN};
