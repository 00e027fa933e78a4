//! Pipeline stage trait.

use std::path::Path;

use protodoc_markdown::MarkdownRenderer;
use protodoc_model::{Module, SchemaRegistry};

use crate::builder::BuildError;
use crate::output::OutputDir;

/// Shared, read-only inputs of every stage.
pub struct BuildContext<'a> {
    /// The resolved module
    pub module: &'a Module,

    /// Qualified names and type resolution for `module`
    pub registry: &'a SchemaRegistry<'a>,

    /// Comment renderer, cached for the whole run
    pub markdown: &'a MarkdownRenderer,

    /// Output writer
    pub output: &'a OutputDir,

    /// Authored pages source, if configured
    pub pages_dir: Option<&'a Path>,

    /// Site title
    pub title: &'a str,
}

/// What a stage produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Reference or navigation documents written
    pub documents: usize,

    /// Authored pages written
    pub pages: usize,
}

impl StageReport {
    pub fn documents(documents: usize) -> Self {
        Self {
            documents,
            pages: 0,
        }
    }
}

impl std::ops::AddAssign for StageReport {
    fn add_assign(&mut self, rhs: Self) {
        self.documents += rhs.documents;
        self.pages += rhs.pages;
    }
}

/// One step of site generation.
///
/// Stages only read the context and write under their own output subtree,
/// so adding a stage never changes what another stage produces.
pub trait Stage: Send + Sync {
    /// Stage identifier for logging (e.g. "messages")
    fn name(&self) -> &'static str;

    /// Produce this stage's documents.
    fn compile(&self, ctx: &BuildContext<'_>) -> Result<StageReport, BuildError>;
}
