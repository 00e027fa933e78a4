//! Site builder.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use protodoc_markdown::{MarkdownRenderer, DEFAULT_MAX_INPUT_LEN};
use protodoc_model::{ModelError, Module, SchemaRegistry};

use crate::assets::{AssetPipeline, FsResourceProvider, ResourceError, ResourceManifest, ResourceProvider};
use crate::output::{write_error, OutputDir};
use crate::pages::PagesStage;
use crate::reference::{EnumStage, IndexStage, MessageStage, ProtoStage, ServiceStage};
use crate::stage::{BuildContext, Stage, StageReport};

/// Configuration for building a documentation site.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Output directory; defaults to the module's own output location
    pub output_dir: Option<PathBuf>,

    /// Authored pages directory
    pub pages_dir: Option<PathBuf>,

    /// Directory the static resources are read from
    pub resources_dir: PathBuf,

    /// Resource manifest overriding the built-in one
    pub manifest: Option<PathBuf>,

    /// Site title; defaults to the module name
    pub title: Option<String>,

    /// Largest comment or page rendered as markdown
    pub max_markdown_len: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            pages_dir: Some(PathBuf::from("pages")),
            resources_dir: PathBuf::from("resources"),
            manifest: None,
            title: None,
            max_markdown_len: DEFAULT_MAX_INPUT_LEN,
        }
    }
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Reference and navigation documents generated
    pub documents: usize,

    /// Authored pages generated
    pub pages: usize,

    /// Static resources copied
    pub assets: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that abort a build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Invalid schema model: {0}")]
    Model(#[from] ModelError),

    #[error("Failed to serialize {path}: {message}")]
    SerializeError { path: String, message: String },

    #[error("Permission denied writing {0}")]
    WriteDenied(String),

    #[error("Failed to write output: {path}: {message}")]
    WriteError { path: String, message: String },

    #[error("Output path written twice: {0}")]
    DuplicateOutput(String),

    #[error("Duplicate navigation entry '{id}' under '{parent}'")]
    DuplicatePage { parent: String, id: String },

    #[error("Static resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Invalid resource manifest: {0}")]
    Manifest(String),
}

/// Documentation site builder.
///
/// Runs its stages in order (index, enums, messages, services, protos,
/// pages), then copies the static resources.
pub struct SiteBuilder {
    config: BuildConfig,
    stages: Vec<Box<dyn Stage>>,
    provider: Option<Box<dyn ResourceProvider>>,
}

impl SiteBuilder {
    /// Create a builder with the default stages.
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            stages: vec![
                Box::new(IndexStage),
                Box::new(EnumStage),
                Box::new(MessageStage),
                Box::new(ServiceStage),
                Box::new(ProtoStage),
                Box::new(PagesStage),
            ],
            provider: None,
        }
    }

    /// Read static resources from `provider` instead of `resources_dir`.
    pub fn with_provider(mut self, provider: impl ResourceProvider + 'static) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    /// Append a stage after the default ones.
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Names of the configured stages, in run order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Build the site for `module`.
    pub fn build(&self, module: &Module) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        let registry = SchemaRegistry::build(module)?;

        // Load the manifest before writing anything so a bad one fails fast
        let manifest = match &self.config.manifest {
            Some(path) => ResourceManifest::load(path)?,
            None => ResourceManifest::embedded()?,
        };

        let output_dir = self
            .config
            .output_dir
            .clone()
            .unwrap_or_else(|| module.output.clone());
        fs::create_dir_all(&output_dir).map_err(|e| write_error(&output_dir, e))?;

        let title = self
            .config
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| Some(module.name.clone()).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| "API Reference".to_string());

        let markdown = MarkdownRenderer::with_max_input_len(self.config.max_markdown_len);
        let output = OutputDir::new(&output_dir);
        let ctx = BuildContext {
            module,
            registry: &registry,
            markdown: &markdown,
            output: &output,
            pages_dir: self.config.pages_dir.as_deref(),
            title: &title,
        };

        let mut report = StageReport::default();
        for stage in &self.stages {
            let stage_start = Instant::now();
            let stage_report = stage.compile(&ctx)?;
            tracing::info!(
                "Stage {} wrote {} documents, {} pages in {}ms",
                stage.name(),
                stage_report.documents,
                stage_report.pages,
                stage_start.elapsed().as_millis()
            );
            report += stage_report;
        }

        let fs_provider;
        let provider: &dyn ResourceProvider = match &self.provider {
            Some(provider) => provider.as_ref(),
            None => {
                fs_provider = FsResourceProvider::new(&self.config.resources_dir);
                &fs_provider
            }
        };
        let assets = AssetPipeline::new(&manifest, provider).copy_all(&output)?;

        let duration = start.elapsed();

        Ok(BuildResult {
            documents: report.documents,
            pages: report.pages,
            assets,
            duration_ms: duration.as_millis() as u64,
            output_dir,
        })
    }
}
