//! Site build command.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use protodoc_model::Module;
use protodoc_site::SiteBuilder;

use crate::config::ConfigFile;

/// Run the build command.
pub async fn run(config_path: &Path, output: Option<PathBuf>, module: Option<PathBuf>) -> Result<()> {
    tracing::info!("Building documentation site...");

    let file_config = ConfigFile::load(config_path)?;
    let module_path = module.unwrap_or_else(|| file_config.module_path());

    let source = fs::read_to_string(&module_path)
        .with_context(|| format!("Failed to read module {}", module_path.display()))?;
    let module = Module::from_json(&source)
        .with_context(|| format!("Failed to parse module {}", module_path.display()))?;

    let config = file_config.build_config(output);
    let result = SiteBuilder::new(config).build(&module)?;

    tracing::info!(
        "Built {} documents, {} pages and {} assets in {}ms",
        result.documents,
        result.pages,
        result.assets,
        result.duration_ms
    );

    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
