//! protodoc.toml loading.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use protodoc_markdown::DEFAULT_MAX_INPUT_LEN;
use protodoc_site::BuildConfig;
use serde::Deserialize;

/// Configuration file structure (protodoc.toml).
///
/// Relative paths resolve against the directory holding the file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(skip)]
    base: PathBuf,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub markdown: MarkdownConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct SiteConfig {
    pub title: Option<String>,
    /// Overrides the output directory named by the module
    pub output: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_module")]
    pub module: String,
    #[serde(default = "default_pages")]
    pub pages: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            module: default_module(),
            pages: default_pages(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResourcesConfig {
    #[serde(default = "default_resources_dir")]
    pub dir: String,
    pub manifest: Option<String>,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            dir: default_resources_dir(),
            manifest: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MarkdownConfig {
    #[serde(default = "default_max_input_len")]
    pub max_input_len: usize,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            max_input_len: default_max_input_len(),
        }
    }
}

fn default_module() -> String {
    "module.json".to_string()
}
fn default_pages() -> String {
    "pages".to_string()
}
fn default_resources_dir() -> String {
    "resources".to_string()
}
fn default_max_input_len() -> usize {
    DEFAULT_MAX_INPUT_LEN
}

impl ConfigFile {
    /// Load `path` if it exists; a missing file yields the defaults, a
    /// malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self {
                base: config_dir(path).to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config = Self::parse(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.base = config_dir(path).to_path_buf();
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// `path` as written in the config, resolved against its directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.base.join(path)
    }

    /// Resolved module JSON path.
    pub fn module_path(&self) -> PathBuf {
        self.resolve(&self.input.module)
    }

    /// Builder settings, with a command-line output directory taking
    /// precedence over the configured one.
    pub fn build_config(&self, output: Option<PathBuf>) -> BuildConfig {
        BuildConfig {
            output_dir: output.or_else(|| self.site.output.as_deref().map(|o| self.resolve(o))),
            pages_dir: Some(self.resolve(&self.input.pages)),
            resources_dir: self.resolve(&self.resources.dir),
            manifest: self.resources.manifest.as_deref().map(|m| self.resolve(m)),
            title: self.site.title.clone(),
            max_markdown_len: self.markdown.max_input_len,
        }
    }
}

/// Directory holding the config file; empty for a bare file name.
pub fn config_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new(""))
}
