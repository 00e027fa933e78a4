//! Static resource bundling.
//!
//! The application shell and third-party libraries are listed in a TOML
//! manifest and copied verbatim from a [`ResourceProvider`] into the output.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::builder::BuildError;
use crate::output::OutputDir;

const DEFAULT_MANIFEST: &str = include_str!("../resources/manifest.toml");

/// Declarative list of resources to copy.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResourceManifest {
    #[serde(rename = "bundle", default)]
    pub bundles: Vec<ResourceBundle>,
}

/// Files sharing a source prefix and a target prefix.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResourceBundle {
    pub name: String,

    /// Prefix prepended to each file to form the source locator
    #[serde(default)]
    pub source_base: String,

    /// Prefix prepended to each file to form the output path
    #[serde(default)]
    pub target_base: String,

    pub files: Vec<String>,
}

impl ResourceManifest {
    /// The manifest shipped with protodoc.
    pub fn embedded() -> Result<Self, BuildError> {
        Self::from_toml(DEFAULT_MANIFEST)
    }

    pub fn load(path: &Path) -> Result<Self, BuildError> {
        let content = fs::read_to_string(path)
            .map_err(|e| BuildError::Manifest(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, BuildError> {
        let manifest: Self =
            toml::from_str(content).map_err(|e| BuildError::Manifest(e.to_string()))?;

        for (_, target) in manifest.pairs() {
            if target.starts_with('/') || target.split('/').any(|s| s.is_empty() || s == "..") {
                return Err(BuildError::Manifest(format!(
                    "target '{}' is not a relative path",
                    target
                )));
            }
        }

        Ok(manifest)
    }

    /// `(source locator, output path)` pairs in manifest order.
    pub fn pairs(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.bundles.iter().flat_map(|bundle| {
            bundle.files.iter().map(move |file| {
                (
                    format!("{}{}", bundle.source_base, file),
                    format!("{}{}", bundle.target_base, file),
                )
            })
        })
    }

    pub fn len(&self) -> usize {
        self.bundles.iter().map(|b| b.files.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Errors locating or reading a resource.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid resource locator: {0}")]
    InvalidLocator(String),

    #[error("Failed to read resource {locator}: {message}")]
    Read { locator: String, message: String },
}

/// Source of static resources.
pub trait ResourceProvider: Send + Sync {
    /// Load the full content of `locator`.
    fn load(&self, locator: &str) -> Result<Vec<u8>, ResourceError>;
}

/// Resources stored under a directory.
#[derive(Debug, Clone)]
pub struct FsResourceProvider {
    root: PathBuf,
}

impl FsResourceProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceProvider for FsResourceProvider {
    fn load(&self, locator: &str) -> Result<Vec<u8>, ResourceError> {
        let relative = Path::new(locator);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(ResourceError::InvalidLocator(locator.to_string()));
        }

        fs::read(self.root.join(relative)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ResourceError::NotFound(locator.to_string()),
            _ => ResourceError::Read {
                locator: locator.to_string(),
                message: e.to_string(),
            },
        })
    }
}

/// Resources held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryResourceProvider {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryResourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, locator: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files.insert(locator.into(), content.into());
    }

    /// Provider holding placeholder content for every file in `manifest`.
    pub fn stub_for(manifest: &ResourceManifest) -> Self {
        let mut provider = Self::new();
        for (source, _) in manifest.pairs() {
            let content = format!("/* {} */\n", source);
            provider.insert(source, content);
        }
        provider
    }
}

impl ResourceProvider for MemoryResourceProvider {
    fn load(&self, locator: &str) -> Result<Vec<u8>, ResourceError> {
        self.files
            .get(locator)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(locator.to_string()))
    }
}

/// Copies every manifest entry into the output directory.
pub struct AssetPipeline<'a> {
    manifest: &'a ResourceManifest,
    provider: &'a dyn ResourceProvider,
}

impl<'a> AssetPipeline<'a> {
    pub fn new(manifest: &'a ResourceManifest, provider: &'a dyn ResourceProvider) -> Self {
        Self { manifest, provider }
    }

    /// Copy all resources; the first failure aborts the copy.
    pub fn copy_all(&self, output: &OutputDir) -> Result<usize, BuildError> {
        let mut copied = 0;

        for (source, target) in self.manifest.pairs() {
            tracing::info!("Copy {} -> {}", source, target);
            let content = self.provider.load(&source)?;
            output.write_bytes(&target, &content)?;
            copied += 1;
        }

        Ok(copied)
    }
}
