//! Output directory writer.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;

use crate::builder::BuildError;

/// Writes generated files under the output root.
///
/// Every relative path may be written once per run; stages own disjoint
/// subtrees, so a second write means two stages disagree about a path.
#[derive(Debug)]
pub struct OutputDir {
    root: PathBuf,
    written: Mutex<BTreeSet<String>>,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serialize `value` as pretty JSON to `relative`.
    pub fn write_json<T: Serialize>(&self, relative: &str, value: &T) -> Result<(), BuildError> {
        let mut json =
            serde_json::to_string_pretty(value).map_err(|e| BuildError::SerializeError {
                path: relative.to_string(),
                message: e.to_string(),
            })?;
        json.push('\n');
        self.write_bytes(relative, json.as_bytes())
    }

    /// Write raw bytes to `relative` (a `/`-separated path).
    pub fn write_bytes(&self, relative: &str, bytes: &[u8]) -> Result<(), BuildError> {
        let path = self.claim(relative)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
        }
        fs::write(&path, bytes).map_err(|e| write_error(&path, e))?;

        tracing::debug!("Wrote {}", relative);
        Ok(())
    }

    /// Paths written so far, sorted.
    pub fn written(&self) -> Vec<String> {
        self.written
            .lock()
            .map(|w| w.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn claim(&self, relative: &str) -> Result<PathBuf, BuildError> {
        if relative.is_empty()
            || relative.starts_with('/')
            || relative
                .split('/')
                .any(|s| s.is_empty() || s == "." || s == "..")
        {
            return Err(BuildError::WriteError {
                path: relative.to_string(),
                message: "not a relative output path".to_string(),
            });
        }

        let mut written = self
            .written
            .lock()
            .map_err(|_| BuildError::WriteError {
                path: relative.to_string(),
                message: "output registry poisoned".to_string(),
            })?;
        if !written.insert(relative.to_string()) {
            return Err(BuildError::DuplicateOutput(relative.to_string()));
        }

        Ok(relative
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

/// Map an I/O failure at `path`, keeping permission problems distinct.
pub(crate) fn write_error(path: &Path, e: io::Error) -> BuildError {
    if e.kind() == io::ErrorKind::PermissionDenied {
        BuildError::WriteDenied(path.display().to_string())
    } else {
        BuildError::WriteError {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    }
}
