//! Scaffold a protodoc project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::{config_dir, ConfigFile};

/// Run the init command.
pub async fn run(config_path: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing protodoc...");
    scaffold(config_path, yes)?;
    tracing::info!("Initialization complete!");
    tracing::info!("Export your module to module.json, then run 'protodoc build'.");
    Ok(())
}

/// Write the config and sample pages next to it, leaving existing files
/// alone unless `overwrite` is set. Returns the number of files written.
fn scaffold(config_path: &Path, overwrite: bool) -> Result<usize> {
    let mut written = 0;
    let defaults = ConfigFile::parse(DEFAULT_CONFIG)?;
    let pages_dir = config_dir(config_path).join(&defaults.input.pages);
    let pages_dir = pages_dir.as_path();

    if pages_dir.exists() && !overwrite {
        tracing::warn!(
            "{} already exists. Use --yes to overwrite.",
            pages_dir.display()
        );
    }
    fs::create_dir_all(pages_dir.join("guide")).context("Failed to create pages directory")?;

    let files = [
        (config_path.to_path_buf(), DEFAULT_CONFIG),
        (pages_dir.join("index.md"), DEFAULT_INDEX),
        (pages_dir.join("guide/index.md"), DEFAULT_GUIDE),
        (pages_dir.join("guide/getting-started.md"), DEFAULT_GETTING_STARTED),
    ];

    for (path, content) in files {
        if path.exists() && !overwrite {
            tracing::debug!("Keeping existing {}", path.display());
            continue;
        }
        fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Created {}", path.display());
        written += 1;
    }

    Ok(written)
}

const DEFAULT_CONFIG: &str = r#"# protodoc configuration

[site]
# Site title (defaults to the module name)
# title = "API Reference"

# Output directory (defaults to the module's own)
# output = "dist"

[input]
# Resolved module exported by the compiler front-end
module = "module.json"

# Authored pages
pages = "pages"

[resources]
# Application shell and third-party libraries
dir = "resources"

# Replace the built-in resource list
# manifest = "manifest.toml"

[markdown]
# Larger comments and pages render as empty
max_input_len = 1048576
"#;

const DEFAULT_INDEX: &str = r#"---
title: Overview
---

# Overview

Welcome to the API documentation. The **API Reference** section lists every
file, message, enum and service in the module.
"#;

const DEFAULT_GUIDE: &str = r#"---
title: Guide
order: 1
---

# Guide

Hand-written guides live under `pages/guide/`.
"#;

const DEFAULT_GETTING_STARTED: &str = r#"---
title: Getting Started
order: 1
---

# Getting Started

## Building

```bash
protodoc build
```

## Previewing

```bash
protodoc serve
```

## Ordering pages

Pages with an `order` in their frontmatter come first, lowest first. The
rest follow by file name. Set `nav: false` to publish a page without listing
it in the navigation.
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use protodoc_markdown::parse_page;
    use tempfile::tempdir;

    #[test]
    fn scaffolds_config_and_pages() {
        let temp = tempdir().unwrap();
        let config = temp.path().join("protodoc.toml");
        let pages = temp.path().join("pages");

        let written = scaffold(&config, false).unwrap();

        assert_eq!(written, 4);
        assert!(crate::config::ConfigFile::load(&config).is_ok());
        assert!(pages.join("guide/getting-started.md").exists());
    }

    #[test]
    fn keeps_existing_files_without_overwrite() {
        let temp = tempdir().unwrap();
        let config = temp.path().join("protodoc.toml");
        fs::write(&config, "# mine\n").unwrap();

        let written = scaffold(&config, false).unwrap();

        assert_eq!(written, 3);
        assert_eq!(fs::read_to_string(&config).unwrap(), "# mine\n");

        let written = scaffold(&config, true).unwrap();
        assert_eq!(written, 4);
        assert_ne!(fs::read_to_string(&config).unwrap(), "# mine\n");
    }

    #[test]
    fn sample_pages_parse() {
        for source in [DEFAULT_INDEX, DEFAULT_GUIDE, DEFAULT_GETTING_STARTED] {
            let page = parse_page(source).unwrap();
            assert!(page.title().is_some());
        }
    }

    #[test]
    fn scaffolds_pages_where_the_config_points() {
        let temp = tempdir().unwrap();
        let config_path = temp.path().join("docs/protodoc.toml");

        scaffold(&config_path, false).unwrap();

        let config = crate::config::ConfigFile::load(&config_path).unwrap();
        let pages = config.build_config(None).pages_dir.unwrap();
        assert_eq!(pages, temp.path().join("docs/pages"));
        assert!(pages.join("index.md").exists());
        assert!(!temp.path().join("pages").exists());
    }
}
