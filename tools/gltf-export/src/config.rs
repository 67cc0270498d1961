//! Export configuration file (export.toml)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::repack::RepackOptions;
use crate::settings::{ExportFlags, ExportOptions, OutputFormat, OutputPaths};

/// Root of an `export.toml` file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output: OutputSection,
    pub export: ExportFlags,
    pub repack: RepackOptions,
}

/// `[output]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub format: OutputFormat,
    /// Sibling binary name for `gltf-separate` (defaults to `<stem>.bin`)
    pub binary_filename: Option<String>,
    pub copyright: Option<String>,
}

impl ExportConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read export config: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse export config")
    }

    /// Options for writing to `filepath`
    pub fn into_options(self, filepath: impl Into<PathBuf>) -> ExportOptions {
        let mut paths = OutputPaths::new(filepath);
        if let Some(name) = self.output.binary_filename {
            paths = paths.with_binary_filename(name);
        }

        ExportOptions {
            format: self.output.format,
            paths,
            flags: self.export,
            repack: self.repack,
            copyright: self.output.copyright,
        }
    }
}
