//! Export settings
//!
//! Settings are split in two: [`ExportOptions`] is the typed configuration
//! read by every stage (and editable by pre-export callbacks), while
//! [`ExportHooks`] holds the callback and extension lists that operate on it.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::extensions::ExportExtension;
use crate::repack::RepackOptions;

/// How the binary payload relates to the written artifacts.
///
/// Selected once before any buffer work and never changed mid-export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
pub enum OutputFormat {
    /// Single `.glb` container with a BIN chunk
    #[default]
    #[serde(rename = "glb")]
    #[value(name = "glb")]
    Binary,
    /// `.gltf` with buffers embedded as base64 data URIs
    #[serde(rename = "gltf-embedded")]
    #[value(name = "gltf-embedded")]
    EmbeddedText,
    /// `.gltf` plus a sibling `.bin` file
    #[serde(rename = "gltf-separate")]
    #[value(name = "gltf-separate")]
    SeparateText,
}

impl OutputFormat {
    /// File extension of the primary artifact
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Binary => "glb",
            OutputFormat::EmbeddedText | OutputFormat::SeparateText => "gltf",
        }
    }
}

/// Where artifacts are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Primary artifact (`.glb` or `.gltf`)
    pub filepath: PathBuf,
    /// File name of the sibling binary in [`OutputFormat::SeparateText`] mode
    pub binary_filename: String,
}

impl OutputPaths {
    /// Paths for `filepath`, with the binary named `<stem>.bin`
    pub fn new(filepath: impl Into<PathBuf>) -> Self {
        let filepath = filepath.into();
        let stem = filepath
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scene".to_string());
        Self {
            binary_filename: format!("{stem}.bin"),
            filepath,
        }
    }

    pub fn with_binary_filename(mut self, name: impl Into<String>) -> Self {
        self.binary_filename = name.into();
        self
    }

    /// Directory holding the primary artifact
    pub fn directory(&self) -> &Path {
        self.filepath
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    }

    /// Full path of the sibling binary
    pub fn binary_path(&self) -> PathBuf {
        self.directory().join(&self.binary_filename)
    }
}

/// Boolean switches
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportFlags {
    /// Gather at the current timeline frame instead of frame 0
    pub current_frame: bool,
    /// Run the mesh compression encoder over every primitive
    pub draco_mesh_compression: bool,
    /// Run gltfpack over the written artifact
    pub use_gltfpack: bool,
}

/// Typed configuration read by every pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub format: OutputFormat,
    pub paths: OutputPaths,
    pub flags: ExportFlags,
    pub repack: RepackOptions,
    /// Written to `asset.copyright`
    pub copyright: Option<String>,
}

impl ExportOptions {
    pub fn new(format: OutputFormat, filepath: impl Into<PathBuf>) -> Self {
        Self {
            format,
            paths: OutputPaths::new(filepath),
            flags: ExportFlags::default(),
            repack: RepackOptions::default(),
            copyright: None,
        }
    }
}

/// Callback run before gathering or before writing
pub type ExportCallback = Box<dyn FnMut(&mut ExportOptions) -> anyhow::Result<()>>;

/// Ordered hook lists, populated by external code before the export starts
#[derive(Default)]
pub struct ExportHooks {
    pub pre_export: Vec<ExportCallback>,
    pub post_export: Vec<ExportCallback>,
    pub extensions: Vec<Box<dyn ExportExtension>>,
}

impl ExportHooks {
    pub fn on_pre_export(
        &mut self,
        callback: impl FnMut(&mut ExportOptions) -> anyhow::Result<()> + 'static,
    ) -> &mut Self {
        self.pre_export.push(Box::new(callback));
        self
    }

    pub fn on_post_export(
        &mut self,
        callback: impl FnMut(&mut ExportOptions) -> anyhow::Result<()> + 'static,
    ) -> &mut Self {
        self.post_export.push(Box::new(callback));
        self
    }

    pub fn register_extension(&mut self, extension: impl ExportExtension + 'static) -> &mut Self {
        self.extensions.push(Box::new(extension));
        self
    }
}

impl fmt::Debug for ExportHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportHooks")
            .field("pre_export", &self.pre_export.len())
            .field("post_export", &self.post_export.len())
            .field(
                "extensions",
                &self.extensions.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Everything one export call needs from its caller
#[derive(Debug)]
pub struct ExportSettings {
    pub options: ExportOptions,
    pub hooks: ExportHooks,
}

impl ExportSettings {
    pub fn new(options: ExportOptions) -> Self {
        Self {
            options,
            hooks: ExportHooks::default(),
        }
    }
}
