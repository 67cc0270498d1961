//! Artifact writing

use glb_builder::assemble_glb;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

use crate::buffers::FinalizedBuffer;
use crate::error::{ExportError, ExportResult};
use crate::settings::{OutputFormat, OutputPaths};

/// Files produced by one export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifacts {
    /// The `.glb` or `.gltf` file
    pub primary: PathBuf,
    /// Sibling `.bin`, written in separate mode only
    pub binary: Option<PathBuf>,
}

/// Compact JSON, as embedded in GLB containers
pub fn to_compact_json(document: &Value) -> ExportResult<Vec<u8>> {
    Ok(serde_json::to_vec(document)?)
}

/// JSON indented by four spaces, as written to `.gltf` files
pub fn to_pretty_json(document: &Value) -> ExportResult<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    document.serialize(&mut serializer)?;
    Ok(out)
}

/// Write the canonical document and its buffer to disk
pub fn write_artifacts(
    document: &Value,
    buffer: &FinalizedBuffer,
    format: OutputFormat,
    paths: &OutputPaths,
) -> ExportResult<WrittenArtifacts> {
    let directory = paths.directory();
    fs::create_dir_all(directory).map_err(ExportError::write(directory))?;

    let primary = paths.filepath.clone();
    let mut binary = None;

    match format {
        OutputFormat::Binary => {
            let json = to_compact_json(document)?;
            let glb = assemble_glb(&json, buffer.bytes());
            fs::write(&primary, &glb).map_err(ExportError::write(&primary))?;
            tracing::debug!("Wrote {} byte GLB", glb.len());
        }
        OutputFormat::EmbeddedText | OutputFormat::SeparateText => {
            let json = to_pretty_json(document)?;
            fs::write(&primary, &json).map_err(ExportError::write(&primary))?;

            if let FinalizedBuffer::Separate { file_name, bytes } = buffer {
                let path = directory.join(file_name);
                fs::write(&path, bytes).map_err(ExportError::write(&path))?;
                binary = Some(path);
            }
        }
    }

    tracing::info!("Wrote {}", primary.display());
    Ok(WrittenArtifacts { primary, binary })
}
