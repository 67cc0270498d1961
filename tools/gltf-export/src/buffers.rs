//! Buffer finalization
//!
//! Concatenates the referenced payload blocks into the document's single
//! buffer, fills in buffer view offsets and decides where the bytes go for
//! the selected [`OutputFormat`].

use glb_builder::{encode_data_uri, BinaryPayload, BlockId};
use hashbrown::HashMap;

use crate::error::{ExportError, ExportResult};
use crate::schema::{Buffer, Root};
use crate::settings::OutputFormat;

/// Where the finalized bytes end up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizedBuffer {
    /// No buffer view references any data; the document has no buffer
    Empty,
    /// Bytes for the GLB BIN chunk
    Binary(Vec<u8>),
    /// Bytes live in the document as a data URI
    Embedded,
    /// Bytes for the sibling binary file
    Separate { file_name: String, bytes: Vec<u8> },
}

impl FinalizedBuffer {
    /// Bytes that still have to be written outside the JSON
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            FinalizedBuffer::Binary(bytes) | FinalizedBuffer::Separate { bytes, .. } => {
                Some(bytes.as_slice())
            }
            FinalizedBuffer::Empty | FinalizedBuffer::Embedded => None,
        }
    }
}

/// Resolve every buffer view to its place in the concatenated buffer.
///
/// Blocks are laid out in registration order, each padded to 4 bytes, and
/// `byteLength` is the padded total. Blocks no view references are left out.
pub fn finalize_buffers(
    root: &mut Root,
    payload: &BinaryPayload,
    format: OutputFormat,
    binary_filename: &str,
) -> ExportResult<FinalizedBuffer> {
    let referenced: Vec<BlockId> = root.buffer_views.iter().filter_map(|v| v.block).collect();
    if referenced.is_empty() {
        root.buffers.clear();
        return Ok(FinalizedBuffer::Empty);
    }

    let offsets: HashMap<BlockId, u64> = payload
        .layout(&referenced)
        .into_iter()
        .map(|placement| (placement.block, placement.byte_offset))
        .collect();

    for view in &mut root.buffer_views {
        let Some(block) = view.block else {
            continue;
        };
        let offset = offsets.get(&block).copied().ok_or_else(|| {
            ExportError::assembly(format!("buffer view references missing block {}", block.0))
        })?;
        view.buffer = 0;
        view.byte_offset = Some(offset);
    }

    let bytes = payload.concat(&referenced);
    let byte_length = bytes.len() as u64;
    tracing::debug!(
        "Finalized buffer: {} bytes from {} blocks",
        byte_length,
        offsets.len()
    );

    let (uri, finalized) = match format {
        OutputFormat::Binary => (None, FinalizedBuffer::Binary(bytes)),
        OutputFormat::EmbeddedText => (Some(encode_data_uri(&bytes)), FinalizedBuffer::Embedded),
        OutputFormat::SeparateText => (
            Some(binary_filename.to_string()),
            FinalizedBuffer::Separate {
                file_name: binary_filename.to_string(),
                bytes,
            },
        ),
    };

    root.buffers = vec![Buffer {
        byte_length,
        uri,
        ..Default::default()
    }];
    Ok(finalized)
}
