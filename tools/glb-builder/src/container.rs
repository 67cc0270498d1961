//! GLB container assembly and parsing

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const CHUNK_JSON: u32 = 0x4E4F534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E4942; // "BIN\0"

/// Errors raised while reading a GLB container
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("GLB too small ({0} bytes)")]
    TooSmall(usize),

    #[error("Bad GLB magic (expected glTF, got {0:?})")]
    BadMagic([u8; 4]),

    #[error("Unsupported GLB version {0}")]
    UnsupportedVersion(u32),

    #[error("GLB header declares {declared} bytes but {actual} were given")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Chunk at offset {offset} overruns the container")]
    TruncatedChunk { offset: usize },

    #[error("First chunk must be JSON (found type {0:#010x})")]
    MissingJson(u32),
}

/// Borrowed view of the chunks inside a GLB file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlbChunks<'a> {
    pub json: &'a [u8],
    pub bin: Option<&'a [u8]>,
}

/// Assemble the final GLB binary.
///
/// The JSON chunk is padded with spaces and the BIN chunk with zeros. When
/// `bin` is `None` or empty the BIN chunk is omitted entirely.
pub fn assemble_glb(json_bytes: &[u8], bin: Option<&[u8]>) -> Vec<u8> {
    let bin = bin.filter(|b| !b.is_empty());

    // Pad JSON to 4-byte alignment
    let json_padding = (4 - (json_bytes.len() % 4)) % 4;
    let json_chunk_length = json_bytes.len() + json_padding;

    // Pad buffer to 4-byte alignment
    let buffer_padding = bin.map(|b| (4 - (b.len() % 4)) % 4).unwrap_or(0);
    let buffer_chunk_length = bin.map(|b| b.len() + buffer_padding).unwrap_or(0);

    let mut total_length = HEADER_LEN + CHUNK_HEADER_LEN + json_chunk_length;
    if bin.is_some() {
        total_length += CHUNK_HEADER_LEN + buffer_chunk_length;
    }

    let mut glb = Vec::with_capacity(total_length);

    // Header
    glb.extend_from_slice(GLB_MAGIC);
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&(total_length as u32).to_le_bytes());

    // JSON chunk
    glb.extend_from_slice(&(json_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    glb.extend_from_slice(json_bytes);
    glb.extend(std::iter::repeat_n(0x20u8, json_padding));

    // BIN chunk
    if let Some(data) = bin {
        glb.extend_from_slice(&(buffer_chunk_length as u32).to_le_bytes());
        glb.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        glb.extend_from_slice(data);
        glb.extend(std::iter::repeat_n(0u8, buffer_padding));
    }

    glb
}

/// Split a GLB file into its JSON and optional BIN chunk.
///
/// Unknown chunk types after the JSON chunk are skipped.
pub fn parse_glb(bytes: &[u8]) -> Result<GlbChunks<'_>, ContainerError> {
    if bytes.len() < HEADER_LEN + CHUNK_HEADER_LEN {
        return Err(ContainerError::TooSmall(bytes.len()));
    }

    let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if &magic != GLB_MAGIC {
        return Err(ContainerError::BadMagic(magic));
    }

    let version = read_u32(bytes, 4);
    if version != GLB_VERSION {
        return Err(ContainerError::UnsupportedVersion(version));
    }

    let declared = read_u32(bytes, 8) as usize;
    if declared != bytes.len() {
        return Err(ContainerError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }

    let mut offset = HEADER_LEN;
    let mut json = None;
    let mut bin = None;

    while offset + CHUNK_HEADER_LEN <= bytes.len() {
        let length = read_u32(bytes, offset) as usize;
        let kind = read_u32(bytes, offset + 4);
        let start = offset + CHUNK_HEADER_LEN;
        let end = start + length;
        if end > bytes.len() {
            return Err(ContainerError::TruncatedChunk { offset });
        }

        match (kind, json.is_some()) {
            (CHUNK_JSON, false) => json = Some(&bytes[start..end]),
            (_, false) => return Err(ContainerError::MissingJson(kind)),
            (CHUNK_BIN, true) if bin.is_none() => bin = Some(&bytes[start..end]),
            _ => {}
        }
        offset = end;
    }

    match json {
        Some(json) => Ok(GlbChunks { json, bin }),
        None => Err(ContainerError::TooSmall(bytes.len())),
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
