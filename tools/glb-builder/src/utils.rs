//! Alignment, bounds and data URI helpers

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

const DATA_URI_PREFIX: &str = "data:application/octet-stream;base64,";

/// Compute bounding box for positions
pub fn compute_bounds(positions: &[[f32; 3]]) -> (Vec<f32>, Vec<f32>) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];

    for pos in positions {
        for i in 0..3 {
            min[i] = min[i].min(pos[i]);
            max[i] = max[i].max(pos[i]);
        }
    }

    (min.to_vec(), max.to_vec())
}

/// Read back packed Vec3 data; a trailing partial element is ignored
pub fn unpack_vec3(bytes: &[u8]) -> Vec<[f32; 3]> {
    bytes
        .chunks_exact(12)
        .map(bytemuck::pod_read_unaligned::<[f32; 3]>)
        .collect()
}

/// Align buffer to 4-byte boundary
pub fn align_buffer(buffer: &mut Vec<u8>) {
    while buffer.len() % 4 != 0 {
        buffer.push(0);
    }
}

/// Length rounded up to the next 4-byte boundary
pub fn padded_len(len: usize) -> usize {
    len + (4 - len % 4) % 4
}

/// Encode bytes as an `application/octet-stream` base64 data URI
pub fn encode_data_uri(bytes: &[u8]) -> String {
    format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(bytes))
}

/// Decode a base64 data URI back into bytes.
///
/// Any media type is accepted as long as the payload is base64.
pub fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    if !header.ends_with(";base64") {
        return None;
    }
    STANDARD.decode(data).ok()
}
