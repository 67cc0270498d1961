//! Binary payload and GLB container utilities for the glTF exporter
//!
//! This library provides the byte-level half of an export:
//! - BinaryPayload: Register raw blocks in gather order and lay them out with alignment
//! - Typed packing helpers for positions, indices, matrices and keyframes
//! - Data URI encoding for embedded `.gltf` buffers
//! - GLB assembly and parsing (header + JSON chunk + BIN chunk)
//!
//! # Example
//!
//! ```
//! use glb_builder::*;
//!
//! let mut payload = BinaryPayload::new();
//! let positions = payload.pack_vec3(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.5, 1.0, 0.0]]);
//! let indices = payload.pack_indices_u16(&[0, 1, 2]);
//!
//! let blob = payload.concat(&[positions, indices]);
//! assert_eq!(blob.len(), 36 + 8);
//!
//! let glb = assemble_glb(br#"{"asset":{"version":"2.0"}}"#, Some(&blob));
//! assert_eq!(&glb[0..4], b"glTF");
//! ```

pub mod buffer;
pub mod container;
pub mod utils;

pub use buffer::{BinaryPayload, BlockId, BlockPlacement};
pub use container::{assemble_glb, parse_glb, ContainerError, GlbChunks};
pub use utils::{
    align_buffer, compute_bounds, decode_data_uri, encode_data_uri, padded_len, unpack_vec3,
};
