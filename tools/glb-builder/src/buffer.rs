//! Binary payload registry with aligned layout

use crate::utils::{align_buffer, padded_len};
use serde::{Deserialize, Serialize};

/// Handle to a block registered in a [`BinaryPayload`].
///
/// Ids are dense and ascending in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Where a block lands inside a concatenated buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlacement {
    pub block: BlockId,
    pub byte_offset: u64,
    pub byte_length: u64,
}

/// Ordered sequence of raw byte blocks, one per logical buffer view.
///
/// Blocks are never reordered: the layout always follows registration order,
/// which is what fixes the byte offset of every referencing accessor.
#[derive(Debug, Default, Clone)]
pub struct BinaryPayload {
    blocks: Vec<Vec<u8>>,
}

impl BinaryPayload {
    /// Create a new empty payload
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Register a raw block
    pub fn push(&mut self, bytes: Vec<u8>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(bytes);
        id
    }

    /// Number of registered blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Bytes of a registered block
    pub fn get(&self, id: BlockId) -> Option<&[u8]> {
        self.blocks.get(id.index()).map(Vec::as_slice)
    }

    /// Ids of every registered block, in registration order
    pub fn ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    /// Lay out a subset of blocks.
    ///
    /// Blocks are placed in ascending id order regardless of the order of
    /// `ids`; each one starts on a 4-byte boundary. Unknown and duplicate ids
    /// are skipped.
    pub fn layout(&self, ids: &[BlockId]) -> Vec<BlockPlacement> {
        let mut sorted: Vec<BlockId> = ids
            .iter()
            .copied()
            .filter(|id| id.index() < self.blocks.len())
            .collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut offset = 0u64;
        sorted
            .into_iter()
            .map(|block| {
                let len = self.blocks[block.index()].len();
                let placement = BlockPlacement {
                    block,
                    byte_offset: offset,
                    byte_length: len as u64,
                };
                offset += padded_len(len) as u64;
                placement
            })
            .collect()
    }

    /// Concatenate a subset of blocks following [`BinaryPayload::layout`].
    ///
    /// Every block is zero-padded to 4 bytes, so the result length is the
    /// padded sum of the selected block lengths.
    pub fn concat(&self, ids: &[BlockId]) -> Vec<u8> {
        let placements = self.layout(ids);
        let total: usize = placements
            .iter()
            .map(|p| padded_len(p.byte_length as usize))
            .sum();

        let mut out = Vec::with_capacity(total);
        for placement in &placements {
            out.extend_from_slice(&self.blocks[placement.block.index()]);
            align_buffer(&mut out);
        }
        out
    }

    /// Pack Vec3 data (positions, normals, translations, scales)
    pub fn pack_vec3(&mut self, data: &[[f32; 3]]) -> BlockId {
        self.push(bytemuck::cast_slice(data).to_vec())
    }

    /// Pack Vec2 data (UVs)
    pub fn pack_vec2(&mut self, data: &[[f32; 2]]) -> BlockId {
        self.push(bytemuck::cast_slice(data).to_vec())
    }

    /// Pack Vec4 data (colors, rotations, weights)
    pub fn pack_vec4(&mut self, data: &[[f32; 4]]) -> BlockId {
        self.push(bytemuck::cast_slice(data).to_vec())
    }

    /// Pack joint indices (Vec4<u8>)
    pub fn pack_joints(&mut self, joints: &[[u8; 4]]) -> BlockId {
        self.push(bytemuck::cast_slice(joints).to_vec())
    }

    /// Pack u16 indices
    pub fn pack_indices_u16(&mut self, indices: &[u16]) -> BlockId {
        let mut bytes = Vec::with_capacity(indices.len() * 2);
        for idx in indices {
            bytes.extend_from_slice(&idx.to_le_bytes());
        }
        self.push(bytes)
    }

    /// Pack u32 indices
    pub fn pack_indices_u32(&mut self, indices: &[u32]) -> BlockId {
        let mut bytes = Vec::with_capacity(indices.len() * 4);
        for idx in indices {
            bytes.extend_from_slice(&idx.to_le_bytes());
        }
        self.push(bytes)
    }

    /// Pack Mat4 data (inverse bind matrices)
    pub fn pack_mat4(&mut self, matrices: &[[f32; 16]]) -> BlockId {
        let mut bytes = Vec::with_capacity(matrices.len() * 64);
        for mat in matrices {
            for f in mat {
                bytes.extend_from_slice(&f.to_le_bytes());
            }
        }
        self.push(bytes)
    }

    /// Pack scalar f32 data (keyframe times, morph weights)
    pub fn pack_scalars(&mut self, scalars: &[f32]) -> BlockId {
        let mut bytes = Vec::with_capacity(scalars.len() * 4);
        for scalar in scalars {
            bytes.extend_from_slice(&scalar.to_le_bytes());
        }
        self.push(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_assigns_ascending_ids() {
        let mut payload = BinaryPayload::new();
        let a = payload.push(vec![1; 10]);
        let b = payload.push(vec![2; 22]);

        assert_eq!(a, BlockId(0));
        assert_eq!(b, BlockId(1));
        assert_eq!(payload.len(), 2);
        assert_eq!(payload.get(b).map(<[u8]>::len), Some(22));
    }

    #[test]
    fn test_layout_follows_registration_order() {
        let mut payload = BinaryPayload::new();
        let a = payload.push(vec![1; 10]);
        let b = payload.push(vec![2; 22]);
        let c = payload.push(vec![3; 4]);

        // Requested out of order, placed in registration order
        let placements = payload.layout(&[c, a, b]);
        assert_eq!(placements.len(), 3);
        assert_eq!(placements[0].block, a);
        assert_eq!(placements[0].byte_offset, 0);
        assert_eq!(placements[1].block, b);
        assert_eq!(placements[1].byte_offset, 12);
        assert_eq!(placements[2].block, c);
        assert_eq!(placements[2].byte_offset, 36);
    }

    #[test]
    fn test_concat_pads_every_block() {
        let mut payload = BinaryPayload::new();
        let a = payload.push(vec![1; 10]);
        let b = payload.push(vec![2; 22]);

        let blob = payload.concat(&[a, b]);
        // 10 -> 12, 22 -> 24
        assert_eq!(blob.len(), 36);
        assert_eq!(&blob[0..10], &[1; 10]);
        assert_eq!(&blob[10..12], &[0, 0]);
        assert_eq!(&blob[12..34], &[2; 22]);
        assert_eq!(&blob[34..36], &[0, 0]);
    }

    #[test]
    fn test_concat_skips_unselected_blocks() {
        let mut payload = BinaryPayload::new();
        let a = payload.push(vec![1; 4]);
        let _unused = payload.push(vec![9; 8]);
        let c = payload.push(vec![3; 4]);

        let blob = payload.concat(&[a, c]);
        assert_eq!(blob, vec![1, 1, 1, 1, 3, 3, 3, 3]);
    }

    #[test]
    fn test_pack_positions() {
        let mut payload = BinaryPayload::new();
        let id = payload.pack_vec3(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.5, 1.0, 0.0]]);
        // 3 positions * 12 bytes
        assert_eq!(payload.get(id).map(<[u8]>::len), Some(36));
    }

    #[test]
    fn test_pack_typed_block_sizes() {
        let mut payload = BinaryPayload::new();
        let uvs = payload.pack_vec2(&[[0.0, 1.0]; 3]);
        let colors = payload.pack_vec4(&[[1.0; 4]; 2]);
        let joints = payload.pack_joints(&[[0, 1, 2, 3]]);
        let wide = payload.pack_indices_u32(&[0, 1, 70000]);
        let matrices = payload.pack_mat4(&[[0.0; 16]; 2]);
        let times = payload.pack_scalars(&[0.0, 0.5, 1.0]);

        let len = |id| payload.get(id).map(<[u8]>::len);
        assert_eq!(len(uvs), Some(24));
        assert_eq!(len(colors), Some(32));
        assert_eq!(len(joints), Some(4));
        assert_eq!(len(wide), Some(12));
        assert_eq!(len(matrices), Some(128));
        assert_eq!(len(times), Some(12));
        assert_eq!(payload.get(wide).map(|b| b[8..].to_vec()), Some(70000u32.to_le_bytes().to_vec()));
    }

    #[test]
    fn test_pack_indices() {
        let mut payload = BinaryPayload::new();
        let id = payload.pack_indices_u16(&[0, 1, 2]);
        assert_eq!(payload.get(id), Some(&[0u8, 0, 1, 0, 2, 0][..]));
        // Raw block is unpadded, the layout pads it
        assert_eq!(payload.concat(&[id]).len(), 8);
    }
}
