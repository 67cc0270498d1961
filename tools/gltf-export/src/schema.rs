//! Serializable glTF 2.0 document
//!
//! Fields serialize unconditionally (`null` for unset options, `[]` for
//! empty lists); canonicalization strips them afterwards. The only
//! exception is `extras`, which is omitted when absent so that an explicit
//! `null` set by the source can be told apart and preserved.

use glb_builder::BlockId;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::model::{AccessorType, Extensions, Interpolation, TargetPath};

pub const GLTF_VERSION: &str = "2.0";

/// glTF `ARRAY_BUFFER` target
pub const TARGET_ARRAY_BUFFER: u32 = 34962;
/// glTF `ELEMENT_ARRAY_BUFFER` target
pub const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Root {
    pub asset: Asset,
    pub extensions_used: Vec<String>,
    pub extensions_required: Vec<String>,
    pub scene: Option<u32>,
    pub scenes: Vec<Scene>,
    pub nodes: Vec<Node>,
    pub animations: Vec<Animation>,
    pub materials: Vec<Material>,
    pub meshes: Vec<Mesh>,
    pub skins: Vec<Skin>,
    pub accessors: Vec<Accessor>,
    pub buffer_views: Vec<BufferView>,
    pub buffers: Vec<Buffer>,
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl Root {
    /// Append to `extensionsUsed` unless already listed
    pub fn use_extension(&mut self, name: &str) {
        if !self.extensions_used.iter().any(|e| e == name) {
            self.extensions_used.push(name.to_string());
        }
    }

    /// Mark an extension as both used and required
    pub fn require_extension(&mut self, name: &str) {
        self.use_extension(name);
        if !self.extensions_required.iter().any(|e| e == name) {
            self.extensions_required.push(name.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub copyright: Option<String>,
    pub generator: Option<String>,
    pub version: String,
    pub min_version: Option<String>,
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            copyright: None,
            generator: None,
            version: GLTF_VERSION.to_string(),
            min_version: None,
            extensions: Extensions::new(),
            extras: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scene {
    pub name: Option<String>,
    pub nodes: Vec<u32>,
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Node {
    pub name: Option<String>,
    pub children: Vec<u32>,
    pub mesh: Option<u32>,
    pub skin: Option<u32>,
    pub matrix: Option<[f64; 16]>,
    pub rotation: Option<[f64; 4]>,
    pub scale: Option<[f64; 3]>,
    pub translation: Option<[f64; 3]>,
    pub weights: Option<Vec<f64>>,
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
    pub weights: Option<Vec<f64>>,
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Primitive {
    pub attributes: BTreeMap<String, u32>,
    pub indices: Option<u32>,
    pub material: Option<u32>,
    pub mode: Option<u32>,
    pub targets: Vec<BTreeMap<String, u32>>,
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Material {
    pub name: Option<String>,
    #[serde(flatten)]
    pub properties: serde_json::Map<String, Value>,
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Skin {
    pub name: Option<String>,
    pub inverse_bind_matrices: Option<u32>,
    pub joints: Vec<u32>,
    pub skeleton: Option<u32>,
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Animation {
    pub name: Option<String>,
    pub channels: Vec<Channel>,
    pub samplers: Vec<AnimationSampler>,
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Channel {
    pub sampler: u32,
    pub target: ChannelTarget,
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelTarget {
    pub node: Option<u32>,
    pub path: TargetPath,
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationSampler {
    pub input: u32,
    pub interpolation: Option<Interpolation>,
    pub output: u32,
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    pub buffer_view: Option<u32>,
    pub byte_offset: Option<u64>,
    pub component_type: u32,
    pub normalized: Option<bool>,
    pub count: u64,
    #[serde(rename = "type")]
    pub kind: AccessorType,
    pub max: Option<Vec<f64>>,
    pub min: Option<Vec<f64>>,
    pub name: Option<String>,
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: u32,
    pub byte_offset: Option<u64>,
    pub byte_length: u64,
    pub byte_stride: Option<u32>,
    pub target: Option<u32>,
    pub name: Option<String>,
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
    /// Payload block backing this view, resolved by the buffer finalizer
    #[serde(skip)]
    pub block: Option<BlockId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    pub byte_length: u64,
    pub uri: Option<String>,
    pub name: Option<String>,
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}
