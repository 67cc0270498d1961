//! Intermediate document model produced by scene gathering
//!
//! Gathered data is an owned tree: scenes own their nodes, nodes own their
//! children and mesh. Cross references (skins, joints, animation targets)
//! use the stable string keys the gatherer assigns to nodes, meshes,
//! materials and skins. Raw vertex data lives in a
//! [`glb_builder::BinaryPayload`] and accessors point at it by [`BlockId`].

use glb_builder::{BinaryPayload, BlockId};
use hashbrown::HashSet;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::settings::ExportOptions;

/// Extension objects keyed by extension name
pub type Extensions = Map<String, Value>;

/// Scene Gatherer seam: walks the source scene and registers raw buffers
pub trait SceneGatherer {
    fn gather(
        &mut self,
        options: &ExportOptions,
        payload: &mut BinaryPayload,
    ) -> anyhow::Result<GatheredDocument>;
}

/// Keeps an explicit `null` as `Some(Value::Null)`; absent stays `None`
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Everything one gather pass produces
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GatheredDocument {
    /// Index into `scenes` of the scene flagged as default
    pub active_scene: usize,
    pub scenes: Vec<Scene>,
    pub animations: Vec<Animation>,
    /// Every skin known to the source, referenced or not
    pub skins: Vec<Skin>,
    /// Nodes outside every scene (e.g. armatures of unused skins)
    pub detached_nodes: Vec<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Scene {
    pub name: Option<String>,
    pub nodes: Vec<Node>,
    pub extensions: Extensions,
    #[serde(deserialize_with = "present")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Node {
    pub key: String,
    pub name: Option<String>,
    pub translation: Option<[f64; 3]>,
    pub rotation: Option<[f64; 4]>,
    pub scale: Option<[f64; 3]>,
    pub matrix: Option<[f64; 16]>,
    pub mesh: Option<Mesh>,
    /// Key of a skin in [`GatheredDocument::skins`]
    pub skin: Option<String>,
    pub weights: Option<Vec<f64>>,
    pub children: Vec<Node>,
    pub extensions: Extensions,
    #[serde(deserialize_with = "present")]
    pub extras: Option<Value>,
}

impl Node {
    /// Depth-first visit of this node and its descendants
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Node)) {
        visit(self);
        for child in &mut self.children {
            child.walk_mut(visit);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Mesh {
    pub key: String,
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
    pub weights: Option<Vec<f64>>,
    pub extensions: Extensions,
    #[serde(deserialize_with = "present")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Primitive {
    pub attributes: BTreeMap<String, Accessor>,
    pub indices: Option<Accessor>,
    pub material: Option<Material>,
    pub mode: Option<u32>,
    pub targets: Vec<BTreeMap<String, Accessor>>,
    /// Set by the mesh compression encoder
    pub compressed: Option<CompressedPrimitive>,
    pub extensions: Extensions,
    #[serde(deserialize_with = "present")]
    pub extras: Option<Value>,
}

/// Encoded primitive data and the attribute ids inside it
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompressedPrimitive {
    pub block: BlockId,
    pub attributes: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    #[default]
    F32,
}

impl ComponentType {
    /// GL enum value used in the JSON
    pub fn code(&self) -> u32 {
        match self {
            ComponentType::I8 => 5120,
            ComponentType::U8 => 5121,
            ComponentType::I16 => 5122,
            ComponentType::U16 => 5123,
            ComponentType::U32 => 5125,
            ComponentType::F32 => 5126,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessorType {
    #[default]
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Accessor {
    /// Backing data; `None` for accessors whose data lives in an extension
    pub block: Option<BlockId>,
    pub component_type: ComponentType,
    #[serde(rename = "type")]
    pub kind: AccessorType,
    pub count: u64,
    pub normalized: bool,
    pub min: Option<Vec<f64>>,
    pub max: Option<Vec<f64>>,
    pub name: Option<String>,
}

/// Material data passes through untouched; only identity matters here
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Material {
    pub key: String,
    pub name: Option<String>,
    pub properties: Map<String, Value>,
    pub extensions: Extensions,
    #[serde(deserialize_with = "present")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Skin {
    pub key: String,
    pub name: Option<String>,
    /// Node keys
    pub joints: Vec<String>,
    pub inverse_bind_matrices: Option<Accessor>,
    pub skeleton: Option<String>,
    pub extensions: Extensions,
    #[serde(deserialize_with = "present")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Animation {
    pub name: Option<String>,
    pub channels: Vec<Channel>,
    pub extensions: Extensions,
    #[serde(deserialize_with = "present")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Channel {
    /// Target node key
    pub node: String,
    pub path: TargetPath,
    pub sampler: Sampler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPath {
    Translation,
    Rotation,
    Scale,
    Weights,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sampler {
    pub input: Accessor,
    pub output: Accessor,
    #[serde(default)]
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    CubicSpline,
}

/// Skins not referenced by any node reachable from `scenes`, in gather order.
///
/// They are still serialized so that skin data survives even when its
/// armature is not part of an exported scene.
pub fn unused_skins<'a>(scenes: &[Scene], skins: &'a [Skin]) -> Vec<&'a Skin> {
    let mut referenced = HashSet::new();
    for scene in scenes {
        for root in &scene.nodes {
            root.walk(&mut |node| {
                if let Some(skin) = &node.skin {
                    referenced.insert(skin.as_str());
                }
            });
        }
    }

    skins
        .iter()
        .filter(|skin| !referenced.contains(skin.key.as_str()))
        .collect()
}
