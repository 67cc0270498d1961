//! Document assembly
//!
//! Flattens the gathered scene trees into the index-based glTF document.
//! Nodes are emitted depth-first with parents before children. Meshes,
//! materials and skins are shared by key, accessors by the block they read,
//! and every referenced block gets exactly one buffer view, in order of
//! first reference. Byte offsets are left for the buffer finalizer.

use glb_builder::{BinaryPayload, BlockId};
use hashbrown::{HashMap, HashSet};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{ExportError, ExportResult};
use crate::extensions::KHR_DRACO_MESH_COMPRESSION;
use crate::model::{self, AccessorType, ComponentType};
use crate::schema::{self, Root, TARGET_ARRAY_BUFFER, TARGET_ELEMENT_ARRAY_BUFFER};

/// Accessors sharing a block are merged only when every emitted field matches.
/// Bounds are compared bitwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AccessorKey {
    block: BlockId,
    component_type: ComponentType,
    kind: AccessorType,
    count: u64,
    normalized: bool,
    min: Option<Vec<u64>>,
    max: Option<Vec<u64>>,
    name: Option<String>,
}

impl AccessorKey {
    fn of(accessor: &model::Accessor) -> Option<Self> {
        let bits = |bounds: &Option<Vec<f64>>| -> Option<Vec<u64>> {
            bounds
                .as_ref()
                .map(|values| values.iter().map(|v| v.to_bits()).collect())
        };
        accessor.block.map(|block| AccessorKey {
            block,
            component_type: accessor.component_type,
            kind: accessor.kind,
            count: accessor.count,
            normalized: accessor.normalized,
            min: bits(&accessor.min),
            max: bits(&accessor.max),
            name: accessor.name.clone(),
        })
    }
}

/// Look up a keyed item; empty keys never match
fn keyed(map: &HashMap<String, u32>, key: &str) -> Option<u32> {
    if key.is_empty() {
        None
    } else {
        map.get(key).copied()
    }
}

fn remember(map: &mut HashMap<String, u32>, key: &str, index: u32) {
    if !key.is_empty() {
        map.insert(key.to_string(), index);
    }
}

fn find_node<'n>(nodes: &'n [model::Node], key: &str) -> Option<&'n model::Node> {
    for node in nodes {
        if node.key == key {
            return Some(node);
        }
        if let Some(found) = find_node(&node.children, key) {
            return Some(found);
        }
    }
    None
}

/// Builds a [`Root`] from gathered scenes, animations and skins
pub struct DocumentBuilder<'a> {
    payload: &'a BinaryPayload,
    skins: &'a [model::Skin],
    detached_nodes: &'a [model::Node],
    root: Root,
    compression_extension: Option<String>,
    nodes_by_key: HashMap<String, u32>,
    parented: HashSet<u32>,
    meshes_by_key: HashMap<String, u32>,
    materials_by_key: HashMap<String, u32>,
    skins_by_key: HashMap<String, u32>,
    accessors_by_key: HashMap<AccessorKey, u32>,
    views_by_block: HashMap<BlockId, u32>,
    pending_skins: Vec<(u32, String)>,
}

impl<'a> DocumentBuilder<'a> {
    pub fn new(
        payload: &'a BinaryPayload,
        skins: &'a [model::Skin],
        detached_nodes: &'a [model::Node],
        asset: schema::Asset,
    ) -> Self {
        Self {
            payload,
            skins,
            detached_nodes,
            root: Root {
                asset,
                ..Default::default()
            },
            compression_extension: None,
            nodes_by_key: HashMap::new(),
            parented: HashSet::new(),
            meshes_by_key: HashMap::new(),
            materials_by_key: HashMap::new(),
            skins_by_key: HashMap::new(),
            accessors_by_key: HashMap::new(),
            views_by_block: HashMap::new(),
            pending_skins: Vec::new(),
        }
    }

    /// Mark the mesh compression extension as used and required.
    ///
    /// Compressed primitives are written under this extension name.
    pub fn add_compression_extension(&mut self, name: &str) {
        self.root.require_extension(name);
        self.compression_extension = Some(name.to_string());
    }

    /// Add every scene, flagging the one at `active_scene` as default
    pub fn add_scenes(&mut self, scenes: &[model::Scene], active_scene: usize) -> ExportResult<()> {
        if !scenes.is_empty() && active_scene >= scenes.len() {
            return Err(ExportError::assembly(format!(
                "active scene index {} out of range ({} scenes)",
                active_scene,
                scenes.len()
            )));
        }

        for (idx, scene) in scenes.iter().enumerate() {
            self.add_scene(scene, idx == active_scene)?;
        }
        Ok(())
    }

    pub fn add_scene(&mut self, scene: &model::Scene, is_active: bool) -> ExportResult<u32> {
        let mut nodes = Vec::with_capacity(scene.nodes.len());
        for node in &scene.nodes {
            nodes.push(self.add_node(node, false)?);
        }
        self.resolve_pending_skins()?;

        let index = self.root.scenes.len() as u32;
        self.root.scenes.push(schema::Scene {
            name: scene.name.clone(),
            nodes,
            extensions: scene.extensions.clone(),
            extras: scene.extras.clone(),
        });
        if is_active {
            self.root.scene = Some(index);
        }
        Ok(index)
    }

    /// Add an animation; animations without channels are skipped
    pub fn add_animation(&mut self, animation: &model::Animation) -> ExportResult<Option<u32>> {
        if animation.channels.is_empty() {
            tracing::warn!("Skipping animation {:?}: no channels", animation.name);
            return Ok(None);
        }

        let mut channels = Vec::with_capacity(animation.channels.len());
        let mut samplers = Vec::with_capacity(animation.channels.len());

        for channel in &animation.channels {
            let node = self.resolve_node(&channel.node)?;
            let input = self.add_accessor(&channel.sampler.input, None)?;
            let output = self.add_accessor(&channel.sampler.output, None)?;

            samplers.push(schema::AnimationSampler {
                input,
                interpolation: Some(channel.sampler.interpolation),
                output,
                extensions: Default::default(),
                extras: None,
            });
            channels.push(schema::Channel {
                sampler: samplers.len() as u32 - 1,
                target: schema::ChannelTarget {
                    node: Some(node),
                    path: channel.path,
                    extensions: Default::default(),
                    extras: None,
                },
                extensions: Default::default(),
                extras: None,
            });
        }
        self.resolve_pending_skins()?;

        let index = self.root.animations.len() as u32;
        self.root.animations.push(schema::Animation {
            name: animation.name.clone(),
            channels,
            samplers,
            extensions: animation.extensions.clone(),
            extras: animation.extras.clone(),
        });
        Ok(Some(index))
    }

    /// Serialize skins no emitted scene references
    pub fn add_unused_skins(&mut self, skins: &[&model::Skin]) -> ExportResult<()> {
        for skin in skins {
            self.add_skin(skin)?;
        }
        self.resolve_pending_skins()
    }

    pub fn finish(self) -> Root {
        self.root
    }

    fn add_node(&mut self, node: &model::Node, has_parent: bool) -> ExportResult<u32> {
        if let Some(index) = keyed(&self.nodes_by_key, &node.key) {
            if has_parent || self.parented.contains(&index) {
                return Err(ExportError::assembly(format!(
                    "node '{}' is reachable from more than one parent",
                    node.key
                )));
            }
            return Ok(index);
        }

        let index = self.root.nodes.len() as u32;
        remember(&mut self.nodes_by_key, &node.key, index);
        if has_parent {
            self.parented.insert(index);
        }

        self.root.nodes.push(schema::Node {
            name: node.name.clone(),
            matrix: node.matrix,
            rotation: node.rotation,
            scale: node.scale,
            translation: node.translation,
            weights: node.weights.clone(),
            extensions: node.extensions.clone(),
            extras: node.extras.clone(),
            ..Default::default()
        });

        let mesh = match &node.mesh {
            Some(mesh) => Some(self.add_mesh(mesh)?),
            None => None,
        };
        if let Some(skin) = &node.skin {
            self.pending_skins.push((index, skin.clone()));
        }

        let mut children = Vec::with_capacity(node.children.len());
        for child in &node.children {
            children.push(self.add_node(child, true)?);
        }

        let entry = &mut self.root.nodes[index as usize];
        entry.mesh = mesh;
        entry.children = children;
        Ok(index)
    }

    /// Index of an already added node, or add it from the detached nodes.
    ///
    /// A detached node is always added together with the whole detached
    /// tree containing it, so its ancestors keep their hierarchy no matter
    /// which node of the tree is resolved first.
    fn resolve_node(&mut self, key: &str) -> ExportResult<u32> {
        if let Some(index) = keyed(&self.nodes_by_key, key) {
            return Ok(index);
        }

        let unknown = || ExportError::assembly(format!("unknown node '{}'", key));
        if key.is_empty() {
            return Err(unknown());
        }

        let detached = self.detached_nodes;
        let tree = detached
            .iter()
            .find(|root| find_node(std::slice::from_ref(*root), key).is_some())
            .ok_or_else(unknown)?;
        self.add_node(tree, false)?;
        keyed(&self.nodes_by_key, key).ok_or_else(unknown)
    }

    fn resolve_pending_skins(&mut self) -> ExportResult<()> {
        // Joints pulled in from detached nodes may carry skins of their own
        while !self.pending_skins.is_empty() {
            let pending = std::mem::take(&mut self.pending_skins);
            for (node, key) in pending {
                let skins = self.skins;
                let skin = skins
                    .iter()
                    .find(|s| !key.is_empty() && s.key == key)
                    .ok_or_else(|| {
                        ExportError::assembly(format!(
                            "node {} references unknown skin '{}'",
                            node, key
                        ))
                    })?;
                let index = self.add_skin(skin)?;
                self.root.nodes[node as usize].skin = Some(index);
            }
        }
        Ok(())
    }

    fn add_skin(&mut self, skin: &model::Skin) -> ExportResult<u32> {
        if let Some(index) = keyed(&self.skins_by_key, &skin.key) {
            return Ok(index);
        }

        let mut joints = Vec::with_capacity(skin.joints.len());
        for joint in &skin.joints {
            joints.push(self.resolve_node(joint)?);
        }
        let skeleton = match skin.skeleton.as_deref() {
            Some(key) => Some(self.resolve_node(key)?),
            None => None,
        };
        let inverse_bind_matrices = match &skin.inverse_bind_matrices {
            Some(accessor) => Some(self.add_accessor(accessor, None)?),
            None => None,
        };

        let index = self.root.skins.len() as u32;
        self.root.skins.push(schema::Skin {
            name: skin.name.clone(),
            inverse_bind_matrices,
            joints,
            skeleton,
            extensions: skin.extensions.clone(),
            extras: skin.extras.clone(),
        });
        remember(&mut self.skins_by_key, &skin.key, index);
        Ok(index)
    }

    fn add_mesh(&mut self, mesh: &model::Mesh) -> ExportResult<u32> {
        if let Some(index) = keyed(&self.meshes_by_key, &mesh.key) {
            return Ok(index);
        }

        let mut primitives = Vec::with_capacity(mesh.primitives.len());
        for primitive in &mesh.primitives {
            primitives.push(self.add_primitive(primitive)?);
        }

        let index = self.root.meshes.len() as u32;
        self.root.meshes.push(schema::Mesh {
            name: mesh.name.clone(),
            primitives,
            weights: mesh.weights.clone(),
            extensions: mesh.extensions.clone(),
            extras: mesh.extras.clone(),
        });
        remember(&mut self.meshes_by_key, &mesh.key, index);
        Ok(index)
    }

    fn add_primitive(&mut self, primitive: &model::Primitive) -> ExportResult<schema::Primitive> {
        let mut attributes = BTreeMap::new();
        for (semantic, accessor) in &primitive.attributes {
            let index = self.add_accessor(accessor, Some(TARGET_ARRAY_BUFFER))?;
            attributes.insert(semantic.clone(), index);
        }

        let indices = match &primitive.indices {
            Some(accessor) => Some(self.add_accessor(accessor, Some(TARGET_ELEMENT_ARRAY_BUFFER))?),
            None => None,
        };
        let material = match &primitive.material {
            Some(material) => Some(self.add_material(material)),
            None => None,
        };

        let mut targets = Vec::with_capacity(primitive.targets.len());
        for target in &primitive.targets {
            let mut morph = BTreeMap::new();
            for (semantic, accessor) in target {
                morph.insert(
                    semantic.clone(),
                    self.add_accessor(accessor, Some(TARGET_ARRAY_BUFFER))?,
                );
            }
            targets.push(morph);
        }

        let mut extensions = primitive.extensions.clone();
        if let Some(compressed) = &primitive.compressed {
            let view = self.view_for(compressed.block, None)?;
            let mut encoded = Map::new();
            encoded.insert("bufferView".to_string(), Value::from(view));
            encoded.insert(
                "attributes".to_string(),
                Value::Object(
                    compressed
                        .attributes
                        .iter()
                        .map(|(name, id)| (name.clone(), Value::from(*id)))
                        .collect(),
                ),
            );
            let name = self
                .compression_extension
                .clone()
                .unwrap_or_else(|| KHR_DRACO_MESH_COMPRESSION.to_string());
            extensions.insert(name, Value::Object(encoded));
        }

        Ok(schema::Primitive {
            attributes,
            indices,
            material,
            mode: primitive.mode,
            targets,
            extensions,
            extras: primitive.extras.clone(),
        })
    }

    fn add_material(&mut self, material: &model::Material) -> u32 {
        if let Some(index) = keyed(&self.materials_by_key, &material.key) {
            return index;
        }

        let index = self.root.materials.len() as u32;
        self.root.materials.push(schema::Material {
            name: material.name.clone(),
            properties: material.properties.clone(),
            extensions: material.extensions.clone(),
            extras: material.extras.clone(),
        });
        remember(&mut self.materials_by_key, &material.key, index);
        index
    }

    fn add_accessor(
        &mut self,
        accessor: &model::Accessor,
        target: Option<u32>,
    ) -> ExportResult<u32> {
        let key = AccessorKey::of(accessor);
        if let Some(index) = key.as_ref().and_then(|k| self.accessors_by_key.get(k).copied()) {
            return Ok(index);
        }

        let buffer_view = match accessor.block {
            Some(block) => Some(self.view_for(block, target)?),
            None => None,
        };

        let index = self.root.accessors.len() as u32;
        self.root.accessors.push(schema::Accessor {
            buffer_view,
            byte_offset: None,
            component_type: accessor.component_type.code(),
            normalized: accessor.normalized.then_some(true),
            count: accessor.count,
            kind: accessor.kind,
            max: accessor.max.clone(),
            min: accessor.min.clone(),
            name: accessor.name.clone(),
            extensions: Default::default(),
            extras: None,
        });
        if let Some(key) = key {
            self.accessors_by_key.insert(key, index);
        }
        Ok(index)
    }

    fn view_for(&mut self, block: BlockId, target: Option<u32>) -> ExportResult<u32> {
        if let Some(&index) = self.views_by_block.get(&block) {
            return Ok(index);
        }

        let byte_length = match self.payload.get(block) {
            Some([]) => {
                return Err(ExportError::assembly(format!(
                    "buffer block {} is empty",
                    block.0
                )));
            }
            Some(bytes) => bytes.len() as u64,
            None => {
                return Err(ExportError::assembly(format!(
                    "buffer block {} was never registered",
                    block.0
                )));
            }
        };

        let index = self.root.buffer_views.len() as u32;
        self.root.buffer_views.push(schema::BufferView {
            buffer: 0,
            byte_length,
            target,
            block: Some(block),
            ..Default::default()
        });
        self.views_by_block.insert(block, index);
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Accessor, Animation, Channel, Material, Mesh, Node, Primitive, Sampler, Scene, Skin};
    use serde_json::json;

    fn node(key: &str) -> Node {
        Node {
            key: key.to_string(),
            name: Some(key.to_string()),
            ..Default::default()
        }
    }

    fn accessor(block: u32, kind: AccessorType, count: u64) -> Accessor {
        Accessor {
            block: Some(BlockId(block)),
            kind,
            count,
            ..Default::default()
        }
    }

    fn triangle_mesh(key: &str) -> Mesh {
        Mesh {
            key: key.to_string(),
            primitives: vec![Primitive {
                attributes: [("POSITION".to_string(), accessor(0, AccessorType::Vec3, 3))]
                    .into_iter()
                    .collect(),
                indices: Some(Accessor {
                    component_type: ComponentType::U16,
                    ..accessor(1, AccessorType::Scalar, 3)
                }),
                material: Some(Material {
                    key: "flat".to_string(),
                    extensions: json!({"KHR_materials_unlit": {}}).as_object().unwrap().clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn payload() -> BinaryPayload {
        let mut payload = BinaryPayload::new();
        payload.pack_vec3(&[[0.0; 3]; 3]);
        payload.pack_indices_u16(&[0, 1, 2]);
        payload.pack_scalars(&[0.0, 1.0]);
        payload.pack_vec3(&[[0.0; 3], [1.0; 3]]);
        payload
    }

    fn asset() -> schema::Asset {
        schema::Asset::default()
    }

    #[test]
    fn test_nodes_flattened_parent_first() {
        let payload = payload();
        let mut builder = DocumentBuilder::new(&payload, &[], &[], asset());

        let mut root_node = node("root");
        let mut arm = node("arm");
        arm.children.push(node("hand"));
        root_node.children = vec![arm, node("leg")];
        let scene = Scene {
            nodes: vec![root_node, node("lamp")],
            ..Default::default()
        };

        builder.add_scenes(&[scene], 0).unwrap();
        let root = builder.finish();

        let names: Vec<_> = root.nodes.iter().map(|n| n.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["root", "arm", "hand", "leg", "lamp"]);
        assert_eq!(root.nodes[0].children, vec![1, 3]);
        assert_eq!(root.nodes[1].children, vec![2]);
        assert_eq!(root.scenes[0].nodes, vec![0, 4]);
        assert_eq!(root.scene, Some(0));
    }

    #[test]
    fn test_exactly_one_active_scene() {
        let payload = payload();
        let mut builder = DocumentBuilder::new(&payload, &[], &[], asset());
        let scenes = vec![
            Scene {
                nodes: vec![node("a")],
                ..Default::default()
            },
            Scene {
                nodes: vec![node("b")],
                ..Default::default()
            },
        ];
        builder.add_scenes(&scenes, 1).unwrap();
        assert_eq!(builder.finish().scene, Some(1));
    }

    #[test]
    fn test_active_scene_out_of_range() {
        let payload = payload();
        let mut builder = DocumentBuilder::new(&payload, &[], &[], asset());
        let err = builder
            .add_scenes(&[Scene::default()], 3)
            .unwrap_err();
        assert!(matches!(err, ExportError::Assembly { .. }));
    }

    #[test]
    fn test_shared_mesh_and_accessors_deduplicated() {
        let payload = payload();
        let mut builder = DocumentBuilder::new(&payload, &[], &[], asset());

        let mut a = node("a");
        a.mesh = Some(triangle_mesh("tri"));
        let mut b = node("b");
        b.mesh = Some(triangle_mesh("tri"));
        let scene = Scene {
            nodes: vec![a, b],
            ..Default::default()
        };

        builder.add_scenes(&[scene], 0).unwrap();
        let root = builder.finish();

        assert_eq!(root.meshes.len(), 1);
        assert_eq!(root.materials.len(), 1);
        assert_eq!(root.accessors.len(), 2);
        assert_eq!(root.nodes[0].mesh, Some(0));
        assert_eq!(root.nodes[1].mesh, Some(0));

        assert_eq!(root.buffer_views.len(), 2);
        assert_eq!(root.buffer_views[0].block, Some(BlockId(0)));
        assert_eq!(root.buffer_views[0].byte_length, 36);
        assert_eq!(root.buffer_views[0].target, Some(TARGET_ARRAY_BUFFER));
        assert_eq!(root.buffer_views[1].byte_length, 6);
        assert_eq!(root.buffer_views[1].target, Some(TARGET_ELEMENT_ARRAY_BUFFER));
        assert_eq!(root.accessors[1].component_type, 5123);
    }

    #[test]
    fn test_accessors_with_different_bounds_kept_apart() {
        let payload = payload();
        let mut builder = DocumentBuilder::new(&payload, &[], &[], asset());

        let bounded = |min: f64, name: Option<&str>| Accessor {
            min: Some(vec![min; 3]),
            max: Some(vec![1.0; 3]),
            name: name.map(str::to_string),
            ..accessor(0, AccessorType::Vec3, 3)
        };
        let mesh = Mesh {
            key: "variants".to_string(),
            primitives: [
                bounded(0.0, None),
                bounded(-1.0, None),
                bounded(0.0, Some("named")),
                bounded(0.0, None),
            ]
            .into_iter()
            .map(|position| Primitive {
                attributes: [("POSITION".to_string(), position)].into_iter().collect(),
                ..Default::default()
            })
            .collect(),
            ..Default::default()
        };
        let mut n = node("n");
        n.mesh = Some(mesh);
        builder
            .add_scenes(
                &[Scene {
                    nodes: vec![n],
                    ..Default::default()
                }],
                0,
            )
            .unwrap();
        let root = builder.finish();

        assert_eq!(root.accessors.len(), 3);
        assert_eq!(root.accessors[1].min, Some(vec![-1.0; 3]));
        assert_eq!(root.accessors[2].name.as_deref(), Some("named"));
        assert_eq!(root.meshes[0].primitives[3].attributes["POSITION"], 0);
        // One view per block regardless
        assert_eq!(root.buffer_views.len(), 1);
    }

    #[test]
    fn test_unregistered_block_is_assembly_error() {
        let payload = payload();
        let mut builder = DocumentBuilder::new(&payload, &[], &[], asset());

        let mut n = node("n");
        n.mesh = Some(Mesh {
            key: "broken".to_string(),
            primitives: vec![Primitive {
                attributes: [("POSITION".to_string(), accessor(99, AccessorType::Vec3, 3))]
                    .into_iter()
                    .collect(),
                ..Default::default()
            }],
            ..Default::default()
        });
        let scene = Scene {
            nodes: vec![n],
            ..Default::default()
        };

        let err = builder.add_scenes(&[scene], 0).unwrap_err();
        assert!(err.to_string().contains("never registered"));
    }

    #[test]
    fn test_skin_joints_resolved_after_scene() {
        let payload = payload();
        let skins = vec![Skin {
            key: "rig".to_string(),
            joints: vec!["bone".to_string()],
            skeleton: Some("bone".to_string()),
            ..Default::default()
        }];
        let mut builder = DocumentBuilder::new(&payload, &skins, &[], asset());

        let mut body = node("body");
        body.skin = Some("rig".to_string());
        // Joint appears after the skinned node
        let scene = Scene {
            nodes: vec![body, node("bone")],
            ..Default::default()
        };

        builder.add_scenes(&[scene], 0).unwrap();
        let root = builder.finish();
        assert_eq!(root.nodes[0].skin, Some(0));
        assert_eq!(root.skins[0].joints, vec![1]);
        assert_eq!(root.skins[0].skeleton, Some(1));
    }

    #[test]
    fn test_unknown_skin_is_assembly_error() {
        let payload = payload();
        let mut builder = DocumentBuilder::new(&payload, &[], &[], asset());
        let mut body = node("body");
        body.skin = Some("missing".to_string());
        let scene = Scene {
            nodes: vec![body],
            ..Default::default()
        };
        let err = builder.add_scenes(&[scene], 0).unwrap_err();
        assert!(err.to_string().contains("unknown skin 'missing'"));
    }

    #[test]
    fn test_unused_skin_pulls_in_detached_joints() {
        let payload = payload();
        let skins = vec![Skin {
            key: "spare".to_string(),
            joints: vec!["spare_bone".to_string()],
            ..Default::default()
        }];
        let mut armature = node("armature");
        armature.children.push(node("spare_bone"));
        let detached = vec![armature];

        let mut builder = DocumentBuilder::new(&payload, &skins, &detached, asset());
        let scene = Scene {
            nodes: vec![node("visible")],
            ..Default::default()
        };
        builder.add_scenes(&[scene], 0).unwrap();
        let unused: Vec<&Skin> = skins.iter().collect();
        builder.add_unused_skins(&unused).unwrap();
        let root = builder.finish();

        assert_eq!(root.skins.len(), 1);
        // The armature comes along with its bone
        assert_eq!(root.nodes.len(), 3);
        assert_eq!(root.nodes[1].name.as_deref(), Some("armature"));
        assert_eq!(root.nodes[1].children, vec![2]);
        assert_eq!(root.skins[0].joints, vec![2]);
        // Not referenced by any scene
        assert_eq!(root.scenes[0].nodes, vec![0]);
    }

    #[test]
    fn test_unused_skin_child_joint_listed_first() {
        let payload = payload();
        let skins = vec![Skin {
            key: "rig".to_string(),
            joints: vec!["hand".to_string(), "arm".to_string()],
            ..Default::default()
        }];
        let mut arm = node("arm");
        arm.children.push(node("hand"));
        let detached = vec![arm];

        let mut builder = DocumentBuilder::new(&payload, &skins, &detached, asset());
        let unused: Vec<&Skin> = skins.iter().collect();
        builder.add_unused_skins(&unused).unwrap();
        let root = builder.finish();

        let names: Vec<_> = root.nodes.iter().map(|n| n.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["arm", "hand"]);
        assert_eq!(root.nodes[0].children, vec![1]);
        assert_eq!(root.skins[0].joints, vec![1, 0]);
    }

    #[test]
    fn test_animation_targets_detached_child_before_parent() {
        let payload = payload();
        let mut arm = node("arm");
        arm.children.push(node("hand"));
        let detached = vec![arm];
        let mut builder = DocumentBuilder::new(&payload, &[], &detached, asset());

        let channel = |target: &str| Channel {
            node: target.to_string(),
            path: model::TargetPath::Translation,
            sampler: Sampler {
                input: accessor(2, AccessorType::Scalar, 2),
                output: accessor(3, AccessorType::Vec3, 2),
                interpolation: model::Interpolation::Linear,
            },
        };
        let animation = Animation {
            channels: vec![channel("hand"), channel("arm")],
            ..Default::default()
        };

        assert_eq!(builder.add_animation(&animation).unwrap(), Some(0));
        let root = builder.finish();
        assert_eq!(root.nodes.len(), 2);
        assert_eq!(root.animations[0].channels[0].target.node, Some(1));
        assert_eq!(root.animations[0].channels[1].target.node, Some(0));
    }

    #[test]
    fn test_animation_channels_and_samplers() {
        let payload = payload();
        let mut builder = DocumentBuilder::new(&payload, &[], &[], asset());
        builder
            .add_scenes(
                &[Scene {
                    nodes: vec![node("cube")],
                    ..Default::default()
                }],
                0,
            )
            .unwrap();

        let times = accessor(2, AccessorType::Scalar, 2);
        let animation = Animation {
            name: Some("move".to_string()),
            channels: vec![
                Channel {
                    node: "cube".to_string(),
                    path: model::TargetPath::Translation,
                    sampler: Sampler {
                        input: times.clone(),
                        output: accessor(3, AccessorType::Vec3, 2),
                        interpolation: model::Interpolation::Linear,
                    },
                },
                Channel {
                    node: "cube".to_string(),
                    path: model::TargetPath::Scale,
                    sampler: Sampler {
                        input: times,
                        output: accessor(3, AccessorType::Vec3, 2),
                        interpolation: model::Interpolation::Step,
                    },
                },
            ],
            ..Default::default()
        };

        assert_eq!(builder.add_animation(&animation).unwrap(), Some(0));
        let root = builder.finish();
        let anim = &root.animations[0];
        assert_eq!(anim.channels.len(), 2);
        assert_eq!(anim.samplers.len(), 2);
        assert_eq!(anim.channels[1].sampler, 1);
        // Input and output accessors are shared across channels
        assert_eq!(root.accessors.len(), 2);
        assert_eq!(anim.samplers[0].input, anim.samplers[1].input);
    }

    #[test]
    fn test_animation_with_unknown_target() {
        let payload = payload();
        let mut builder = DocumentBuilder::new(&payload, &[], &[], asset());
        let animation = Animation {
            channels: vec![Channel {
                node: "ghost".to_string(),
                path: model::TargetPath::Rotation,
                sampler: Sampler {
                    input: accessor(2, AccessorType::Scalar, 2),
                    output: accessor(3, AccessorType::Vec4, 2),
                    interpolation: model::Interpolation::Linear,
                },
            }],
            ..Default::default()
        };
        let err = builder.add_animation(&animation).unwrap_err();
        assert!(err.to_string().contains("unknown node 'ghost'"));
    }

    #[test]
    fn test_empty_animation_skipped() {
        let payload = payload();
        let mut builder = DocumentBuilder::new(&payload, &[], &[], asset());
        assert_eq!(builder.add_animation(&Animation::default()).unwrap(), None);
        assert!(builder.finish().animations.is_empty());
    }

    #[test]
    fn test_node_with_two_parents_rejected() {
        let payload = payload();
        let mut builder = DocumentBuilder::new(&payload, &[], &[], asset());
        let mut a = node("a");
        a.children.push(node("shared"));
        let mut b = node("b");
        b.children.push(node("shared"));
        let scene = Scene {
            nodes: vec![a, b],
            ..Default::default()
        };
        let err = builder.add_scenes(&[scene], 0).unwrap_err();
        assert!(err.to_string().contains("more than one parent"));
    }

    #[test]
    fn test_root_node_shared_between_scenes() {
        let payload = payload();
        let mut builder = DocumentBuilder::new(&payload, &[], &[], asset());
        let scenes = vec![
            Scene {
                nodes: vec![node("shared")],
                ..Default::default()
            },
            Scene {
                nodes: vec![node("shared")],
                ..Default::default()
            },
        ];
        builder.add_scenes(&scenes, 0).unwrap();
        let root = builder.finish();
        assert_eq!(root.nodes.len(), 1);
        assert_eq!(root.scenes[1].nodes, vec![0]);
    }

    #[test]
    fn test_compressed_primitive_references_view() {
        let mut payload = payload();
        let encoded = payload.push(vec![7; 5]);

        let mut builder = DocumentBuilder::new(&payload, &[], &[], asset());
        builder.add_compression_extension(KHR_DRACO_MESH_COMPRESSION);

        let mut n = node("n");
        n.mesh = Some(Mesh {
            key: "packed".to_string(),
            primitives: vec![Primitive {
                attributes: [(
                    "POSITION".to_string(),
                    Accessor {
                        block: None,
                        kind: AccessorType::Vec3,
                        count: 3,
                        ..Default::default()
                    },
                )]
                .into_iter()
                .collect(),
                compressed: Some(model::CompressedPrimitive {
                    block: encoded,
                    attributes: [("POSITION".to_string(), 0)].into_iter().collect(),
                }),
                ..Default::default()
            }],
            ..Default::default()
        });
        builder
            .add_scenes(
                &[Scene {
                    nodes: vec![n],
                    ..Default::default()
                }],
                0,
            )
            .unwrap();
        let root = builder.finish();

        assert_eq!(root.extensions_required, vec![KHR_DRACO_MESH_COMPRESSION]);
        assert_eq!(root.accessors[0].buffer_view, None);
        assert_eq!(root.buffer_views.len(), 1);
        assert_eq!(root.buffer_views[0].block, Some(encoded));
        assert_eq!(
            root.meshes[0].primitives[0].extensions[KHR_DRACO_MESH_COMPRESSION],
            json!({"bufferView": 0, "attributes": {"POSITION": 0}})
        );
    }
}
