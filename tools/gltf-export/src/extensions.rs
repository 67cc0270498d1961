//! Extension hooks, mesh compression seam and extension bookkeeping

use glb_builder::BinaryPayload;
use serde_json::Value;

use crate::error::{ExportError, ExportResult};
use crate::model::{Animation, Primitive, Scene};
use crate::schema::Root;
use crate::settings::ExportOptions;

pub const KHR_DRACO_MESH_COMPRESSION: &str = "KHR_draco_mesh_compression";
pub const KHR_MATERIALS_UNLIT: &str = "KHR_materials_unlit";

/// User extension invoked at the fixed hook points of an export.
///
/// Both hooks default to doing nothing; an error aborts the export.
pub trait ExportExtension {
    fn name(&self) -> &str;

    /// Runs after gathering, before the document is assembled
    fn gather_gltf_hook(
        &mut self,
        _options: &ExportOptions,
        _active_scene: usize,
        _scenes: &mut Vec<Scene>,
        _animations: &mut Vec<Animation>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs on the assembled document, before canonicalization
    fn gather_gltf_extensions_hook(
        &mut self,
        _options: &ExportOptions,
        _root: &mut Root,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Mesh Compression Encoder seam.
///
/// Implementations register the encoded bytes in the payload, set
/// [`Primitive::compressed`] and usually clear the `block` of the accessors
/// they replaced.
pub trait MeshCompressor {
    /// Extension marked used and required when compression runs
    fn extension_name(&self) -> &str {
        KHR_DRACO_MESH_COMPRESSION
    }

    fn encode_primitive(
        &mut self,
        primitive: &mut Primitive,
        payload: &mut BinaryPayload,
    ) -> anyhow::Result<()>;
}

/// Apply the encoder to every primitive of every scene, returning the number
/// of primitives encoded.
///
/// Meshes shared by key are encoded once per occurrence; assembly keeps the
/// first occurrence.
pub fn encode_scene_primitives(
    scenes: &mut [Scene],
    compressor: &mut dyn MeshCompressor,
    payload: &mut BinaryPayload,
) -> ExportResult<usize> {
    let mut encoded = 0;
    let mut failure = None;

    for scene in scenes.iter_mut() {
        for root in &mut scene.nodes {
            root.walk_mut(&mut |node| {
                if failure.is_some() {
                    return;
                }
                let Some(mesh) = node.mesh.as_mut() else {
                    return;
                };
                for primitive in &mut mesh.primitives {
                    if let Err(source) = compressor.encode_primitive(primitive, payload) {
                        failure = Some(ExportError::Compression {
                            mesh: mesh.key.clone(),
                            source,
                        });
                        return;
                    }
                    encoded += 1;
                }
            });
        }
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(encoded),
    }
}

/// Declare every extension used anywhere in the document at the root.
///
/// Names are appended to `extensionsUsed` in discovery order. Extension
/// payloads are searched too, so nested usages are found in the same pass;
/// `extras` is opaque and skipped.
pub fn traverse_extensions(root: &mut Root) -> ExportResult<()> {
    let value = serde_json::to_value(&*root)?;
    let mut names = Vec::new();
    collect_extension_names(&value, &mut names);

    for name in &names {
        root.use_extension(name);
    }
    Ok(())
}

fn collect_extension_names(value: &Value, names: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match key.as_str() {
                    "extras" => continue,
                    "extensions" => {
                        if let Value::Object(extensions) = child {
                            for name in extensions.keys() {
                                if !names.contains(name) {
                                    names.push(name.clone());
                                }
                            }
                        }
                    }
                    _ => {}
                }
                collect_extension_names(child, names);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_extension_names(item, names);
            }
        }
        _ => {}
    }
}
