//! JSON scene description gatherer
//!
//! Reads an already gathered scene from disk. The file holds the
//! [`GatheredDocument`] fields plus a `buffers` list; accessors refer to
//! buffers by position, which becomes their [`glb_builder::BlockId`].
//!
//! ```json
//! {
//!     "buffers": [{"uri": "data:application/octet-stream;base64,AAAA"}, {"uri": "mesh.bin"}],
//!     "active_scene": 0,
//!     "scenes": [{"nodes": [{"key": "cube"}]}]
//! }
//! ```

use anyhow::{anyhow, bail, Context, Result};
use glb_builder::{compute_bounds, decode_data_uri, unpack_vec3, BinaryPayload};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::model::{AccessorType, ComponentType, GatheredDocument, Node, SceneGatherer};
use crate::settings::ExportOptions;

#[derive(Debug, Deserialize)]
struct SceneFile {
    #[serde(default)]
    buffers: Vec<SceneBuffer>,
    #[serde(flatten)]
    document: GatheredDocument,
}

#[derive(Debug, Deserialize)]
struct SceneBuffer {
    /// Data URI, or a path relative to the scene file
    uri: String,
}

/// [`SceneGatherer`] backed by a JSON scene file
#[derive(Debug, Clone)]
pub struct SceneFileGatherer {
    path: PathBuf,
}

impl SceneFileGatherer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load_buffer(&self, uri: &str) -> Result<Vec<u8>> {
        if uri.starts_with("data:") {
            return decode_data_uri(uri).ok_or_else(|| anyhow!("Invalid data URI"));
        }

        let base = self.path.parent().unwrap_or(Path::new(""));
        let path = base.join(uri);
        std::fs::read(&path).with_context(|| format!("Failed to read buffer: {}", path.display()))
    }
}

impl SceneGatherer for SceneFileGatherer {
    fn gather(
        &mut self,
        _options: &ExportOptions,
        payload: &mut BinaryPayload,
    ) -> Result<GatheredDocument> {
        if !payload.is_empty() {
            bail!("Scene files must be gathered into an empty payload");
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read scene file: {}", self.path.display()))?;
        let mut file: SceneFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scene file: {}", self.path.display()))?;

        for (idx, buffer) in file.buffers.iter().enumerate() {
            let bytes = self
                .load_buffer(&buffer.uri)
                .with_context(|| format!("Failed to load buffer {}", idx))?;
            payload.push(bytes);
        }

        for root in file
            .document
            .scenes
            .iter_mut()
            .flat_map(|scene| scene.nodes.iter_mut())
            .chain(file.document.detached_nodes.iter_mut())
        {
            fill_position_bounds(root, payload);
        }

        Ok(file.document)
    }
}

/// POSITION accessors need bounds; compute the ones the file left out
fn fill_position_bounds(root: &mut Node, payload: &BinaryPayload) {
    root.walk_mut(&mut |node| {
        let Some(mesh) = node.mesh.as_mut() else {
            return;
        };
        for primitive in &mut mesh.primitives {
            let Some(position) = primitive.attributes.get_mut("POSITION") else {
                continue;
            };
            if (position.min.is_some() && position.max.is_some())
                || position.component_type != ComponentType::F32
                || position.kind != AccessorType::Vec3
            {
                continue;
            }

            let Some(bytes) = position.block.and_then(|block| payload.get(block)) else {
                continue;
            };
            let positions = unpack_vec3(bytes);
            if positions.is_empty() {
                continue;
            }

            let (min, max) = compute_bounds(&positions);
            position.min = Some(min.into_iter().map(f64::from).collect());
            position.max = Some(max.into_iter().map(f64::from).collect());
        }
    });
}
