//! Export orchestrator
//!
//! Drives one export from pre-export callbacks to the optional gltfpack
//! pass. Stages run strictly in sequence; the first failure aborts the rest.
//! The timeline position captured on entry is restored on every exit path.

use glb_builder::BinaryPayload;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::assemble::DocumentBuilder;
use crate::buffers::finalize_buffers;
use crate::canonical::canonicalize;
use crate::error::{ExportError, ExportResult, HookStage};
use crate::extensions::{encode_scene_primitives, traverse_extensions, MeshCompressor};
use crate::host::{FrameGuard, Host};
use crate::model::{unused_skins, GatheredDocument, SceneGatherer};
use crate::repack::repack;
use crate::schema::Asset;
use crate::settings::ExportSettings;
use crate::write::{write_artifacts, WrittenArtifacts};

/// Collaborators of one export call
pub struct ExportContext<'a> {
    pub host: &'a mut dyn Host,
    pub gatherer: &'a mut dyn SceneGatherer,
    /// Used only when mesh compression is enabled
    pub compressor: Option<&'a mut dyn MeshCompressor>,
}

impl<'a> ExportContext<'a> {
    pub fn new(host: &'a mut dyn Host, gatherer: &'a mut dyn SceneGatherer) -> Self {
        Self {
            host,
            gatherer,
            compressor: None,
        }
    }

    pub fn with_compressor(mut self, compressor: &'a mut dyn MeshCompressor) -> Self {
        self.compressor = Some(compressor);
        self
    }
}

/// Outcome of a successful export
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub artifacts: WrittenArtifacts,
    /// gltfpack output, when repacking ran and succeeded
    pub repacked: Option<PathBuf>,
    pub elapsed: Duration,
}

/// Generator string written to `asset.generator`
pub fn generator() -> String {
    format!("gltf-export v{}", env!("CARGO_PKG_VERSION"))
}

/// Run a complete export
pub fn run(context: ExportContext<'_>, settings: &mut ExportSettings) -> ExportResult<ExportReport> {
    let start = Instant::now();
    let ExportContext {
        host,
        gatherer,
        compressor,
    } = context;

    host.ensure_object_mode();
    let mut guard = FrameGuard::capture(host);
    if !settings.options.flags.current_frame {
        guard.set_frame(0);
    }

    tracing::info!("Starting glTF 2.0 export");
    guard.progress_begin(0, 100);
    guard.progress_update(0);

    let (artifacts, repacked) = match export_pipeline(&mut *guard, gatherer, compressor, settings) {
        Ok(outcome) => outcome,
        Err(err) => {
            err.log_diagnostics();
            return Err(err);
        }
    };

    guard.restore();

    let elapsed = start.elapsed();
    tracing::info!("Finished glTF 2.0 export in {:.3} s", elapsed.as_secs_f64());
    guard.progress_end();

    Ok(ExportReport {
        artifacts,
        repacked,
        elapsed,
    })
}

fn export_pipeline(
    host: &mut dyn Host,
    gatherer: &mut dyn SceneGatherer,
    compressor: Option<&mut dyn MeshCompressor>,
    settings: &mut ExportSettings,
) -> ExportResult<(WrittenArtifacts, Option<PathBuf>)> {
    let ExportSettings { options, hooks } = settings;

    for callback in &mut hooks.pre_export {
        callback(&mut *options).map_err(ExportError::hook(HookStage::PreExport))?;
    }
    // Fixed from here on; later callbacks cannot switch the buffer layout
    let format = options.format;
    host.progress_update(10);

    let mut payload = BinaryPayload::new();
    let GatheredDocument {
        active_scene,
        mut scenes,
        mut animations,
        skins,
        detached_nodes,
    } = gatherer
        .gather(options, &mut payload)
        .map_err(ExportError::Gather)?;
    tracing::debug!(
        "Gathered {} scenes, {} animations, {} blocks",
        scenes.len(),
        animations.len(),
        payload.len()
    );

    let unused = unused_skins(&scenes, &skins);
    host.progress_update(40);

    let mut compression_extension = None;
    if options.flags.draco_mesh_compression {
        match compressor {
            Some(compressor) => {
                let encoded = encode_scene_primitives(&mut scenes, compressor, &mut payload)?;
                tracing::debug!("Compressed {} primitives", encoded);
                compression_extension = Some(compressor.extension_name().to_string());
            }
            None => {
                tracing::warn!("Mesh compression requested but no encoder is available, skipping");
            }
        }
    }

    for extension in &mut hooks.extensions {
        extension
            .gather_gltf_hook(options, active_scene, &mut scenes, &mut animations)
            .map_err(ExportError::hook(HookStage::PostGather))?;
    }

    let asset = Asset {
        generator: Some(generator()),
        copyright: options.copyright.clone(),
        ..Default::default()
    };
    let mut builder = DocumentBuilder::new(&payload, &skins, &detached_nodes, asset);
    if let Some(name) = &compression_extension {
        builder.add_compression_extension(name);
    }
    builder.add_scenes(&scenes, active_scene)?;
    for animation in &animations {
        builder.add_animation(animation)?;
    }
    builder.add_unused_skins(&unused)?;
    let mut root = builder.finish();
    host.progress_update(60);

    let buffer = finalize_buffers(&mut root, &payload, format, &options.paths.binary_filename)?;

    for extension in &mut hooks.extensions {
        extension
            .gather_gltf_extensions_hook(options, &mut root)
            .map_err(ExportError::hook(HookStage::PostBuild))?;
    }

    traverse_extensions(&mut root)?;
    let document = canonicalize(&serde_json::to_value(&root)?);
    host.progress_update(80);

    for callback in &mut hooks.post_export {
        callback(&mut *options).map_err(ExportError::hook(HookStage::PostExport))?;
    }

    let artifacts = write_artifacts(&document, &buffer, format, &options.paths)?;
    host.progress_update(90);

    let repacked = if options.flags.use_gltfpack {
        match repack(&artifacts.primary, &options.repack) {
            Ok(path) => {
                tracing::info!("Repacked to {}", path.display());
                Some(path)
            }
            Err(err) => {
                tracing::error!("Calling gltfpack was not successful: {}", err);
                None
            }
        }
    } else {
        None
    };
    host.progress_update(100);

    Ok((artifacts, repacked))
}
