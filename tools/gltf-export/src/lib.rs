//! glTF 2.0 export pipeline
//!
//! Turns an already gathered scene into `.glb` / `.gltf` artifacts:
//! document assembly, buffer finalization, JSON canonicalization, writing and
//! an optional gltfpack pass. Scene gathering, mesh compression and the host
//! application are collaborators behind the [`SceneGatherer`],
//! [`MeshCompressor`] and [`Host`] traits.

pub mod assemble;
pub mod buffers;
pub mod canonical;
pub mod config;
pub mod error;
pub mod export;
pub mod extensions;
pub mod host;
pub mod model;
pub mod repack;
pub mod scene_file;
pub mod schema;
pub mod settings;
pub mod write;

// Re-export the pipeline entry points
pub use config::ExportConfig;
pub use error::{ExportError, ExportResult, HookStage};
pub use export::{run, ExportContext, ExportReport};
pub use settings::{ExportFlags, ExportHooks, ExportOptions, ExportSettings, OutputFormat, OutputPaths};

// Re-export collaborator seams
pub use extensions::{ExportExtension, MeshCompressor};
pub use host::{FrameGuard, HeadlessHost, Host};
pub use model::{GatheredDocument, SceneGatherer};
pub use scene_file::SceneFileGatherer;

pub use canonical::canonicalize;
pub use repack::{repack, RepackError, RepackOptions};
