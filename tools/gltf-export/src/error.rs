//! Export error taxonomy

use std::backtrace::Backtrace;
use std::fmt;
use std::path::PathBuf;

pub type ExportResult<T> = Result<T, ExportError>;

// Alias keeps thiserror from treating the field as a provided backtrace,
// which requires the nightly `error_generic_member_access` feature.
type StackTrace = Backtrace;

/// Fixed points at which user code is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    PreExport,
    PostGather,
    PostBuild,
    PostExport,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookStage::PreExport => "pre-export",
            HookStage::PostGather => "gather_gltf",
            HookStage::PostBuild => "gather_gltf_extensions",
            HookStage::PostExport => "post-export",
        };
        f.write_str(name)
    }
}

/// Fatal export failures. Repack failures are not part of this type; they
/// never abort an export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("{stage} hook failed: {source}")]
    Hook {
        stage: HookStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("Scene gathering failed: {0}")]
    Gather(#[source] anyhow::Error),

    #[error("Mesh compression failed on '{mesh}': {source}")]
    Compression {
        mesh: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Document assembly failed: {message}")]
    Assembly { message: String, trace: StackTrace },

    #[error("Failed to serialize glTF JSON: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// Internal consistency failure; captures the call stack for diagnostics
    pub fn assembly(message: impl Into<String>) -> Self {
        ExportError::Assembly {
            message: message.into(),
            trace: Backtrace::force_capture(),
        }
    }

    pub(crate) fn hook(stage: HookStage) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| ExportError::Hook { stage, source }
    }

    pub(crate) fn write(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| ExportError::Write { path, source }
    }

    /// Log the failure. Assembly failures additionally dump the captured
    /// stack line by line along with the failed check.
    pub fn log_diagnostics(&self) {
        if let ExportError::Assembly { message, trace } = self {
            for line in trace.to_string().lines() {
                tracing::error!("{}", line.trim_end());
            }
            tracing::error!("An error occurred in statement: {}", message);
        }
        tracing::error!("{}", self);
    }
}
