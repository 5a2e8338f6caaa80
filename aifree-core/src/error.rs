//! Error types for aifree-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from reading or writing persisted state.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (write path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The storage document exists but is not valid JSON.
    #[error("failed to parse storage at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The storage document parsed but its root is not a JSON object.
    #[error("storage at {path} is not a JSON object")]
    NotAnObject { path: PathBuf },

    /// A stored value has the wrong shape for its key.
    #[error("invalid value for key '{key}': {source}")]
    InvalidValue {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience constructor for [`StorageError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.into(),
        source,
    }
}
