//! Error types for aifree-sync.

use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by a [`BlockingEngine`](crate::engine::BlockingEngine).
///
/// The synchronizer never lets these escape; they end up in logs and in
/// [`SyncOutcome::Failed`](crate::synchronizer::SyncOutcome::Failed).
#[derive(Debug, Error)]
pub enum EngineError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (rule file).
    #[error("rule file JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An added rule reuses an id that is already installed.
    #[error("rule id {0} is already in use")]
    DuplicateRuleId(u32),

    /// The engine refused the call for its own reasons.
    #[error("engine rejected the request: {0}")]
    Rejected(String),
}

/// Convenience constructor for [`EngineError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.into(),
        source,
    }
}
