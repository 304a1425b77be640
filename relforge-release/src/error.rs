//! Error types for relforge-release.

use std::path::PathBuf;

use thiserror::Error;

use relforge_core::error::{ConfigError, StateError};

/// All errors that can arise from release operations.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// An error from the configuration layer.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An error from the package state layer.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (audit records).
    #[error("audit record JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`ReleaseError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ReleaseError {
    ReleaseError::Io {
        path: path.into(),
        source,
    }
}
