use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the watch daemon runtime.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("config error: {0}")]
    Config(#[from] relforge_core::error::ConfigError),

    #[error("release error: {0}")]
    Release(#[from] relforge_release::ReleaseError),

    #[error("git collection error: {0}")]
    Git(#[from] relforge_git::GitError),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("watch runtime error: {0}")]
    Runtime(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> WatchError {
    WatchError::Io {
        path: path.into(),
        source,
    }
}
