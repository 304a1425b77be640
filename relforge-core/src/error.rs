//! Error types for relforge-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from configuration loading and scaffolding.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Tera rendering failure while scaffolding a config file.
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.relforge/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}; run `relforge init` or `relforge create`")]
    ConfigNotFound { path: PathBuf },
}

/// All errors that can arise from package state operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (write/save path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON parse error on load.
    #[error("failed to parse state at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No state file exists for the package yet.
    #[error("no state recorded for package at {path}")]
    StateNotFound { path: PathBuf },

    /// A checkpoint with this name already exists for the package.
    #[error("point {name:?} already exists")]
    DuplicatePoint { name: String },
}
