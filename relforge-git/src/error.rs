//! Error type for commit collection.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("invalid time bound {value:?} (expected RFC 3339 or YYYY-MM-DD)")]
    TimeBound { value: String },
}
