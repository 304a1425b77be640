//! # relforge-git
//!
//! Commit collection for release audit records. Scans the git history
//! enclosing a package's working tree for commits whose messages mention
//! configured keywords, and turns them into [`relforge_core::CommitRecord`]s
//! for the audit trail.
//!
//! Collection is best-effort by design: a working tree outside any git
//! repository, or a package with no keywords configured, simply contributes
//! no commits.

pub mod collect;
pub mod error;

pub use collect::{collect_commits, LogFilter};
pub use error::GitError;
