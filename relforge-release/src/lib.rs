//! # relforge-release
//!
//! Versioned, content-addressed release bundles with three-way
//! reconciliation against a long-lived baseline.
//!
//! Call [`update_pkg_at`] to reconcile a package's source tree into its
//! per-root release bundles, [`finalize_pkg_at`] to freeze the active
//! versions into history, and [`diff::preview_at`] for a read-only look at
//! what the next pass would change.

pub mod audit;
pub mod bundle;
pub mod checksum;
pub mod diff;
pub mod error;
pub mod finalize;
pub mod pipeline;
pub mod reconcile;
pub mod sources;
pub mod version;

pub use audit::{list_updates_at, UpdateRecord};
pub use bundle::{BundleOutcome, RootOutcome};
pub use checksum::{digest_file, digest_tree, DigestMap};
pub use diff::{preview_at, DiffChange, RootDiff};
pub use error::ReleaseError;
pub use finalize::FinalizeOutcome;
pub use pipeline::{finalize_pkg_at, update_pkg_at, UpdateReport};
pub use reconcile::{Disposition, ReleasePlan};
pub use sources::{collect_sources, group_by_root, SourceFile};
pub use version::{Allocation, Version};
