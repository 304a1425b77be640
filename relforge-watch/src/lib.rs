//! # relforge-watch
//!
//! Watch daemon: keeps one package's release bundles current by running
//! update passes whenever its include sources change on disk, with an
//! interval fallback tick for anything the file watcher misses. Passes
//! are queued and serialized; a failing pass is logged and the daemon
//! keeps running.

mod error;
mod runtime;

pub use error::WatchError;
pub use runtime::{run, start_blocking, PassSummary, DEBOUNCE_WINDOW};
