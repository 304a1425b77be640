//! relforge core library — shared types, configuration, package state.
//!
//! Public API surface:
//! - [`types`] — newtypes and shared domain structs
//! - [`error`] — [`ConfigError`], [`StateError`]
//! - [`config`] — main + per-package YAML config, scaffolding
//! - [`state`] — package lifecycle state and checkpoints

pub mod config;
pub mod error;
pub mod state;
pub mod types;

pub use config::{ActionConfig, MainConfig, PkgConfig};
pub use error::{ConfigError, StateError};
pub use state::{PkgState, Point};
pub use types::{CommitRecord, PkgId, PkgStatus, RootName};
