//! Package lifecycle state — `state/<pkg>/state.json`.
//!
//! Holds open/closed status, lifecycle timestamps and named checkpoints
//! ("points"). Written atomically; timestamps are RFC 3339 UTC.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::state_dir_at;
use crate::error::StateError;
use crate::types::{PkgId, PkgStatus};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A named checkpoint recorded by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Persistent lifecycle state for a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkgState {
    pub pkg: PkgId,
    pub status: PkgStatus,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub points: Vec<Point>,
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.relforge/state/<pkg>/state.json` — pure, no I/O.
pub fn state_path_at(home: &Path, pkg: &PkgId) -> PathBuf {
    state_dir_at(home, pkg).join("state.json")
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load a package's state file.
///
/// Returns [`StateError::StateNotFound`] if absent.
pub fn load_state_at(home: &Path, pkg: &PkgId) -> Result<PkgState, StateError> {
    let path = state_path_at(home, pkg);
    if !path.exists() {
        return Err(StateError::StateNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_json::from_str(&contents).map_err(|e| StateError::Parse { path, source: e })
}

/// `load_state_at` convenience wrapper.
pub fn load_state(pkg: &PkgId) -> Result<PkgState, StateError> {
    load_state_at(&home()?, pkg)
}

/// Atomically save a package's state file, creating the state dir if needed.
pub fn save_state_at(home: &Path, state: &PkgState) -> Result<(), StateError> {
    let dir = state_dir_at(home, &state.pkg);
    std::fs::create_dir_all(&dir)?;
    let path = state_path_at(home, &state.pkg);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Lifecycle operations
// ---------------------------------------------------------------------------

/// Open a package: create fresh state, or reopen a closed one in place
/// (status reset, `closed_at` cleared, `opened_at` and points preserved).
pub fn open_at(home: &Path, pkg: &PkgId) -> Result<PkgState, StateError> {
    let now = Utc::now();
    let state = match load_state_at(home, pkg) {
        Ok(mut existing) => {
            existing.status = PkgStatus::Open;
            existing.updated_at = now;
            existing.closed_at = None;
            existing
        }
        Err(StateError::StateNotFound { .. }) => PkgState {
            pkg: pkg.clone(),
            status: PkgStatus::Open,
            opened_at: now,
            updated_at: now,
            closed_at: None,
            points: vec![],
        },
        Err(e) => return Err(e),
    };
    save_state_at(home, &state)?;
    Ok(state)
}

/// `open_at` convenience wrapper.
pub fn open(pkg: &PkgId) -> Result<PkgState, StateError> {
    open_at(&home()?, pkg)
}

/// Bump `updated_at` after a successful update pass.
///
/// Creates the state as open first if none exists yet.
pub fn touch_at(home: &Path, pkg: &PkgId) -> Result<PkgState, StateError> {
    let mut state = match load_state_at(home, pkg) {
        Ok(s) => s,
        Err(StateError::StateNotFound { .. }) => open_at(home, pkg)?,
        Err(e) => return Err(e),
    };
    state.updated_at = Utc::now();
    save_state_at(home, &state)?;
    Ok(state)
}

/// `touch_at` convenience wrapper.
pub fn touch(pkg: &PkgId) -> Result<PkgState, StateError> {
    touch_at(&home()?, pkg)
}

/// Close a package: set status and `closed_at`.
pub fn close_at(home: &Path, pkg: &PkgId) -> Result<PkgState, StateError> {
    let mut state = load_state_at(home, pkg)?;
    let now = Utc::now();
    state.status = PkgStatus::Closed;
    state.updated_at = now;
    state.closed_at = Some(now);
    save_state_at(home, &state)?;
    Ok(state)
}

/// `close_at` convenience wrapper.
pub fn close(pkg: &PkgId) -> Result<PkgState, StateError> {
    close_at(&home()?, pkg)
}

/// Record a named checkpoint. Names are unique per package.
pub fn add_point_at(
    home: &Path,
    pkg: &PkgId,
    name: &str,
    note: Option<String>,
) -> Result<PkgState, StateError> {
    let mut state = load_state_at(home, pkg)?;
    if state.points.iter().any(|p| p.name == name) {
        return Err(StateError::DuplicatePoint { name: name.to_owned() });
    }
    state.points.push(Point {
        name: name.to_owned(),
        created_at: Utc::now(),
        note,
    });
    state.updated_at = Utc::now();
    save_state_at(home, &state)?;
    Ok(state)
}

/// `add_point_at` convenience wrapper.
pub fn add_point(pkg: &PkgId, name: &str, note: Option<String>) -> Result<PkgState, StateError> {
    add_point_at(&home()?, pkg, name, note)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, StateError> {
    dirs::home_dir().ok_or(StateError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
