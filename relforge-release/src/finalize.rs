//! Finalization — freeze the active version and refresh the baseline.
//!
//! Finalizing a root archives its active version directory into a single
//! `.tar` at the root level, moves the directory into `HISTORY/` under its
//! version name, and re-mirrors the baseline from the current source set.
//! History is append-only: an existing historical directory of the same
//! version makes the whole root a skip, and an archive that already exists
//! is kept rather than rewritten.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use relforge_core::RootName;
use serde::Serialize;
use tracing::{info, warn};

use crate::bundle::{copy_mtime, prune_empty_dirs};
use crate::checksum::list_tree;
use crate::error::{io_err, ReleaseError};
use crate::sources::RootFile;
use crate::version::{list_versions, BASELINE_DIR, HISTORY_DIR};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What happened to one root during a finalize pass.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FinalizeOutcome {
    /// Active version archived and moved into history.
    Finalized {
        root: RootName,
        release_name: String,
        tar_path: PathBuf,
        history_dir: PathBuf,
    },
    /// History already holds this version; nothing was touched.
    HistoryCollision {
        root: RootName,
        release_name: String,
        history_dir: PathBuf,
    },
    /// No version was finalized, but a missing baseline was mirrored from
    /// the current source set.
    BaselineEstablished { root: RootName },
    /// The root has no active version directory.
    NoActive { root: RootName },
}

impl FinalizeOutcome {
    pub fn root(&self) -> &RootName {
        match self {
            FinalizeOutcome::Finalized { root, .. }
            | FinalizeOutcome::HistoryCollision { root, .. }
            | FinalizeOutcome::BaselineEstablished { root }
            | FinalizeOutcome::NoActive { root } => root,
        }
    }
}

// ---------------------------------------------------------------------------
// 1. Archive and rotate
// ---------------------------------------------------------------------------

/// Finalize the greatest active version under `root_dir`, if any.
///
/// The history collision check runs before the archive is written, so a
/// colliding root produces no disk writes at all. The archive lands via a
/// temp file so a crash never leaves a half-written `.tar` under its final
/// name.
pub fn finalize_root(root: &RootName, root_dir: &Path) -> Result<FinalizeOutcome, ReleaseError> {
    let active = list_versions(root_dir, false);
    let (version, active_path) = match active.last() {
        Some((version, path)) => (*version, path.clone()),
        None => {
            info!("no active release dir under {}", root_dir.display());
            return Ok(FinalizeOutcome::NoActive { root: root.clone() });
        }
    };
    let release_name = version.dir_name();

    let history_dir = root_dir.join(HISTORY_DIR);
    let history_target = history_dir.join(&release_name);
    if history_target.exists() {
        warn!(
            "history already contains {}; skipping move",
            history_target.display()
        );
        return Ok(FinalizeOutcome::HistoryCollision {
            root: root.clone(),
            release_name,
            history_dir: history_target,
        });
    }

    let tar_path = root_dir.join(format!("{}.tar", release_name));
    if tar_path.exists() {
        info!("archive {} already present; keeping it", tar_path.display());
    } else {
        write_archive(&tar_path, &release_name, &active_path)?;
    }

    fs::create_dir_all(&history_dir).map_err(|e| io_err(&history_dir, e))?;
    fs::rename(&active_path, &history_target).map_err(|e| io_err(&history_target, e))?;
    info!(
        "finalized {} (tar={})",
        history_target.display(),
        tar_path.display()
    );

    Ok(FinalizeOutcome::Finalized {
        root: root.clone(),
        release_name,
        tar_path,
        history_dir: history_target,
    })
}

/// Write `dir` into a tar at `tar_path`, entries rooted at `entry_name`.
fn write_archive(tar_path: &Path, entry_name: &str, dir: &Path) -> Result<(), ReleaseError> {
    let tmp_path = tar_path.with_extension("tar.tmp");
    let file = fs::File::create(&tmp_path).map_err(|e| io_err(&tmp_path, e))?;
    let mut builder = tar::Builder::new(file);
    builder
        .append_dir_all(entry_name, dir)
        .map_err(|e| io_err(dir, e))?;
    builder.into_inner().map_err(|e| io_err(&tmp_path, e))?;
    fs::rename(&tmp_path, tar_path).map_err(|e| io_err(tar_path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 2. Baseline mirror
// ---------------------------------------------------------------------------

/// Re-mirror the baseline area from the current source entries.
///
/// Every entry is copied (content comparison is the reconciler's job, not
/// the baseline's), anything in the mirror that no entry claims is removed,
/// and directories left empty are pruned. An empty entry set empties the
/// baseline.
pub fn sync_baseline(root_dir: &Path, entries: &[RootFile]) -> Result<(), ReleaseError> {
    let baseline_dir = root_dir.join(HISTORY_DIR).join(BASELINE_DIR);
    fs::create_dir_all(&baseline_dir).map_err(|e| io_err(&baseline_dir, e))?;
    let expected: BTreeSet<&str> = entries.iter().map(|e| e.rel.as_str()).collect();

    for entry in entries {
        let dest = baseline_dir.join(&entry.rel);
        if let Some(parent) = dest.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("failed to create {}: {}", parent.display(), e);
                continue;
            }
        }
        if let Err(e) = fs::copy(&entry.source, &dest) {
            warn!(
                "failed to mirror {} -> {}: {}",
                entry.source.display(),
                dest.display(),
                e
            );
            continue;
        }
        copy_mtime(&entry.source, &dest);
    }

    for rel in list_tree(&baseline_dir, &[]) {
        if expected.contains(rel.as_str()) {
            continue;
        }
        let path = baseline_dir.join(&rel);
        if let Err(e) = fs::remove_file(&path) {
            warn!("failed to remove {}: {}", path.display(), e);
        }
    }
    prune_empty_dirs(&baseline_dir);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
