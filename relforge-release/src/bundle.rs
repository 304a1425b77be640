//! Bundle writer — turns a classification into disk state.
//!
//! A pass over one root happens in two halves: [`plan_root`] derives every
//! digest map from what is physically on disk and classifies the incoming
//! set (read-only), then [`apply_root`] materializes the plan — copies,
//! removals, empty-directory pruning and the two manifest files. Keeping the
//! halves separate lets dry runs and diff previews share the exact planning
//! code that a real pass uses.
//!
//! Digest maps are always re-derived by hashing the mirrors on disk; there
//! is no serialized index. A crash mid-pass therefore self-heals: the next
//! pass re-classifies against whatever actually landed.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use relforge_core::RootName;
use serde::Serialize;
use tracing::{info, warn};

use crate::checksum::{digest_tree, list_tree, DigestMap};
use crate::error::{io_err, ReleaseError};
use crate::reconcile::{self, IncomingEntry, ReleasePlan};
use crate::sources::RootFile;
use crate::version::{self, Allocation, BASELINE_DIR, HISTORY_DIR};

// ---------------------------------------------------------------------------
// Manifest names
// ---------------------------------------------------------------------------

/// Operator-authored free-text note, written once per version and carried
/// forward verbatim across passes.
pub const NOTE_FILE: &str = "PKG_NOTE";

/// Generated listing manifest, rewritten on every mutating pass.
pub const LIST_FILE: &str = "PKG_LIST";

pub(crate) const MANIFEST_NAMES: [&str; 2] = [NOTE_FILE, LIST_FILE];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything [`apply_root`] needs, computed without touching disk state.
#[derive(Debug, Clone)]
pub struct RootPlan {
    pub root: RootName,
    pub allocation: Allocation,
    pub has_baseline: bool,
    pub plan: ReleasePlan,
}

impl RootPlan {
    /// True when applying would leave the root exactly as it is. A brand-new
    /// root (no baseline, no active version) always proceeds, even with an
    /// empty change set, so that its first version directory gets created.
    pub fn is_noop(&self) -> bool {
        (self.has_baseline || self.allocation.reuse_active) && !self.plan.has_changes()
    }
}

/// Structured result of one mutating pass, kept for the audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleOutcome {
    pub root: RootName,
    pub release_name: String,
    pub release_dir: PathBuf,
    pub base_label: String,
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    pub skipped: Vec<String>,
}

/// What happened to one root during an update pass.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RootOutcome {
    /// The plan was applied and manifests were rewritten.
    Bundled(BundleOutcome),
    /// Dry run: the plan that a real pass would have applied.
    Planned(BundleOutcome),
    /// Nothing to do; the root was left untouched.
    Unchanged { root: RootName },
}

impl RootOutcome {
    pub fn root(&self) -> &RootName {
        match self {
            RootOutcome::Bundled(outcome) | RootOutcome::Planned(outcome) => &outcome.root,
            RootOutcome::Unchanged { root } => root,
        }
    }
}

// ---------------------------------------------------------------------------
// 1. Planning
// ---------------------------------------------------------------------------

/// Classify the incoming files of one root against its on-disk state.
///
/// Read-only. `release_area` is the package's release directory; the root's
/// own tree lives directly under it.
pub fn plan_root(release_area: &Path, root: &RootName, files: &[RootFile]) -> RootPlan {
    let root_dir = release_area.join(&root.0);
    let allocation = version::allocate(&root_dir);

    let baseline_dir = root_dir.join(HISTORY_DIR).join(BASELINE_DIR);
    let has_baseline = baseline_dir.is_dir();
    let baseline = if has_baseline {
        digest_tree(&baseline_dir, &[])
    } else {
        DigestMap::new()
    };

    let (release, existing) = if allocation.reuse_active && allocation.release_dir.is_dir() {
        (
            digest_tree(&allocation.release_dir, &MANIFEST_NAMES),
            list_tree(&allocation.release_dir, &MANIFEST_NAMES),
        )
    } else {
        (DigestMap::new(), BTreeSet::new())
    };

    let incoming: Vec<IncomingEntry> = files.iter().map(IncomingEntry::hashed).collect();
    let plan = reconcile::classify(
        &incoming,
        &baseline,
        &release,
        &existing,
        has_baseline,
        allocation.reuse_active,
    );

    RootPlan {
        root: root.clone(),
        allocation,
        has_baseline,
        plan,
    }
}

// ---------------------------------------------------------------------------
// 2. Application
// ---------------------------------------------------------------------------

/// Apply a plan to the root's active release directory.
///
/// A failing file copy or removal is logged and skipped; the next pass
/// retries it because classification is digest-driven. Only failures that
/// make the version directory itself unusable are returned as errors.
pub fn apply_root(planned: &RootPlan) -> Result<RootOutcome, ReleaseError> {
    if planned.is_noop() {
        info!(
            "no changes for {}; leaving {} untouched",
            planned.root,
            planned.allocation.version.dir_name()
        );
        return Ok(RootOutcome::Unchanged {
            root: planned.root.clone(),
        });
    }

    let release_dir = &planned.allocation.release_dir;
    let release_name = planned.allocation.version.dir_name();

    // Read the carried note before mutating anything.
    let note_payload = if planned.allocation.reuse_active {
        fs::read_to_string(release_dir.join(NOTE_FILE)).ok()
    } else {
        None
    };

    fs::create_dir_all(release_dir).map_err(|e| io_err(release_dir, e))?;

    for copy in &planned.plan.copies {
        let dest = release_dir.join(&copy.rel);
        if let Some(parent) = dest.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("failed to create {}: {}", parent.display(), e);
                continue;
            }
        }
        if let Err(e) = fs::copy(&copy.source, &dest) {
            warn!(
                "failed to copy {} -> {}: {}",
                copy.source.display(),
                dest.display(),
                e
            );
            continue;
        }
        copy_mtime(&copy.source, &dest);
    }

    for rel in &planned.plan.removed {
        let path = release_dir.join(rel);
        if !path.is_file() {
            continue;
        }
        if let Err(e) = fs::remove_file(&path) {
            warn!("failed to remove {}: {}", path.display(), e);
        }
    }
    prune_empty_dirs(release_dir);

    let ts = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let note_path = release_dir.join(NOTE_FILE);
    if let Some(payload) = note_payload {
        fs::write(&note_path, payload).map_err(|e| io_err(&note_path, e))?;
    } else if !note_path.exists() {
        let note = default_note(&planned.root, &release_name, &ts);
        fs::write(&note_path, note).map_err(|e| io_err(&note_path, e))?;
    }

    let all_files = list_tree(release_dir, &MANIFEST_NAMES);
    let listing = render_listing(
        &planned.root,
        &release_name,
        &ts,
        &planned.allocation.base_label,
        &planned.plan.change_label(),
        planned.plan.skipped.len(),
        &all_files,
    );
    let list_path = release_dir.join(LIST_FILE);
    fs::write(&list_path, listing).map_err(|e| io_err(&list_path, e))?;

    info!(
        "prepared {} ({} skipped={})",
        release_dir.display(),
        planned.plan.change_label(),
        planned.plan.skipped.len()
    );

    Ok(RootOutcome::Bundled(outcome_of(planned)))
}

/// The outcome a real [`apply_root`] call would report, without disk writes.
pub fn outcome_of(planned: &RootPlan) -> BundleOutcome {
    BundleOutcome {
        root: planned.root.clone(),
        release_name: planned.allocation.version.dir_name(),
        release_dir: planned.allocation.release_dir.clone(),
        base_label: planned.allocation.base_label.clone(),
        added: planned.plan.added.clone(),
        updated: planned.plan.updated.clone(),
        removed: planned.plan.removed.clone(),
        skipped: planned.plan.skipped.clone(),
    }
}

// ---------------------------------------------------------------------------
// 3. Disk helpers
// ---------------------------------------------------------------------------

/// Mirror the source's modification time onto the copy, best effort.
pub(crate) fn copy_mtime(source: &Path, dest: &Path) {
    let mtime = match fs::metadata(source).and_then(|m| m.modified()) {
        Ok(t) => filetime::FileTime::from_system_time(t),
        Err(e) => {
            warn!("failed to read mtime of {}: {}", source.display(), e);
            return;
        }
    };
    if let Err(e) = filetime::set_file_mtime(dest, mtime) {
        warn!("failed to set mtime on {}: {}", dest.display(), e);
    }
}

/// Remove directories left without any entry, bottom-up, keeping `root`.
///
/// Emptiness is re-checked at visit time, so a chain of directories whose
/// only content was pruned children disappears in a single pass.
pub(crate) fn prune_empty_dirs(root: &Path) {
    fn visit(dir: &Path, is_root: bool) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("failed to read {}: {}", dir.display(), e);
                return;
            }
        };
        for entry in entries.flatten() {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                visit(&entry.path(), false);
            }
        }
        if is_root {
            return;
        }
        let now_empty = fs::read_dir(dir)
            .map(|mut it| it.next().is_none())
            .unwrap_or(false);
        if now_empty {
            if let Err(e) = fs::remove_dir(dir) {
                warn!("failed to prune {}: {}", dir.display(), e);
            }
        }
    }
    visit(root, true);
}

// ---------------------------------------------------------------------------
// 4. Manifest rendering
// ---------------------------------------------------------------------------

fn default_note(root: &RootName, release_name: &str, ts: &str) -> String {
    [
        format!("Release root: {}", root),
        format!("Release: {}", release_name),
        format!("Created at: {}", ts),
        String::new(),
        "[ package note ]".to_owned(),
        String::new(),
        "See PKG_LIST for the full file listing.".to_owned(),
        String::new(),
    ]
    .join("\n")
}

fn render_listing(
    root: &RootName,
    release_name: &str,
    ts: &str,
    base_label: &str,
    change_label: &str,
    skipped: usize,
    files: &BTreeSet<String>,
) -> String {
    let mut lines = vec![
        format!("Release root: {}", root),
        format!("Release: {}", release_name),
        format!("Created at: {}", ts),
        format!("Base version: {}", base_label),
        format!("Files changed: {} (skipped unchanged: {})", change_label, skipped),
        String::new(),
        "Included files:".to_owned(),
    ];
    if files.is_empty() {
        lines.push("  (none)".to_owned());
    } else {
        lines.extend(files.iter().map(|f| format!("  - {}", f)));
    }
    lines.push(String::new());
    lines.push("Note: see PKG_NOTE for operator notes.".to_owned());
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
