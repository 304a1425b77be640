//! Package-level passes: update every root, finalize every root.
//!
//! Per invocation the flow is: enumerate incoming files, group them by
//! root, then run each root through plan + apply. Roots are independent;
//! an update pass mutates nothing outside the one package's release area,
//! state entry and audit log.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use relforge_core::{config, state, CommitRecord, PkgId, RootName};
use serde::Serialize;
use tracing::{info, warn};

use crate::audit::{self, UpdateRecord};
use crate::bundle::{self, RootOutcome};
use crate::checksum::{self, DigestMap};
use crate::error::{io_err, ReleaseError};
use crate::finalize::{self, FinalizeOutcome};
use crate::sources::{collect_sources, group_by_root};
use crate::version::{BASELINE_DIR, HISTORY_DIR};

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Result of one update pass over a package.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub pkg: PkgId,
    pub dry_run: bool,
    pub outcomes: Vec<RootOutcome>,
    /// Where the audit record landed; absent on dry runs.
    pub audit_path: Option<PathBuf>,
}

/// Reconcile every root of `pkg` against its current source tree.
///
/// `commits` is whatever the caller collected for the audit record; the
/// pass itself never consults git. With `dry_run` set, plans are computed
/// and reported but nothing is written — no bundle, no audit, no state
/// touch.
pub fn update_pkg_at(
    home: &Path,
    pkg: &PkgId,
    commits: Vec<CommitRecord>,
    dry_run: bool,
) -> Result<UpdateReport, ReleaseError> {
    let cfg = config::load_pkg_at(home, pkg)?;
    let sources = collect_sources(&cfg);
    let grouped = group_by_root(&sources);

    // An unusable release area fails the whole pass up front.
    if !dry_run {
        fs::create_dir_all(&cfg.pkg.root).map_err(|e| io_err(&cfg.pkg.root, e))?;
    }

    let mut outcomes = Vec::new();
    let mut bundles = Vec::new();
    for (root, files) in &grouped {
        let planned = bundle::plan_root(&cfg.pkg.root, root, files);
        if dry_run {
            if planned.is_noop() {
                outcomes.push(RootOutcome::Unchanged { root: root.clone() });
            } else {
                outcomes.push(RootOutcome::Planned(bundle::outcome_of(&planned)));
            }
            continue;
        }
        let outcome = bundle::apply_root(&planned)?;
        if let RootOutcome::Bundled(bundled) = &outcome {
            bundles.push(bundled.clone());
        }
        outcomes.push(outcome);
    }

    let mut audit_path = None;
    if !dry_run {
        let mut source_digests = DigestMap::new();
        for file in &sources {
            if let Some(digest) = checksum::try_digest_file(&file.source) {
                source_digests.insert(file.rel.clone(), digest);
            }
        }
        let record = UpdateRecord {
            pkg: pkg.clone(),
            run_at: Utc::now(),
            commits,
            source_digests,
            bundles,
        };
        audit_path = Some(audit::write_update_at(home, &record)?);
        state::touch_at(home, pkg)?;
    }

    Ok(UpdateReport {
        pkg: pkg.clone(),
        dry_run,
        outcomes,
        audit_path,
    })
}

// ---------------------------------------------------------------------------
// Finalize
// ---------------------------------------------------------------------------

/// Finalize every root directory currently present in the package's
/// release area, in name order.
///
/// Roots that finalized get their baseline re-mirrored from the current
/// source set. When nothing finalized at all, roots with no active version
/// and no baseline yet have one established, so a first `finalize` on a
/// quiet package still leaves a usable baseline behind.
pub fn finalize_pkg_at(home: &Path, pkg: &PkgId) -> Result<Vec<FinalizeOutcome>, ReleaseError> {
    let cfg = config::load_pkg_at(home, pkg)?;
    let sources = collect_sources(&cfg);
    let grouped = group_by_root(&sources);

    let release_area = &cfg.pkg.root;
    if !release_area.is_dir() {
        warn!("release area missing: {}", release_area.display());
        return Ok(Vec::new());
    }

    let mut roots: Vec<(RootName, PathBuf)> = Vec::new();
    for entry in fs::read_dir(release_area).map_err(|e| io_err(release_area, e))? {
        let entry = entry.map_err(|e| io_err(release_area, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == HISTORY_DIR {
            continue;
        }
        roots.push((RootName::from(name), path));
    }
    roots.sort_by(|a, b| a.0.cmp(&b.0));

    let mut outcomes = Vec::new();
    let mut any_finalized = false;
    for (root, root_dir) in &roots {
        let outcome = finalize::finalize_root(root, root_dir)?;
        if matches!(outcome, FinalizeOutcome::Finalized { .. }) {
            let entries = grouped.get(root).map(Vec::as_slice).unwrap_or(&[]);
            finalize::sync_baseline(root_dir, entries)?;
            any_finalized = true;
        }
        outcomes.push(outcome);
    }

    if !any_finalized {
        for (idx, (root, root_dir)) in roots.iter().enumerate() {
            if !matches!(outcomes[idx], FinalizeOutcome::NoActive { .. }) {
                continue;
            }
            if root_dir.join(HISTORY_DIR).join(BASELINE_DIR).is_dir() {
                continue;
            }
            let entries = grouped.get(root).map(Vec::as_slice).unwrap_or(&[]);
            finalize::sync_baseline(root_dir, entries)?;
            info!("baseline established for {}", root_dir.display());
            outcomes[idx] = FinalizeOutcome::BaselineEstablished { root: root.clone() };
        }
    }

    if outcomes.is_empty() {
        info!("nothing to finalize for {}", pkg);
    }
    Ok(outcomes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scaffold(home: &Path) -> PkgId {
        let work = home.join("work");
        fs::create_dir_all(work.join("bin")).unwrap();
        let cfg_dir = home.join(".relforge/config");
        fs::create_dir_all(&cfg_dir).unwrap();
        fs::write(
            cfg_dir.join("demo.yaml"),
            format!(
                "pkg:\n  id: demo\n  root: {}\n  dir: {}\n  status: open\ninclude:\n  sources:\n    - bin\n",
                home.join("area").display(),
                work.display()
            ),
        )
        .unwrap();
        PkgId::from("demo")
    }

    fn write_work(home: &Path, rel: &str, content: &str) {
        let path = home.join("work").join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn update_writes_bundle_audit_and_state() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path();
        let pkg = scaffold(home);
        write_work(home, "bin/tool.sh", "#!/bin/sh\n");

        let report = update_pkg_at(home, &pkg, Vec::new(), false).unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert!(matches!(report.outcomes[0], RootOutcome::Bundled(_)));
        let audit_path = report.audit_path.expect("audit record written");
        assert!(audit_path.is_file());
        assert!(home
            .join("area/bin/release.v0.0.1/tool.sh")
            .is_file());
        let st = state::load_state_at(home, &pkg).unwrap();
        assert_eq!(st.pkg, pkg);
    }

    #[test]
    fn dry_run_reports_plan_without_touching_disk() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path();
        let pkg = scaffold(home);
        write_work(home, "bin/tool.sh", "#!/bin/sh\n");

        let report = update_pkg_at(home, &pkg, Vec::new(), true).unwrap();
        assert!(report.dry_run);
        assert!(report.audit_path.is_none());
        match &report.outcomes[0] {
            RootOutcome::Planned(planned) => {
                assert_eq!(planned.added, vec!["tool.sh"]);
            }
            other => panic!("expected planned, got {:?}", other),
        }
        assert!(!home.join("area").exists());
        assert!(state::load_state_at(home, &pkg).is_err());
    }

    #[test]
    fn finalize_rotates_roots_and_syncs_baseline() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path();
        let pkg = scaffold(home);
        write_work(home, "bin/tool.sh", "#!/bin/sh\n");

        update_pkg_at(home, &pkg, Vec::new(), false).unwrap();
        let outcomes = finalize_pkg_at(home, &pkg).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], FinalizeOutcome::Finalized { .. }));

        let root_dir = home.join("area/bin");
        assert!(root_dir.join("release.v0.0.1.tar").is_file());
        assert!(root_dir.join("HISTORY/release.v0.0.1/tool.sh").is_file());
        assert!(!root_dir.join("release.v0.0.1").exists());
        assert_eq!(
            fs::read_to_string(root_dir.join("HISTORY/BASELINE/tool.sh")).unwrap(),
            "#!/bin/sh\n"
        );
    }

    #[test]
    fn finalize_with_no_roots_is_empty() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path();
        let pkg = scaffold(home);
        let outcomes = finalize_pkg_at(home, &pkg).unwrap();
        assert!(outcomes.is_empty());
    }

    #[test]
    fn quiet_root_without_baseline_gets_one_established() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path();
        let pkg = scaffold(home);
        write_work(home, "bin/tool.sh", "#!/bin/sh\n");

        // A root directory exists but holds no active version.
        fs::create_dir_all(home.join("area/bin")).unwrap();
        let outcomes = finalize_pkg_at(home, &pkg).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            outcomes[0],
            FinalizeOutcome::BaselineEstablished { .. }
        ));
        assert!(home.join("area/bin/HISTORY/BASELINE/tool.sh").is_file());
    }
}
