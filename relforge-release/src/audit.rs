//! Audit records — one JSON document per non-dry update pass.
//!
//! Records live under `state/<pkg>/updates/` and are never rewritten; each
//! pass appends a new `update-<stamp>.json`. They are a log for operators
//! and tooling, not an input: reconciliation never reads them back.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use relforge_core::{config, CommitRecord, PkgId};
use serde::Serialize;
use tracing::info;

use crate::bundle::BundleOutcome;
use crate::checksum::DigestMap;
use crate::error::{io_err, ReleaseError};

/// Everything one update pass produced, in serialization order.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateRecord {
    pub pkg: PkgId,
    pub run_at: DateTime<Utc>,
    /// Commits whose messages matched the configured keywords.
    pub commits: Vec<CommitRecord>,
    /// Digest of every enumerated source file, keyed by its package-relative
    /// path (unhashable files are absent).
    pub source_digests: DigestMap,
    /// Per-root bundle results for roots that actually changed.
    pub bundles: Vec<BundleOutcome>,
}

/// Directory holding a package's audit records.
pub fn updates_dir_at(home: &Path, pkg: &PkgId) -> PathBuf {
    config::state_dir_at(home, pkg).join("updates")
}

/// Persist one record; returns the path it landed at.
pub fn write_update_at(home: &Path, record: &UpdateRecord) -> Result<PathBuf, ReleaseError> {
    let dir = updates_dir_at(home, &record.pkg);
    fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let stamp = record.run_at.format("%Y%m%dT%H%M%SZ");
    let path = dir.join(format!("update-{}.json", stamp));
    let payload = serde_json::to_vec_pretty(record)?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload).map_err(|e| io_err(&tmp, e))?;
    fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    info!("wrote {}", path.display());
    Ok(path)
}

/// All audit record paths for a package, oldest first.
///
/// The stamp format sorts lexicographically, so name order is time order.
pub fn list_updates_at(home: &Path, pkg: &PkgId) -> Result<Vec<PathBuf>, ReleaseError> {
    let dir = updates_dir_at(home, pkg);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
        let entry = entry.map_err(|e| io_err(&dir, e))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("update-") && name.ends_with(".json") {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use relforge_core::RootName;
    use tempfile::TempDir;

    fn record() -> UpdateRecord {
        UpdateRecord {
            pkg: PkgId::from("demo"),
            run_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap(),
            commits: Vec::new(),
            source_digests: DigestMap::new(),
            bundles: vec![BundleOutcome {
                root: RootName::from("bin"),
                release_name: "release.v0.0.1".to_owned(),
                release_dir: PathBuf::from("/tmp/release.v0.0.1"),
                base_label: "none".to_owned(),
                added: vec!["a.txt".to_owned()],
                updated: Vec::new(),
                removed: Vec::new(),
                skipped: Vec::new(),
            }],
        }
    }

    #[test]
    fn record_lands_under_updates_with_stamped_name() {
        let tmp = TempDir::new().unwrap();
        let path = write_update_at(tmp.path(), &record()).unwrap();
        assert_eq!(
            path,
            updates_dir_at(tmp.path(), &PkgId::from("demo")).join("update-20260314T092653Z.json")
        );
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"release.v0.0.1\""));
        assert!(raw.contains("\"a.txt\""));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn listing_is_sorted_and_filters_noise() {
        let tmp = TempDir::new().unwrap();
        let pkg = PkgId::from("demo");
        let dir = updates_dir_at(tmp.path(), &pkg);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("update-20260102T000000Z.json"), "{}").unwrap();
        fs::write(dir.join("update-20260101T000000Z.json"), "{}").unwrap();
        fs::write(dir.join("notes.txt"), "not an audit record").unwrap();

        let paths = list_updates_at(tmp.path(), &pkg).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "update-20260101T000000Z.json",
                "update-20260102T000000Z.json"
            ]
        );
    }

    #[test]
    fn missing_updates_dir_lists_empty() {
        let tmp = TempDir::new().unwrap();
        let paths = list_updates_at(tmp.path(), &PkgId::from("ghost")).unwrap();
        assert!(paths.is_empty());
    }
}
