//! Release versions — `release.v<major>.<minor>.<patch>` directory names,
//! listing, and allocation.
//!
//! Allocation policy: an existing active version is always reused; otherwise
//! the next version bumps the patch component of the greatest version ever
//! seen (active + history). Major/minor bumps are operator actions, never
//! automated. The allocator never deletes or renames anything.

use std::fmt;
use std::path::{Path, PathBuf};

/// Directory name inside a root that holds finalized versions.
pub const HISTORY_DIR: &str = "HISTORY";

/// Directory under `HISTORY/` mirroring the current baseline content.
pub const BASELINE_DIR: &str = "BASELINE";

const DIR_PREFIX: &str = "release.v";

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// An ordered (major, minor, patch) triple, compared lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// First version ever allocated for a root.
    pub const INITIAL: Version = Version { major: 0, minor: 0, patch: 1 };

    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Parse a directory name of the form `release.v<M>.<m>.<p>`.
    ///
    /// Components must be plain decimal digits; anything else is rejected.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(DIR_PREFIX)?;
        let mut parts = rest.split('.');
        let major = parse_component(parts.next()?)?;
        let minor = parse_component(parts.next()?)?;
        let patch = parse_component(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { major, minor, patch })
    }

    /// Render the directory name, e.g. `release.v1.0.3`.
    pub fn dir_name(&self) -> String {
        format!("{}{}.{}.{}", DIR_PREFIX, self.major, self.minor, self.patch)
    }

    /// Same major/minor, patch incremented by one.
    pub fn next_patch(self) -> Self {
        Self { patch: self.patch + 1, ..self }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

fn parse_component(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Versions directly under `root_dir` (and under `HISTORY/` when requested),
/// sorted ascending. Missing directories yield an empty list.
pub fn list_versions(root_dir: &Path, include_history: bool) -> Vec<(Version, PathBuf)> {
    let mut scan_dirs = vec![root_dir.to_path_buf()];
    if include_history {
        scan_dirs.push(root_dir.join(HISTORY_DIR));
    }
    let mut versions = Vec::new();
    for scan_dir in scan_dirs {
        let entries = match std::fs::read_dir(&scan_dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(version) = Version::from_dir_name(&name) {
                versions.push((version, scan_dir.join(name)));
            }
        }
    }
    versions.sort();
    versions
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// Target version for the next reconciliation pass of a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub version: Version,
    /// Directory the pass writes into (may not exist yet when creating).
    pub release_dir: PathBuf,
    /// True when an open version directory is being mutated in place.
    pub reuse_active: bool,
    /// Version being superseded, rendered as a dir name, or `"none"`.
    pub base_label: String,
}

/// Decide which version the next pass targets for `root_dir`.
///
/// Any active (non-finalized) version is reused — at most one exists by
/// convention, but the greatest is picked if more do. Otherwise the patch
/// component of the greatest version across active + history is bumped,
/// starting from [`Version::INITIAL`] for a brand-new root.
pub fn allocate(root_dir: &Path) -> Allocation {
    let active = list_versions(root_dir, false);
    if let Some((version, path)) = active.last() {
        let history = list_versions(&root_dir.join(HISTORY_DIR), false);
        let base_label = history
            .last()
            .map(|(v, _)| v.dir_name())
            .unwrap_or_else(|| "none".to_owned());
        return Allocation {
            version: *version,
            release_dir: path.clone(),
            reuse_active: true,
            base_label,
        };
    }

    let all = list_versions(root_dir, true);
    match all.last() {
        Some((latest, _)) => {
            let version = latest.next_patch();
            Allocation {
                release_dir: root_dir.join(version.dir_name()),
                version,
                reuse_active: false,
                base_label: latest.dir_name(),
            }
        }
        None => Allocation {
            version: Version::INITIAL,
            release_dir: root_dir.join(Version::INITIAL.dir_name()),
            reuse_active: false,
            base_label: "none".to_owned(),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
