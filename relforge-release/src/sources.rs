//! Incoming file enumeration and grouping by root.
//!
//! The config's include entries name files or directories, absolute or
//! relative to the package working tree. Every regular file underneath is
//! paired with its destination path relative to the tree (basename for
//! files outside it). The first path segment names the root the file
//! belongs to; single-segment files fall under the implicit `root` group
//! with their full relative path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use relforge_core::config::PkgConfig;
use relforge_core::types::RootName;

use crate::checksum::rel_unix_string;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A source file paired with its destination path relative to the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub source: PathBuf,
    pub rel: String,
}

/// A source file's placement inside its root (root segment stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootFile {
    pub source: PathBuf,
    pub rel: String,
}

// ---------------------------------------------------------------------------
// Enumeration
// ---------------------------------------------------------------------------

/// Enumerate all incoming files for a package.
///
/// Missing include entries are logged and skipped — never fatal. Directory
/// entries are walked recursively in sorted order.
pub fn collect_sources(cfg: &PkgConfig) -> Vec<SourceFile> {
    let pkg_dir = &cfg.pkg.dir;
    let mut files = Vec::new();
    for entry in &cfg.include.sources {
        let target = if entry.is_absolute() {
            entry.clone()
        } else {
            pkg_dir.join(entry)
        };
        if !target.exists() {
            tracing::warn!("skip missing release source: {}", target.display());
            continue;
        }
        if target.is_file() {
            files.push(SourceFile {
                rel: rel_from_pkg(pkg_dir, &target),
                source: target,
            });
            continue;
        }
        let walker = WalkDir::new(&target)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter();
        for walked in walker {
            let walked = match walked {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry under {}: {}", target.display(), e);
                    continue;
                }
            };
            if !walked.file_type().is_file() {
                continue;
            }
            files.push(SourceFile {
                rel: rel_from_pkg(pkg_dir, walked.path()),
                source: walked.path().to_path_buf(),
            });
        }
    }
    files
}

/// Group enumerated files by the first segment of their relative path.
///
/// `bin/tools/a.sh` lands in root `bin` at `tools/a.sh`; a bare `README`
/// lands in the fallback root at `README`.
pub fn group_by_root(files: &[SourceFile]) -> BTreeMap<RootName, Vec<RootFile>> {
    let mut grouped: BTreeMap<RootName, Vec<RootFile>> = BTreeMap::new();
    for file in files {
        let (root, rel) = match file.rel.split_once('/') {
            Some((root, rest)) => (RootName::from(root), rest.to_owned()),
            None => (RootName::fallback(), file.rel.clone()),
        };
        grouped.entry(root).or_default().push(RootFile {
            source: file.source.clone(),
            rel,
        });
    }
    grouped
}

/// Destination path of `path` relative to `pkg_dir`; basename when outside.
fn rel_from_pkg(pkg_dir: &Path, path: &Path) -> String {
    match rel_unix_string(pkg_dir, path) {
        Some(rel) => rel,
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
