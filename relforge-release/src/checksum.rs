//! Content digests — single files and directory trees.
//!
//! Digests are SHA-256 hex strings computed by streaming file contents in
//! fixed-size chunks. Tree scans are the source of truth for baseline and
//! active-release state: there is no serialized digest index anywhere, the
//! on-disk mirror is always re-hashed.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{io_err, ReleaseError};

/// Root-relative forward-slash path → SHA-256 hex digest.
pub type DigestMap = BTreeMap<String, String>;

const READ_BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Single-file digests
// ---------------------------------------------------------------------------

/// SHA-256 of a file's contents, streamed in 64 KiB chunks.
pub fn digest_file(path: &Path) -> Result<String, ReleaseError> {
    let mut file = std::fs::File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| io_err(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// [`digest_file`] with skip-and-continue semantics: an unreadable file is
/// logged and yields `None` instead of failing the pass.
pub fn try_digest_file(path: &Path) -> Option<String> {
    match digest_file(path) {
        Ok(digest) => Some(digest),
        Err(e) => {
            tracing::warn!("failed to hash {}: {}", path.display(), e);
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tree scans
// ---------------------------------------------------------------------------

/// All regular files under `dir` as sorted `(absolute, relative)` pairs.
///
/// Relative paths are forward-slash separated. Files whose *name* appears in
/// `exclude_names` are skipped anywhere in the tree. A missing `dir` yields
/// an empty list; unreadable entries are logged and skipped.
fn tree_files(dir: &Path, exclude_names: &[&str]) -> Vec<(PathBuf, String)> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("skipping unreadable entry under {}: {}", dir.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if exclude_names.iter().any(|ex| *ex == name) {
            continue;
        }
        if let Some(rel) = rel_unix_string(dir, entry.path()) {
            files.push((entry.path().to_path_buf(), rel));
        }
    }
    files
}

/// Digest every regular file under `dir`, keyed by relative path.
///
/// Unreadable files are logged and skipped — never fatal to the scan.
pub fn digest_tree(dir: &Path, exclude_names: &[&str]) -> DigestMap {
    let mut map = DigestMap::new();
    for (abs, rel) in tree_files(dir, exclude_names) {
        if let Some(digest) = try_digest_file(&abs) {
            map.insert(rel, digest);
        }
    }
    map
}

/// Relative paths of every regular file under `dir`, without hashing.
pub fn list_tree(dir: &Path, exclude_names: &[&str]) -> BTreeSet<String> {
    tree_files(dir, exclude_names)
        .into_iter()
        .map(|(_, rel)| rel)
        .collect()
}

/// `path` relative to `base`, joined with forward slashes.
pub(crate) fn rel_unix_string(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
