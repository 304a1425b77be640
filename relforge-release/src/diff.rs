//! Change preview — what the next update pass would do, without doing it.
//!
//! Built on the same planning code as a real pass ([`crate::bundle::plan_root`]),
//! so the preview can never drift from what `update` would apply. Content
//! changes are rendered as unified diffs against the active release copy.

use std::fs;
use std::path::Path;

use relforge_core::{config, PkgConfig, PkgId, RootName};
use similar::TextDiff;
use tracing::warn;

use crate::bundle::{self, RootPlan};
use crate::error::ReleaseError;
use crate::sources::{collect_sources, group_by_root};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One path-level change the next pass would make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffChange {
    /// New to the release; the diff is against empty content.
    Added { rel: String, unified: String },
    /// Content differs from the active release copy.
    Modified { rel: String, unified: String },
    /// Would be deleted from the active release.
    Removed { rel: String },
    /// Content is not valid UTF-8 on one side; no line diff shown.
    Binary { rel: String },
}

impl DiffChange {
    pub fn rel(&self) -> &str {
        match self {
            DiffChange::Added { rel, .. }
            | DiffChange::Modified { rel, .. }
            | DiffChange::Removed { rel }
            | DiffChange::Binary { rel } => rel,
        }
    }
}

/// All pending changes for one root.
#[derive(Debug, Clone)]
pub struct RootDiff {
    pub root: RootName,
    pub release_name: String,
    pub changes: Vec<DiffChange>,
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// Preview every root of a package; roots with nothing to do are omitted.
pub fn preview(cfg: &PkgConfig) -> Vec<RootDiff> {
    let sources = collect_sources(cfg);
    let grouped = group_by_root(&sources);
    let mut diffs = Vec::new();
    for (root, files) in &grouped {
        let planned = bundle::plan_root(&cfg.pkg.root, root, files);
        if planned.is_noop() {
            continue;
        }
        diffs.push(RootDiff {
            root: root.clone(),
            release_name: planned.allocation.version.dir_name(),
            changes: root_changes(&planned),
        });
    }
    diffs
}

/// Load the package config and preview it.
pub fn preview_at(home: &Path, pkg: &PkgId) -> Result<Vec<RootDiff>, ReleaseError> {
    let cfg = config::load_pkg_at(home, pkg)?;
    Ok(preview(&cfg))
}

fn root_changes(planned: &RootPlan) -> Vec<DiffChange> {
    let release_dir = &planned.allocation.release_dir;
    let mut changes = Vec::new();

    for copy in &planned.plan.copies {
        let new_bytes = match fs::read(&copy.source) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("failed to read {}: {}", copy.source.display(), e);
                continue;
            }
        };
        let old_path = release_dir.join(&copy.rel);
        let old_bytes = read_or_empty(&old_path);
        let is_new = planned.plan.added.contains(&copy.rel);

        match (String::from_utf8(old_bytes), String::from_utf8(new_bytes)) {
            (Ok(old), Ok(new)) => {
                let unified = unified(&copy.rel, &old, &new);
                if is_new {
                    changes.push(DiffChange::Added {
                        rel: copy.rel.clone(),
                        unified,
                    });
                } else {
                    changes.push(DiffChange::Modified {
                        rel: copy.rel.clone(),
                        unified,
                    });
                }
            }
            _ => changes.push(DiffChange::Binary {
                rel: copy.rel.clone(),
            }),
        }
    }

    for rel in &planned.plan.removed {
        changes.push(DiffChange::Removed { rel: rel.clone() });
    }
    changes
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_or_empty(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap_or_default()
}

fn unified(rel: &str, old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    diff.unified_diff()
        .context_radius(3)
        .header(&format!("a/{}", rel), &format!("b/{}", rel))
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::RootFile;
    use tempfile::TempDir;

    fn root_file(dir: &Path, rel: &str, content: &[u8]) -> RootFile {
        let source = dir.join(rel);
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, content).unwrap();
        RootFile {
            source,
            rel: rel.to_owned(),
        }
    }

    fn plan(area: &Path, files: &[RootFile]) -> RootPlan {
        bundle::plan_root(area, &RootName::from("bin"), files)
    }

    #[test]
    fn new_file_diffs_against_empty() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let area = tmp.path().join("release");
        let files = vec![root_file(&src, "a.txt", b"line one\n")];

        let changes = root_changes(&plan(&area, &files));
        match &changes[0] {
            DiffChange::Added { rel, unified } => {
                assert_eq!(rel, "a.txt");
                assert!(unified.contains("--- a/a.txt"));
                assert!(unified.contains("+++ b/a.txt"));
                assert!(unified.contains("+line one"));
            }
            other => panic!("expected added, got {:?}", other),
        }
    }

    #[test]
    fn changed_file_shows_both_sides() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let area = tmp.path().join("release");

        let v1 = vec![root_file(&src, "a.txt", b"hello\n")];
        let planned = plan(&area, &v1);
        bundle::apply_root(&planned).unwrap();

        let v2 = vec![root_file(&src, "a.txt", b"world\n")];
        let changes = root_changes(&plan(&area, &v2));
        match &changes[0] {
            DiffChange::Modified { unified, .. } => {
                assert!(unified.contains("-hello"));
                assert!(unified.contains("+world"));
            }
            other => panic!("expected modified, got {:?}", other),
        }
    }

    #[test]
    fn invalid_utf8_is_reported_binary() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let area = tmp.path().join("release");
        let files = vec![root_file(&src, "blob.bin", &[0xff, 0xfe, 0x00, 0x01])];

        let changes = root_changes(&plan(&area, &files));
        assert_eq!(
            changes,
            vec![DiffChange::Binary {
                rel: "blob.bin".to_owned()
            }]
        );
    }

    #[test]
    fn dropped_file_is_listed_removed() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let area = tmp.path().join("release");

        let both = vec![
            root_file(&src, "a.txt", b"keep\n"),
            root_file(&src, "b.txt", b"drop\n"),
        ];
        bundle::apply_root(&plan(&area, &both)).unwrap();

        let keep = vec![both[0].clone()];
        let changes = root_changes(&plan(&area, &keep));
        assert_eq!(
            changes,
            vec![DiffChange::Removed {
                rel: "b.txt".to_owned()
            }]
        );
    }

    #[test]
    fn settled_roots_are_omitted_from_preview() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path();
        let work = home.join("work");
        let release = home.join("release-area");
        root_file(&work, "bin/tool.sh", b"#!/bin/sh\n");

        let cfg_dir = home.join(".relforge/config");
        fs::create_dir_all(&cfg_dir).unwrap();
        fs::write(
            cfg_dir.join("demo.yaml"),
            format!(
                "pkg:\n  id: demo\n  root: {}\n  dir: {}\n  status: open\ninclude:\n  sources:\n    - bin\n",
                release.display(),
                work.display()
            ),
        )
        .unwrap();

        let pkg = PkgId::from("demo");
        let first = preview_at(home, &pkg).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].root, RootName::from("bin"));
        assert_eq!(first[0].release_name, "release.v0.0.1");

        // Materialize the pass; with nothing changed the preview goes quiet.
        let cfg = config::load_pkg_at(home, &pkg).unwrap();
        let sources = collect_sources(&cfg);
        for (root, files) in &group_by_root(&sources) {
            let planned = bundle::plan_root(&cfg.pkg.root, root, files);
            bundle::apply_root(&planned).unwrap();
        }
        assert!(preview_at(home, &pkg).unwrap().is_empty());
    }
}
