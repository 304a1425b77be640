//! Three-way reconciliation — baseline vs. active release vs. incoming.
//!
//! [`classify`] is a pure function of digest maps and file-existence sets:
//! no I/O, no ordering dependence among paths. Hashing happens before the
//! call; applying the plan to disk happens after (see [`crate::bundle`]).
//!
//! ## Disposition rules, per incoming path
//!
//! 1. baseline digest equals incoming → `Skipped` (content is already
//!    captured by the baseline; deliberately excluded from the bundle)
//! 2. release digest equals incoming → `Unchanged` (no copy, path stays)
//! 3. release digest exists but differs → `Updated` (copy scheduled)
//! 4. otherwise → `Added` (copy scheduled)
//!
//! ## Removal rules, per release-resident path
//!
//! When reusing an active version: a path absent from the incoming set is
//! removed; a path whose baseline digest and freshly computed incoming
//! digest both exist and are equal is also removed — its content has
//! graduated back to baseline-equivalent and leaves the bundle. Without a
//! baseline, removal is the plain set difference against incoming.
//!
//! An incoming file that could not be hashed takes part in neither
//! scheduling nor removal for the pass.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::checksum::DigestMap;
use crate::sources::RootFile;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What the reconciler decided for one incoming path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Added,
    Updated,
    Skipped,
    Unchanged,
}

/// An incoming path paired with its digest (`None` when unhashable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingEntry {
    pub source: PathBuf,
    pub rel: String,
    pub digest: Option<String>,
}

impl IncomingEntry {
    pub fn hashed(file: &RootFile) -> Self {
        Self {
            source: file.source.clone(),
            rel: file.rel.clone(),
            digest: crate::checksum::try_digest_file(&file.source),
        }
    }
}

/// A copy the bundle writer must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCopy {
    pub source: PathBuf,
    pub rel: String,
}

/// Full classification result for one root's pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleasePlan {
    pub copies: Vec<PlannedCopy>,
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
    pub unchanged: Vec<String>,
    /// Sorted; paths to delete from the active release directory.
    pub removed: Vec<String>,
    /// Digests computed for incoming paths this pass (hashable ones only).
    pub incoming_digests: DigestMap,
}

impl ReleasePlan {
    /// True when the pass would mutate the release directory.
    pub fn has_changes(&self) -> bool {
        !self.copies.is_empty() || !self.removed.is_empty()
    }

    /// `+a ~u -r` summary, or `no changes`.
    pub fn change_label(&self) -> String {
        let mut parts = Vec::new();
        if !self.added.is_empty() {
            parts.push(format!("+{}", self.added.len()));
        }
        if !self.updated.is_empty() {
            parts.push(format!("~{}", self.updated.len()));
        }
        if !self.removed.is_empty() {
            parts.push(format!("-{}", self.removed.len()));
        }
        if parts.is_empty() {
            "no changes".to_owned()
        } else {
            parts.join(" ")
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify every incoming path and compute removals.
///
/// `baseline` must be empty when the root has no baseline; `existing` is the
/// active release's current file listing (manifests excluded) and is empty
/// when no active version is being reused.
pub fn classify(
    incoming: &[IncomingEntry],
    baseline: &DigestMap,
    release: &DigestMap,
    existing: &BTreeSet<String>,
    has_baseline: bool,
    reuse_active: bool,
) -> ReleasePlan {
    let mut plan = ReleasePlan::default();
    let expected: BTreeSet<&str> = incoming.iter().map(|e| e.rel.as_str()).collect();

    for entry in incoming {
        let digest = match &entry.digest {
            Some(d) => d,
            None => continue,
        };
        plan.incoming_digests.insert(entry.rel.clone(), digest.clone());

        match dispose(&entry.rel, digest, baseline, release) {
            Disposition::Skipped => plan.skipped.push(entry.rel.clone()),
            Disposition::Unchanged => plan.unchanged.push(entry.rel.clone()),
            Disposition::Updated => {
                plan.updated.push(entry.rel.clone());
                plan.copies.push(PlannedCopy {
                    source: entry.source.clone(),
                    rel: entry.rel.clone(),
                });
            }
            Disposition::Added => {
                plan.added.push(entry.rel.clone());
                plan.copies.push(PlannedCopy {
                    source: entry.source.clone(),
                    rel: entry.rel.clone(),
                });
            }
        }
    }

    let mut removed = BTreeSet::new();
    if reuse_active {
        for rel in existing {
            if !expected.contains(rel.as_str()) {
                removed.insert(rel.clone());
                continue;
            }
            if let (Some(b), Some(c)) = (baseline.get(rel), plan.incoming_digests.get(rel)) {
                if b == c {
                    removed.insert(rel.clone());
                }
            }
        }
    } else if !has_baseline {
        for rel in existing {
            if !expected.contains(rel.as_str()) {
                removed.insert(rel.clone());
            }
        }
    }
    plan.removed = removed.into_iter().collect();

    plan
}

/// Decide one hashed path against the two digest maps: the baseline rule
/// beats the release comparison.
pub fn dispose(rel: &str, digest: &str, baseline: &DigestMap, release: &DigestMap) -> Disposition {
    if baseline.get(rel).map(String::as_str) == Some(digest) {
        return Disposition::Skipped;
    }
    match release.get(rel).map(String::as_str) {
        Some(existing) if existing == digest => Disposition::Unchanged,
        Some(_) => Disposition::Updated,
        None => Disposition::Added,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rel: &str, digest: &str) -> IncomingEntry {
        IncomingEntry {
            source: PathBuf::from("/src").join(rel),
            rel: rel.to_owned(),
            digest: Some(digest.to_owned()),
        }
    }

    fn unhashable(rel: &str) -> IncomingEntry {
        IncomingEntry {
            source: PathBuf::from("/src").join(rel),
            rel: rel.to_owned(),
            digest: None,
        }
    }

    fn digests(pairs: &[(&str, &str)]) -> DigestMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn existing(rels: &[&str]) -> BTreeSet<String> {
        rels.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn dispose_applies_baseline_rule_first() {
        let baseline = digests(&[("a", "d1")]);
        let release = digests(&[("a", "d0"), ("b", "d2")]);
        assert_eq!(dispose("a", "d1", &baseline, &release), Disposition::Skipped);
        assert_eq!(dispose("b", "d2", &baseline, &release), Disposition::Unchanged);
        assert_eq!(dispose("b", "d9", &baseline, &release), Disposition::Updated);
        assert_eq!(dispose("c", "d3", &baseline, &release), Disposition::Added);
    }

    #[test]
    fn fresh_root_classifies_everything_added() {
        let incoming = vec![entry("a.txt", "d1"), entry("sub/b.txt", "d2")];
        let plan = classify(
            &incoming,
            &DigestMap::new(),
            &DigestMap::new(),
            &BTreeSet::new(),
            false,
            false,
        );
        assert_eq!(plan.added, vec!["a.txt", "sub/b.txt"]);
        assert_eq!(plan.copies.len(), 2);
        assert!(plan.updated.is_empty());
        assert!(plan.removed.is_empty());
        assert!(plan.has_changes());
        assert_eq!(plan.change_label(), "+2");
    }

    #[test]
    fn baseline_equal_content_is_skipped() {
        let incoming = vec![entry("a.txt", "d1"), entry("b.txt", "d2")];
        let baseline = digests(&[("a.txt", "d1")]);
        let plan = classify(
            &incoming,
            &baseline,
            &DigestMap::new(),
            &BTreeSet::new(),
            true,
            false,
        );
        assert_eq!(plan.skipped, vec!["a.txt"]);
        assert_eq!(plan.added, vec!["b.txt"]);
        assert_eq!(plan.change_label(), "+1");
    }

    #[test]
    fn release_equal_content_is_unchanged() {
        let incoming = vec![entry("a.txt", "d1")];
        let release = digests(&[("a.txt", "d1")]);
        let plan = classify(
            &incoming,
            &DigestMap::new(),
            &release,
            &existing(&["a.txt"]),
            false,
            true,
        );
        assert_eq!(plan.unchanged, vec!["a.txt"]);
        assert!(plan.copies.is_empty());
        assert!(!plan.has_changes());
    }

    #[test]
    fn differing_release_digest_is_updated() {
        let incoming = vec![entry("a.txt", "new")];
        let release = digests(&[("a.txt", "old")]);
        let plan = classify(
            &incoming,
            &DigestMap::new(),
            &release,
            &existing(&["a.txt"]),
            false,
            true,
        );
        assert_eq!(plan.updated, vec!["a.txt"]);
        assert_eq!(plan.copies.len(), 1);
        assert_eq!(plan.change_label(), "~1");
    }

    #[test]
    fn baseline_beats_release_comparison() {
        // Content equals baseline AND differs from the release copy: the
        // baseline rule wins and the path is excluded from the bundle.
        let incoming = vec![entry("a.txt", "base")];
        let baseline = digests(&[("a.txt", "base")]);
        let release = digests(&[("a.txt", "other")]);
        let plan = classify(
            &incoming,
            &baseline,
            &release,
            &existing(&["a.txt"]),
            true,
            true,
        );
        assert_eq!(plan.skipped, vec!["a.txt"]);
        // ...and the stale release copy is removed (graduated to baseline).
        assert_eq!(plan.removed, vec!["a.txt"]);
    }

    #[test]
    fn release_path_missing_from_incoming_is_removed() {
        let incoming = vec![entry("keep.txt", "d1")];
        let release = digests(&[("keep.txt", "d1"), ("old.txt", "d9")]);
        let plan = classify(
            &incoming,
            &DigestMap::new(),
            &release,
            &existing(&["keep.txt", "old.txt"]),
            false,
            true,
        );
        assert_eq!(plan.removed, vec!["old.txt"]);
        assert!(plan.has_changes());
        assert_eq!(plan.change_label(), "-1");
    }

    #[test]
    fn unhashable_incoming_is_excluded_from_scheduling_and_removal() {
        let incoming = vec![unhashable("flaky.txt")];
        let baseline = digests(&[("flaky.txt", "base")]);
        let release = digests(&[("flaky.txt", "rel")]);
        let plan = classify(
            &incoming,
            &baseline,
            &release,
            &existing(&["flaky.txt"]),
            true,
            true,
        );
        assert!(plan.copies.is_empty());
        assert!(
            plan.removed.is_empty(),
            "a path we could not hash must never be removed"
        );
        assert!(plan.incoming_digests.is_empty());
    }

    #[test]
    fn no_baseline_removal_is_plain_set_difference() {
        let incoming = vec![entry("a.txt", "d1")];
        let plan = classify(
            &incoming,
            &DigestMap::new(),
            &DigestMap::new(),
            &existing(&["a.txt", "stale.txt"]),
            false,
            false,
        );
        assert_eq!(plan.removed, vec!["stale.txt"]);
    }

    #[test]
    fn decisions_are_order_independent() {
        let fwd = vec![entry("a", "1"), entry("b", "2"), entry("c", "3")];
        let rev: Vec<IncomingEntry> = fwd.iter().rev().cloned().collect();
        let baseline = digests(&[("b", "2")]);
        let release = digests(&[("c", "0")]);
        let ex = existing(&["c"]);
        let p1 = classify(&fwd, &baseline, &release, &ex, true, true);
        let p2 = classify(&rev, &baseline, &release, &ex, true, true);
        let sorted = |v: &[String]| {
            let mut v = v.to_vec();
            v.sort();
            v
        };
        assert_eq!(sorted(&p1.added), sorted(&p2.added));
        assert_eq!(sorted(&p1.skipped), sorted(&p2.skipped));
        assert_eq!(p1.removed, p2.removed);
        assert_eq!(p1.incoming_digests, p2.incoming_digests);
    }

    #[test]
    fn change_label_combines_counts() {
        let incoming = vec![entry("new.txt", "n"), entry("mod.txt", "m2")];
        let release = digests(&[("mod.txt", "m1"), ("gone.txt", "g")]);
        let plan = classify(
            &incoming,
            &DigestMap::new(),
            &release,
            &existing(&["mod.txt", "gone.txt"]),
            false,
            true,
        );
        assert_eq!(plan.change_label(), "+1 ~1 -1");
    }
}
