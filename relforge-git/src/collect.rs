//! Keyword-driven commit collection.
//!
//! Walks every ref of the repository enclosing a package's working tree and
//! keeps the commits whose message mentions one of the configured keywords
//! (case-insensitive substring match). Collection is advisory context for
//! the audit record: a missing repository or an empty keyword list yields an
//! empty result, never an error.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use git2::{Commit, Oid, Repository};
use relforge_core::{CommitRecord, MainConfig, PkgConfig};
use tracing::warn;

use crate::error::GitError;

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// What to look for in the repository's history.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Keywords to match against commit messages; blank entries are ignored.
    pub keywords: Vec<String>,
    /// Lower time bound, RFC 3339 or `YYYY-MM-DD` (start of day).
    pub since: Option<String>,
    /// Upper time bound, RFC 3339 or `YYYY-MM-DD` (end of day).
    pub until: Option<String>,
}

impl LogFilter {
    /// Build a filter from the package config, falling back to the main
    /// config's keywords when the package declares none.
    pub fn from_config(main: &MainConfig, pkg: &PkgConfig) -> Self {
        LogFilter {
            keywords: pkg.effective_keywords(main).to_vec(),
            since: pkg.git.since.clone(),
            until: pkg.git.until.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Collect keyword-matching commits from the repository enclosing
/// `repo_hint`, sorted by commit id.
pub fn collect_commits(
    repo_hint: &Path,
    filter: &LogFilter,
) -> Result<Vec<CommitRecord>, GitError> {
    let keywords: Vec<String> = filter
        .keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(str::to_owned)
        .collect();
    if keywords.is_empty() {
        return Ok(Vec::new());
    }

    let since = match &filter.since {
        Some(value) => Some(parse_bound(value, false)?),
        None => None,
    };
    let until = match &filter.until {
        Some(value) => Some(parse_bound(value, true)?),
        None => None,
    };

    let repo = match Repository::discover(repo_hint) {
        Ok(repo) => repo,
        Err(e) => {
            warn!(
                "no git repository at {}; skipping commit collection ({})",
                repo_hint.display(),
                e
            );
            return Ok(Vec::new());
        }
    };

    let lowered: Vec<(String, String)> = keywords
        .iter()
        .map(|k| (k.clone(), k.to_lowercase()))
        .collect();

    let mut walk = repo.revwalk()?;
    walk.push_glob("refs/*")?;
    // Detached or unborn HEAD is not an error; refs cover the normal case.
    let _ = walk.push_head();

    let mut records = Vec::new();
    for oid in walk {
        let commit = repo.find_commit(oid?)?;
        let message = commit.message().unwrap_or("").to_lowercase();
        let mut matched: Vec<String> = lowered
            .iter()
            .filter(|(_, low)| message.contains(low.as_str()))
            .map(|(orig, _)| orig.clone())
            .collect();
        if matched.is_empty() {
            continue;
        }
        matched.sort();

        let seconds = commit.time().seconds();
        if let Some(bound) = since {
            if seconds < bound.timestamp() {
                continue;
            }
        }
        if let Some(bound) = until {
            if seconds > bound.timestamp() {
                continue;
            }
        }

        records.push(to_record(&repo, &commit, matched)?);
    }

    records.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(records)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn to_record(
    repo: &Repository,
    commit: &Commit,
    keywords: Vec<String>,
) -> Result<CommitRecord, GitError> {
    let author = commit.author();
    let name = author.name().unwrap_or("").to_owned();
    let email = author.email().unwrap_or("");
    let label = if email.is_empty() {
        name
    } else {
        format!("{} <{}>", name, email)
    };
    let time = DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    Ok(CommitRecord {
        id: commit.id().to_string(),
        short_id: short_oid(commit.id()),
        summary: commit.summary().unwrap_or("").to_owned(),
        author: label,
        time,
        keywords,
        files: changed_files(repo, commit)?,
    })
}

/// Paths touched by a commit, relative to the repo root, via a diff against
/// the first parent (empty tree for root commits).
fn changed_files(repo: &Repository, commit: &Commit) -> Result<Vec<String>, GitError> {
    let tree = commit.tree()?;
    let parent_tree = if commit.parent_count() > 0 {
        Some(commit.parent(0)?.tree()?)
    } else {
        None
    };
    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

    let mut files = BTreeSet::new();
    for delta in diff.deltas() {
        let path = delta.new_file().path().or_else(|| delta.old_file().path());
        if let Some(path) = path {
            files.insert(path.to_string_lossy().into_owned());
        }
    }
    Ok(files.into_iter().collect())
}

fn parse_bound(value: &str, end_of_day: bool) -> Result<DateTime<Utc>, GitError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let naive = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        if let Some(naive) = naive {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(GitError::TimeBound {
        value: value.to_owned(),
    })
}

fn short_oid(oid: Oid) -> String {
    oid.to_string().chars().take(8).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn temp_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
        (dir, repo)
    }

    fn commit_files(
        repo: &Repository,
        message: &str,
        files: &[(&str, &str)],
        parent: Option<Oid>,
    ) -> Oid {
        let workdir = repo.workdir().unwrap();
        let mut index = repo.index().unwrap();
        for (name, content) in files {
            let path = workdir.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            index.add_path(Path::new(name)).unwrap();
        }
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = repo.signature().unwrap();
        let parents: Vec<Commit> = parent
            .map(|oid| repo.find_commit(oid).unwrap())
            .into_iter()
            .collect();
        let parent_refs: Vec<&Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    fn keywords(words: &[&str]) -> LogFilter {
        LogFilter {
            keywords: words.iter().map(|s| s.to_string()).collect(),
            since: None,
            until: None,
        }
    }

    #[test]
    fn empty_keyword_list_collects_nothing() {
        let (dir, repo) = temp_repo();
        commit_files(&repo, "hotfix applied", &[("a.txt", "x")], None);
        let records = collect_commits(dir.path(), &keywords(&[])).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn blank_keywords_are_ignored() {
        let (dir, repo) = temp_repo();
        commit_files(&repo, "hotfix applied", &[("a.txt", "x")], None);
        let records = collect_commits(dir.path(), &keywords(&["  ", ""])).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn plain_directory_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let records = collect_commits(dir.path(), &keywords(&["hotfix"])).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let (dir, repo) = temp_repo();
        let first = commit_files(&repo, "Apply HOTFIX for login", &[("a.txt", "x")], None);
        commit_files(&repo, "unrelated work", &[("a.txt", "y")], Some(first));

        let records = collect_commits(dir.path(), &keywords(&["hotfix"])).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].summary, "Apply HOTFIX for login");
        assert_eq!(records[0].keywords, vec!["hotfix"]);
        assert_eq!(records[0].author, "Test User <test@example.com>");
        assert_eq!(records[0].short_id.len(), 8);
    }

    #[test]
    fn body_text_matches_too() {
        let (dir, repo) = temp_repo();
        commit_files(
            &repo,
            "tidy module layout\n\nalso folds in the hotfix from last week",
            &[("a.txt", "x")],
            None,
        );
        let records = collect_commits(dir.path(), &keywords(&["hotfix"])).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].summary, "tidy module layout");
    }

    #[test]
    fn matched_keywords_aggregate_sorted() {
        let (dir, repo) = temp_repo();
        commit_files(&repo, "release prep and hotfix", &[("a.txt", "x")], None);
        let records = collect_commits(dir.path(), &keywords(&["release", "hotfix"])).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].keywords, vec!["hotfix", "release"]);
    }

    #[test]
    fn touched_files_are_listed_sorted() {
        let (dir, repo) = temp_repo();
        let first = commit_files(
            &repo,
            "hotfix: initial import",
            &[("sub/b.txt", "b"), ("a.txt", "a")],
            None,
        );
        commit_files(
            &repo,
            "hotfix: adjust one file",
            &[("a.txt", "a2")],
            Some(first),
        );

        let records = collect_commits(dir.path(), &keywords(&["hotfix"])).unwrap();
        assert_eq!(records.len(), 2);
        let by_summary = |s: &str| {
            records
                .iter()
                .find(|r| r.summary == s)
                .unwrap_or_else(|| panic!("missing commit {s:?}"))
                .clone()
        };
        assert_eq!(
            by_summary("hotfix: initial import").files,
            vec!["a.txt", "sub/b.txt"]
        );
        assert_eq!(by_summary("hotfix: adjust one file").files, vec!["a.txt"]);
    }

    #[test]
    fn side_branch_commits_are_found() {
        let (dir, repo) = temp_repo();
        let base = commit_files(&repo, "base work", &[("a.txt", "v1")], None);
        let base_commit = repo.find_commit(base).unwrap();
        repo.branch("side", &base_commit, false).unwrap();
        repo.set_head("refs/heads/side").unwrap();
        repo.checkout_head(Some(git2::build::CheckoutBuilder::new().force()))
            .unwrap();
        commit_files(&repo, "hotfix only on side", &[("side.txt", "s")], Some(base));

        let records = collect_commits(dir.path(), &keywords(&["hotfix"])).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].summary, "hotfix only on side");
    }

    #[test]
    fn date_bounds_exclude_commits() {
        let (dir, repo) = temp_repo();
        commit_files(&repo, "hotfix now", &[("a.txt", "x")], None);

        let mut future = keywords(&["hotfix"]);
        future.since = Some("2999-01-01".to_owned());
        assert!(collect_commits(dir.path(), &future).unwrap().is_empty());

        let mut past = keywords(&["hotfix"]);
        past.until = Some("2000-01-01".to_owned());
        assert!(collect_commits(dir.path(), &past).unwrap().is_empty());

        let mut open = keywords(&["hotfix"]);
        open.since = Some("2000-01-01".to_owned());
        assert_eq!(collect_commits(dir.path(), &open).unwrap().len(), 1);
    }

    #[test]
    fn invalid_bound_is_an_error() {
        let (dir, repo) = temp_repo();
        commit_files(&repo, "hotfix now", &[("a.txt", "x")], None);
        let mut bad = keywords(&["hotfix"]);
        bad.since = Some("not-a-date".to_owned());
        let err = collect_commits(dir.path(), &bad).unwrap_err();
        assert!(matches!(err, GitError::TimeBound { .. }));
    }
}
