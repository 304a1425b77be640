//! Shared domain types for relforge.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! All types are serializable/deserializable via serde.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed identifier for a managed package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PkgId(pub String);

impl fmt::Display for PkgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PkgId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PkgId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed name for a release root (a logical artifact group).
///
/// Roots are derived from the first segment of a file's relative destination
/// path; single-segment files fall under [`RootName::fallback`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RootName(pub String);

impl RootName {
    /// Root assigned to files whose relative path has no directory component.
    pub fn fallback() -> Self {
        Self("root".to_owned())
    }
}

impl fmt::Display for RootName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RootName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RootName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle status of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PkgStatus {
    #[default]
    Open,
    Closed,
}

impl fmt::Display for PkgStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PkgStatus::Open => write!(f, "open"),
            PkgStatus::Closed => write!(f, "closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A git commit matched during keyword collection.
///
/// Produced by relforge-git, embedded into update audit records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full object id (40 hex chars).
    pub id: String,
    /// Abbreviated object id for display.
    pub short_id: String,
    /// First line of the commit message.
    pub summary: String,
    pub author: String,
    pub time: DateTime<Utc>,
    /// Keywords from the collection config that matched this commit.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Paths touched by this commit, relative to the repository root.
    #[serde(default)]
    pub files: Vec<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(PkgId::from("webapp").to_string(), "webapp");
        assert_eq!(RootName::from("bin").to_string(), "bin");
    }

    #[test]
    fn newtype_equality() {
        let a = RootName::from("x");
        let b = RootName::from(String::from("x"));
        assert_eq!(a, b);
    }

    #[test]
    fn fallback_root_name() {
        assert_eq!(RootName::fallback().to_string(), "root");
    }

    #[test]
    fn pkg_status_serde_lowercase() {
        assert_eq!(serde_yaml::to_string(&PkgStatus::Open).unwrap().trim(), "open");
        let parsed: PkgStatus = serde_yaml::from_str("closed").unwrap();
        assert_eq!(parsed, PkgStatus::Closed);
    }

    #[test]
    fn commit_record_serde_roundtrip() {
        let rec = CommitRecord {
            id: "a".repeat(40),
            short_id: "aaaaaaa".to_owned(),
            summary: "release: cut 1.2".to_owned(),
            author: "dev".to_owned(),
            time: Utc::now(),
            keywords: vec!["release".to_owned()],
            files: vec!["bin/app".to_owned()],
        };
        let json = serde_json::to_string(&rec).expect("serialize");
        let back: CommitRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(rec, back);
    }
}
