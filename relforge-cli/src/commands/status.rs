//! `relforge status` — package lifecycle and release visibility.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use relforge_core::{config, state, PkgId, PkgStatus, StateError};
use relforge_release::list_updates_at;
use relforge_release::version::{list_versions, HISTORY_DIR};

/// Arguments for `relforge status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show only this package.
    pub pkg: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;

        let mut ids = config::list_pkg_ids_at(&home)
            .context("failed to list packages — run `relforge init` first")?;
        if let Some(filter) = self.pkg.as_ref() {
            ids.retain(|id| id.0 == *filter);
            if ids.is_empty() {
                anyhow::bail!("no package named '{filter}' — run `relforge create {filter}`?");
            }
        }

        let report = build_report(&home, &ids)?;
        if self.json {
            print_json(report)?;
            return Ok(());
        }

        print_table(report);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct PkgRow {
    pkg: String,
    status: PkgStatus,
    active: Vec<String>,
    last_update_age: String,
    last_update_at: Option<String>,
    points: usize,
}

#[derive(Debug, Clone)]
struct StatusReport {
    open_count: usize,
    closed_count: usize,
    rows: Vec<PkgRow>,
}

#[derive(Serialize)]
struct StatusReportJson {
    summary: StatusSummaryJson,
    packages: Vec<PkgRowJson>,
}

#[derive(Serialize)]
struct StatusSummaryJson {
    packages: usize,
    open: usize,
    closed: usize,
}

#[derive(Serialize)]
struct PkgRowJson {
    pkg: String,
    status: String,
    active: Vec<String>,
    last_update_age: String,
    last_update_at: Option<String>,
    points: usize,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "package")]
    pkg: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "active releases")]
    active: String,
    #[tabled(rename = "last update")]
    last_update: String,
    #[tabled(rename = "points")]
    points: usize,
}

fn build_report(home: &Path, ids: &[PkgId]) -> Result<StatusReport> {
    let mut rows = Vec::new();
    for id in ids {
        let cfg = config::load_pkg_at(home, id)
            .with_context(|| format!("failed to load config for '{id}'"))?;
        // Config status is the scaffold default; state.json wins once it exists.
        let (status, points) = match state::load_state_at(home, id) {
            Ok(st) => (st.status, st.points.len()),
            Err(StateError::StateNotFound { .. }) => (cfg.pkg.status, 0),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to load state for '{id}'"));
            }
        };
        let last_pass = last_pass_at(home, id)
            .with_context(|| format!("failed to list audit records for '{id}'"))?;
        let (last_update_at, last_update_age) = match last_pass {
            Some(at) => (Some(at.to_rfc3339()), format_age(at, Utc::now())),
            None => (None, "never".to_string()),
        };
        let active = list_active(&cfg.pkg.root)
            .with_context(|| format!("failed to scan release area for '{id}'"))?;

        rows.push(PkgRow {
            pkg: id.0.clone(),
            status,
            active,
            last_update_age,
            last_update_at,
            points,
        });
    }

    let open_count = rows
        .iter()
        .filter(|r| matches!(r.status, PkgStatus::Open))
        .count();
    let closed_count = rows.len() - open_count;

    Ok(StatusReport {
        open_count,
        closed_count,
        rows,
    })
}

/// When the newest audit record ran, decoded from its stamped file name.
///
/// The state file's `updated_at` also moves on open, close and point, so
/// the audit trail is the honest signal for "last update pass".
fn last_pass_at(home: &Path, pkg: &PkgId) -> Result<Option<DateTime<Utc>>> {
    let paths = list_updates_at(home, pkg)?;
    let Some(path) = paths.last() else {
        return Ok(None);
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = name
        .strip_prefix("update-")
        .and_then(|rest| rest.strip_suffix(".json"))
        .unwrap_or_default();
    Ok(NaiveDateTime::parse_from_str(stamp, "%Y%m%dT%H%M%SZ")
        .ok()
        .map(|naive| naive.and_utc()))
}

/// Newest active version per root under `release_area`, as
/// `"<root> <release dir>"` lines sorted by root name.
fn list_active(release_area: &Path) -> Result<Vec<String>> {
    if !release_area.is_dir() {
        return Ok(Vec::new());
    }
    let mut active = Vec::new();
    let entries = std::fs::read_dir(release_area)
        .with_context(|| format!("failed to read {}", release_area.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == HISTORY_DIR {
            continue;
        }
        if let Some((version, _)) = list_versions(&path, false).last() {
            active.push(format!("{name} {}", version.dir_name()));
        }
    }
    active.sort();
    Ok(active)
}

fn format_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    if secs < 60 {
        return "just now".to_string();
    }
    let mins = secs / 60;
    if mins < 60 {
        return format!("{mins}m ago");
    }
    let hours = mins / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", hours / 24)
}

fn print_json(report: StatusReport) -> Result<()> {
    let payload = StatusReportJson {
        summary: StatusSummaryJson {
            packages: report.rows.len(),
            open: report.open_count,
            closed: report.closed_count,
        },
        packages: report
            .rows
            .into_iter()
            .map(|row| PkgRowJson {
                pkg: row.pkg,
                status: row.status.to_string(),
                active: row.active,
                last_update_age: row.last_update_age,
                last_update_at: row.last_update_at,
                points: row.points,
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(report: StatusReport) {
    println!(
        "Relforge v{} | {} packages | {} open | {} closed",
        env!("CARGO_PKG_VERSION"),
        report.rows.len(),
        report.open_count,
        report.closed_count,
    );

    if report.rows.is_empty() {
        println!("No packages configured. Run `relforge create <pkg>` to add one.");
        return;
    }

    let separator = "■".repeat(64).bright_black().to_string();
    let never_updated: Vec<String> = report
        .rows
        .iter()
        .filter(|r| matches!(r.status, PkgStatus::Open) && r.last_update_at.is_none())
        .map(|r| r.pkg.clone())
        .collect();

    let table_rows: Vec<StatusTableRow> = report
        .rows
        .into_iter()
        .map(|row| StatusTableRow {
            pkg: row.pkg,
            status: row.status.to_string(),
            active: if row.active.is_empty() {
                "-".to_string()
            } else {
                row.active.join(", ")
            },
            last_update: row.last_update_age,
            points: row.points,
        })
        .collect();

    println!("{separator}");
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("{separator}");

    if !never_updated.is_empty() {
        println!(
            "Run 'relforge update {}' to cut a first release.",
            never_updated.join("|")
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn age_buckets() {
        let now = Utc::now();
        assert_eq!(format_age(now, now), "just now");
        assert_eq!(format_age(now - Duration::minutes(3), now), "3m ago");
        assert_eq!(format_age(now - Duration::hours(2), now), "2h ago");
        assert_eq!(format_age(now - Duration::days(5), now), "5d ago");
    }

    #[test]
    fn future_timestamps_clamp_to_just_now() {
        let now = Utc::now();
        assert_eq!(format_age(now + Duration::hours(1), now), "just now");
    }

    #[test]
    fn active_listing_skips_history_and_picks_newest() {
        let tmp = TempDir::new().expect("tempdir");
        let area = tmp.path();
        fs::create_dir_all(area.join("bin/release.v0.0.1")).expect("mkdir");
        fs::create_dir_all(area.join("bin/release.v0.0.2")).expect("mkdir");
        fs::create_dir_all(area.join("conf/release.v0.1.0")).expect("mkdir");
        fs::create_dir_all(area.join("HISTORY/release.v9.9.9")).expect("mkdir");

        let active = list_active(area).expect("list");
        assert_eq!(active, vec!["bin release.v0.0.2", "conf release.v0.1.0"]);
    }

    #[test]
    fn missing_release_area_is_empty() {
        let tmp = TempDir::new().expect("tempdir");
        let active = list_active(&tmp.path().join("nowhere")).expect("list");
        assert!(active.is_empty());
    }

    #[test]
    fn last_pass_comes_from_newest_audit_stamp() {
        let tmp = TempDir::new().expect("tempdir");
        let dir = tmp.path().join(".relforge/state/demo/updates");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("update-20260101T000000Z.json"), "{}").expect("write");
        fs::write(dir.join("update-20260315T120000Z.json"), "{}").expect("write");

        let at = last_pass_at(tmp.path(), &PkgId::from("demo"))
            .expect("scan")
            .expect("stamp");
        assert_eq!(at.to_rfc3339(), "2026-03-15T12:00:00+00:00");
    }

    #[test]
    fn no_audit_records_means_never() {
        let tmp = TempDir::new().expect("tempdir");
        let at = last_pass_at(tmp.path(), &PkgId::from("ghost")).expect("scan");
        assert!(at.is_none());
    }
}
