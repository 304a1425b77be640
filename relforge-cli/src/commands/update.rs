//! `relforge update <pkg>` — one reconciliation pass, sources to bundles.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use relforge_core::{config, state, PkgId, PkgStatus};
use relforge_git::LogFilter;
use relforge_release::{update_pkg_at, BundleOutcome, RootOutcome, UpdateReport};

/// Arguments for `relforge update`.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Package id.
    pub pkg: String,

    /// Compute and print the plan without touching disk.
    #[arg(long)]
    pub dry_run: bool,
}

impl UpdateArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let pkg = PkgId::from(self.pkg);

        ensure_open(&home, &pkg)?;

        let main = config::load_main_at(&home)
            .context("failed to load main config — run `relforge init` first")?;
        let cfg = config::load_pkg_at(&home, &pkg)
            .with_context(|| format!("failed to load config for '{pkg}'"))?;

        let filter = LogFilter::from_config(&main, &cfg);
        let commits = relforge_git::collect_commits(cfg.git_repo(), &filter)
            .context("commit collection failed")?;
        if !commits.is_empty() {
            println!(
                "Collected {} matching commit(s) for the audit record.",
                commits.len()
            );
        }

        let report = update_pkg_at(&home, &pkg, commits, self.dry_run)
            .with_context(|| format!("update failed for '{pkg}'"))?;

        print_report(&report, self.dry_run);
        Ok(())
    }
}

/// Closed packages refuse update passes; `relforge create` reopens them.
/// Shared with `watch`, which runs the same pass on a timer.
pub(crate) fn ensure_open(home: &Path, pkg: &PkgId) -> Result<()> {
    match state::load_state_at(home, pkg) {
        Ok(state) if state.status == PkgStatus::Closed => Err(anyhow::anyhow!(
            "package '{pkg}' is closed; `relforge create {pkg}` reopens it"
        )),
        _ => Ok(()),
    }
}

fn print_report(report: &UpdateReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };

    if report.outcomes.is_empty() {
        println!("{prefix}Nothing to release — no source files found. Check include.sources.");
        return;
    }

    for outcome in &report.outcomes {
        match outcome {
            RootOutcome::Bundled(bundle) | RootOutcome::Planned(bundle) => {
                print_bundle(prefix, bundle);
            }
            RootOutcome::Unchanged { root } => {
                println!("{}{} '{}' — no changes", prefix, "·".bright_black(), root);
            }
        }
    }

    if let Some(path) = &report.audit_path {
        println!("Audit record: {}", path.display());
    }
}

fn print_bundle(prefix: &str, bundle: &BundleOutcome) {
    println!(
        "{}{} '{}' {} ({} added, {} updated, {} removed, {} skipped)",
        prefix,
        "✓".green(),
        bundle.root,
        bundle.release_name,
        bundle.added.len(),
        bundle.updated.len(),
        bundle.removed.len(),
        bundle.skipped.len(),
    );
    for rel in &bundle.added {
        println!("  {}  {rel}", "+".green());
    }
    for rel in &bundle.updated {
        println!("  {}  {rel}", "~".yellow());
    }
    for rel in &bundle.removed {
        println!("  {}  {rel}", "-".red());
    }
}
