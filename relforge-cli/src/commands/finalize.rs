//! `relforge finalize <pkg>` — archive active versions, refresh baselines.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use relforge_core::PkgId;
use relforge_release::{finalize_pkg_at, FinalizeOutcome};

/// Arguments for `relforge finalize`.
#[derive(Args, Debug)]
pub struct FinalizeArgs {
    /// Package id.
    pub pkg: String,
}

impl FinalizeArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let pkg = PkgId::from(self.pkg);

        let outcomes = finalize_pkg_at(&home, &pkg)
            .with_context(|| format!("finalize failed for '{pkg}'"))?;

        if outcomes.is_empty() {
            println!("Nothing to finalize — no roots under the release area yet.");
            println!("Run `relforge update {pkg}` first.");
            return Ok(());
        }

        let mut finalized = 0usize;
        for outcome in &outcomes {
            match outcome {
                FinalizeOutcome::Finalized {
                    root,
                    release_name,
                    tar_path,
                    ..
                } => {
                    finalized += 1;
                    println!(
                        "{} '{}' {} → {}",
                        "✓".green(),
                        root,
                        release_name,
                        tar_path.display()
                    );
                }
                FinalizeOutcome::HistoryCollision {
                    root, release_name, ..
                } => {
                    println!(
                        "{} '{}' {} already in history; left untouched",
                        "!".yellow(),
                        root,
                        release_name
                    );
                }
                FinalizeOutcome::BaselineEstablished { root } => {
                    println!(
                        "{} '{}' baseline established from current sources",
                        "✓".green(),
                        root
                    );
                }
                FinalizeOutcome::NoActive { root } => {
                    println!("{} '{}' has no active version", "·".bright_black(), root);
                }
            }
        }

        if finalized == 0 {
            println!("No active versions were finalized. Run `relforge update {pkg}` to open one.");
        }
        Ok(())
    }
}
