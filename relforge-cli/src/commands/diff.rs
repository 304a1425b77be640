//! `relforge diff <pkg>` — unified diffs for what the next update would write.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use relforge_core::PkgId;
use relforge_release::{preview_at, DiffChange};

/// Arguments for `relforge diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Package id to preview.
    pub pkg: String,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let pkg = PkgId::from(self.pkg);

        let diffs =
            preview_at(&home, &pkg).with_context(|| format!("diff failed for '{pkg}'"))?;

        if diffs.is_empty() {
            println!("No pending changes for '{pkg}'.");
            return Ok(());
        }

        for (idx, diff) in diffs.iter().enumerate() {
            if idx > 0 {
                println!();
            }
            println!(
                "{}",
                format!("## {} ({})", diff.root, diff.release_name).bold()
            );
            for change in &diff.changes {
                match change {
                    DiffChange::Added { unified, .. } | DiffChange::Modified { unified, .. } => {
                        print!("{unified}");
                        if !unified.ends_with('\n') {
                            println!();
                        }
                    }
                    DiffChange::Removed { rel } => {
                        println!("{} {rel}", "removed:".red());
                    }
                    DiffChange::Binary { rel } => {
                        println!("{} {rel}", "binary:".yellow());
                    }
                }
            }
        }

        Ok(())
    }
}
