//! `relforge point <pkg> <name>` — record a named checkpoint.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use relforge_core::{state, PkgId};

/// Arguments for `relforge point`.
#[derive(Args, Debug)]
pub struct PointArgs {
    /// Package id.
    pub pkg: String,

    /// Checkpoint name; unique per package.
    pub name: String,

    /// Free-form note stored with the checkpoint.
    #[arg(long)]
    pub note: Option<String>,
}

impl PointArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let pkg = PkgId::from(self.pkg);

        let state = state::add_point_at(&home, &pkg, &self.name, self.note)
            .with_context(|| format!("failed to record point for '{pkg}'"))?;

        println!(
            "{} Point '{}' recorded for '{pkg}' ({} total)",
            "✓".green(),
            self.name,
            state.points.len()
        );
        Ok(())
    }
}
