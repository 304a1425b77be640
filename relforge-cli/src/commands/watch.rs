//! `relforge watch <pkg>` — run the watch daemon in the foreground.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use relforge_core::PkgId;

use super::update::ensure_open;

/// Arguments for `relforge watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Package id to watch.
    pub pkg: String,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let pkg = PkgId::from(self.pkg);
        ensure_open(&home, &pkg)?;

        relforge_watch::start_blocking(&home, &pkg)
            .context("watch daemon exited with an error")?;
        Ok(())
    }
}
