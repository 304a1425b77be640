//! `relforge create <pkg>` and `relforge close <pkg>` — package lifecycle.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use relforge_core::{config, state, PkgId};

/// Scaffold a package config and open its lifecycle state.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Package id; becomes `config/<pkg>.yaml` and the release area name.
    pub pkg: String,

    /// Working tree the include sources are drawn from.
    /// Defaults to the current directory.
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

impl CreateArgs {
    pub fn run(self) -> Result<()> {
        let pkg = PkgId::from(self.pkg);
        let dir = match self.dir {
            Some(dir) => dir,
            None => std::env::current_dir().context("cannot determine current directory")?,
        };
        let dir = dir
            .canonicalize()
            .with_context(|| format!("cannot resolve working tree '{}'", dir.display()))?;

        let path = config::create_pkg(&pkg, &dir).with_context(|| {
            format!("failed to create package '{pkg}' — run `relforge init` first")
        })?;
        state::open(&pkg).with_context(|| format!("failed to open state for '{pkg}'"))?;

        println!("✓ Created package '{pkg}'");
        println!("  Config: {}", path.display());
        println!("  Fill in include.sources, then `relforge update {pkg}`.");
        Ok(())
    }
}

/// Close a package; `create` on the same id reopens it.
#[derive(Args, Debug)]
pub struct CloseArgs {
    /// Package id.
    pub pkg: String,
}

impl CloseArgs {
    pub fn run(self) -> Result<()> {
        let pkg = PkgId::from(self.pkg);
        let closed = state::close(&pkg)
            .with_context(|| format!("failed to close '{pkg}' — was it ever created?"))?;

        match closed.closed_at {
            Some(at) => println!("✓ Closed package '{pkg}' at {}", at.to_rfc3339()),
            None => println!("✓ Closed package '{pkg}'"),
        }
        Ok(())
    }
}
