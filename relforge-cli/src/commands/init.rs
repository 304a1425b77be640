//! `relforge init` — create the config layout and scaffold `main.yaml`.

use anyhow::{Context, Result};

use relforge_core::config;

pub fn run() -> Result<()> {
    let path = config::init().context("failed to scaffold the config layout")?;
    println!("✓ Config ready: {}", path.display());
    println!("  Review release_root and git keywords, then `relforge create <pkg>`.");
    Ok(())
}
