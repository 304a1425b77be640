//! Relforge — versioned release bundle CLI.
//!
//! # Usage
//!
//! ```text
//! relforge init
//! relforge create <pkg> [--dir <path>]
//! relforge close <pkg>
//! relforge update <pkg> [--dry-run]
//! relforge finalize <pkg>
//! relforge status [<pkg>] [--json]
//! relforge diff <pkg>
//! relforge point <pkg> <name> [--note <text>]
//! relforge run <action> [args...]
//! relforge watch <pkg>
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    diff::DiffArgs,
    finalize::FinalizeArgs,
    pkg::{CloseArgs, CreateArgs},
    point::PointArgs,
    run::RunArgs,
    status::StatusArgs,
    update::UpdateArgs,
    watch::WatchArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "relforge",
    version,
    about = "Maintain versioned, content-addressed release bundles",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the config layout and scaffold main.yaml.
    Init,

    /// Scaffold a package config and open its lifecycle state.
    Create(CreateArgs),

    /// Close a package; closed packages refuse update passes.
    Close(CloseArgs),

    /// Run one reconciliation pass: sources to versioned bundles.
    Update(UpdateArgs),

    /// Archive active versions into history and refresh baselines.
    Finalize(FinalizeArgs),

    /// Show package overview: status, active releases, checkpoints.
    Status(StatusArgs),

    /// Show what the next update pass would change, as unified diffs.
    Diff(DiffArgs),

    /// Record a named checkpoint for a package.
    Point(PointArgs),

    /// Run a named shell action from the main config.
    Run(RunArgs),

    /// Watch a package's sources and update continuously.
    Watch(WatchArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init => commands::init::run(),
        Commands::Create(args) => args.run(),
        Commands::Close(args) => args.run(),
        Commands::Update(args) => args.run(),
        Commands::Finalize(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Point(args) => args.run(),
        Commands::Run(args) => args.run(),
        Commands::Watch(args) => args.run(),
    }
}
