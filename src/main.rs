mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rme::config::RmeConfig;

#[derive(Parser)]
#[command(name = "rme", version, about = "Recursive Memory Engine — motif admission control")]
struct Cli {
    /// Config file (defaults to ~/.rme/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Feed text lines through the engine, one cognition cycle per line
    Replay(cli::replay::ReplayArgs),
    /// Show store size, entropy, counters, and stagnation
    Stats,
    /// List admitted motifs, live cooldowns, and recent decisions
    Inspect {
        /// Number of recent decisions to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Export the checkpoint as JSON to stdout
    Export,
    /// Replace the checkpoint with a JSON export
    Import {
        /// Path to a file produced by `rme export`
        file: PathBuf,
    },
    /// Delete all engine state
    Reset,
    /// Run database diagnostics
    Doctor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RmeConfig::load_from(path)?,
        None => RmeConfig::load()?,
    };

    // Log to stderr so stdout stays clean for export/replay output.
    let filter = EnvFilter::try_new(&config.logging.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Replay(args) => cli::replay::replay(&config, &args)?,
        Command::Stats => cli::stats::stats(&config)?,
        Command::Inspect { limit } => cli::inspect::inspect(&config, limit)?,
        Command::Export => cli::export::export(&config)?,
        Command::Import { file } => cli::import::import(&config, &file)?,
        Command::Reset => cli::reset::reset(&config)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
