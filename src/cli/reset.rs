//! CLI `reset` command — delete all engine state after user confirmation.

use anyhow::{bail, Result};
use std::io::Write;

use rme::config::RmeConfig;

/// Delete all engine state after user confirmation.
pub fn reset(config: &RmeConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    println!("WARNING: This will permanently delete ALL motifs, cooldowns, checkpoints, and decision logs.");
    println!("Database: {}", db_path.display());
    print!("\nType YES to confirm: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    if input.trim() != "YES" {
        bail!("reset cancelled");
    }

    let conn = rme::db::open_database(&db_path)?;
    rme::db::checkpoint::clear(&conn)?;

    println!("Engine state deleted. Database reset complete.");
    Ok(())
}
