//! CLI `doctor` command — run database diagnostics and print a health report.

use anyhow::{Context, Result};

use rme::config::RmeConfig;
use rme::db;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &RmeConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `rme replay` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("RME Health Report");
    println!("=================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!();
    println!("Row counts:");
    println!("  Motifs:          {}", report.motif_count);
    println!("  Cooldowns:       {}", report.cooldown_count);
    println!("  Checkpoints:     {}", report.checkpoint_count);
    println!("  Decision log:    {}", report.decision_count);
    println!();

    // A checkpoint that fails to decode is as bad as a corrupt page.
    let restorable = match db::checkpoint::read_snapshot(&conn) {
        Ok(_) => true,
        Err(e) => {
            println!("Checkpoint:        UNREADABLE ({e:#})");
            false
        }
    };
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
    }

    if !report.integrity_ok || !restorable {
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db ~/.rme/engine.db");
        println!("  2. Or export from a good copy and reimport:");
        println!("     rme export > backup.json");
        println!("     rme reset && rme import backup.json");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
