use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use rme::config::RmeConfig;
use rme::db::checkpoint;
use rme::engine::{AdmissionPolicy, EngineSnapshot, ManualClock};

/// Import format, matching export output. Stats are derived and ignored.
#[derive(Debug, Deserialize)]
struct ImportData {
    #[serde(default)]
    clock: f64,
    snapshot: EngineSnapshot,
}

/// Replace the stored checkpoint with the one in `file`.
pub fn import(config: &RmeConfig, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;

    let data: ImportData = serde_json::from_str(&json).context("failed to parse import JSON")?;

    let mut conn = rme::db::open_database(config.resolved_db_path())?;
    let mut policy = AdmissionPolicy::with_clock(config, Arc::new(ManualClock::new(data.clock)));

    println!(
        "Importing {} motifs and {} cooldowns...",
        data.snapshot.elements.len(),
        data.snapshot.cooldowns.len()
    );
    policy.restore(data.snapshot);

    let summary = checkpoint::save_checkpoint(&mut conn, &policy)?;
    println!(
        "Import complete: {} motifs, entropy {:.4}, checkpoint {}.",
        summary.element_count, summary.entropy, summary.id
    );

    Ok(())
}
