use anyhow::Result;
use serde::Serialize;

use rme::config::RmeConfig;
use rme::engine::{Clock, EngineSnapshot, EngineStats};

/// Export format: the restorable snapshot plus derived stats for readers.
#[derive(Debug, Serialize)]
struct ExportData {
    clock: f64,
    snapshot: EngineSnapshot,
    stats: EngineStats,
}

/// Export the engine checkpoint as JSON to stdout.
pub fn export(config: &RmeConfig) -> Result<()> {
    let (_conn, mut policy, clock) = super::open_engine(config)?;

    let data = ExportData {
        clock: clock.now(),
        snapshot: policy.snapshot(),
        stats: policy.stats(),
    };

    let json = serde_json::to_string_pretty(&data)?;
    println!("{json}");

    eprintln!(
        "Exported {} motifs and {} cooldowns.",
        data.snapshot.elements.len(),
        data.snapshot.cooldowns.len()
    );

    Ok(())
}
