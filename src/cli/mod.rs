pub mod doctor;
pub mod export;
pub mod import;
pub mod inspect;
pub mod replay;
pub mod reset;
pub mod stats;

use anyhow::Result;
use rusqlite::Connection;
use std::sync::Arc;

use rme::config::RmeConfig;
use rme::db::checkpoint;
use rme::engine::{AdmissionPolicy, ManualClock, Motif};

/// Open the configured database and restore the engine.
///
/// The engine runs on a logical clock resumed from the last checkpoint, so
/// cooldown expiries and idle time stay in the units they were saved in.
pub fn open_engine(config: &RmeConfig) -> Result<(Connection, AdmissionPolicy, ManualClock)> {
    let conn = rme::db::open_database(config.resolved_db_path())?;
    let clock = ManualClock::new(checkpoint::saved_clock(&conn)?.unwrap_or(0.0));
    let policy = checkpoint::load_checkpoint(&conn, config, Arc::new(clock.clone()))?;
    Ok((conn, policy, clock))
}

/// Render motifs as `{a b, c}` for terminal output.
pub fn format_set<'a, I>(motifs: I) -> String
where
    I: IntoIterator<Item = &'a Motif>,
{
    let parts: Vec<String> = motifs.into_iter().map(|m| m.to_string()).collect();
    format!("{{{}}}", parts.join(", "))
}
