//! Checkpoint persistence: save and restore engine state verbatim.
//!
//! [`save_checkpoint`] writes the admitted motifs, cooldown map, entropy window,
//! and scalar counters inside one transaction. [`load_checkpoint`] rebuilds an
//! [`AdmissionPolicy`] from them. [`log_decision`] appends to the decision audit
//! log that replay and inspection read back.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::RmeConfig;
use crate::engine::cooldown::CooldownEntry;
use crate::engine::{
    AdmissionPolicy, Clock, EngineSnapshot, MergeDecision, MergeReason, Motif, MotifSet,
};

/// Decoding failures for persisted state.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("corrupt motif in {table}: {raw}")]
    CorruptMotif {
        table: &'static str,
        raw: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid engine_state value for {key}: {value}")]
    InvalidState { key: String, value: String },
    #[error("unknown merge reason in decision {id}: {raw}")]
    UnknownReason { id: i64, raw: String },
}

/// Summary row written for every saved checkpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointSummary {
    /// UUID v7 (time-sortable) checkpoint id.
    pub id: String,
    pub element_count: usize,
    pub entropy: f64,
    pub merge_count: u32,
    pub created_at: String,
}

/// One row of the decision audit log.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionLogEntry {
    pub id: i64,
    pub reason: MergeReason,
    pub candidate: Vec<Motif>,
    pub delta_reduction: f64,
    pub effective_threshold: f64,
    pub echo_score: f64,
    pub stagnation: f64,
    pub loop_detected: bool,
    pub created_at: String,
}

// ── Save ────────────────────────────────────────────────────────────────────

/// Persist the full engine state. Replaces the previous checkpoint contents.
pub fn save_checkpoint(conn: &mut Connection, policy: &AdmissionPolicy) -> Result<CheckpointSummary> {
    let snapshot = policy.snapshot();
    let now = chrono::Utc::now().to_rfc3339();
    let tx = conn.transaction()?;

    sync_motifs(&tx, &snapshot.elements, &now)?;

    tx.execute("DELETE FROM cooldowns", [])?;
    for entry in &snapshot.cooldowns {
        tx.execute(
            "INSERT INTO cooldowns (motif, expires_at) VALUES (?1, ?2)",
            params![encode_motif(&entry.motif)?, entry.expires_at],
        )?;
    }

    tx.execute("DELETE FROM entropy_history", [])?;
    for (position, value) in snapshot.entropy_history.iter().enumerate() {
        tx.execute(
            "INSERT INTO entropy_history (position, value) VALUES (?1, ?2)",
            params![position as i64, value],
        )?;
    }

    set_state(&tx, "merge_count", &snapshot.merge_count.to_string())?;
    set_state(&tx, "consecutive_blocks", &snapshot.consecutive_blocks.to_string())?;
    set_state(&tx, "last_merge_time", &snapshot.last_merge_time.to_string())?;
    set_state(&tx, "clock", &policy.now().to_string())?;
    set_state(
        &tx,
        "last_blocked_set",
        &serde_json::to_string(&snapshot.last_blocked_set)?,
    )?;

    let summary = CheckpointSummary {
        id: uuid::Uuid::now_v7().to_string(),
        element_count: snapshot.elements.len(),
        entropy: policy.entropy(),
        merge_count: snapshot.merge_count,
        created_at: now,
    };
    tx.execute(
        "INSERT INTO checkpoints (id, element_count, entropy, merge_count, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            summary.id,
            summary.element_count as i64,
            summary.entropy,
            summary.merge_count,
            summary.created_at,
        ],
    )?;

    tx.commit()?;

    tracing::info!(
        id = %summary.id,
        elements = summary.element_count,
        entropy = summary.entropy,
        "checkpoint saved"
    );
    Ok(summary)
}

/// Insert new motifs (keeping the original `admitted_at` of existing ones) and
/// drop rows that are no longer in the store.
fn sync_motifs(tx: &Transaction, elements: &[Motif], now: &str) -> Result<()> {
    let mut keep = HashSet::with_capacity(elements.len());
    for motif in elements {
        let key = encode_motif(motif)?;
        tx.execute(
            "INSERT OR IGNORE INTO motifs (motif, token_count, admitted_at) VALUES (?1, ?2, ?3)",
            params![key, motif.len() as i64, now],
        )?;
        keep.insert(key);
    }

    let existing: Vec<String> = {
        let mut stmt = tx.prepare("SELECT motif FROM motifs")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };
    for key in existing.iter().filter(|k| !keep.contains(*k)) {
        tx.execute("DELETE FROM motifs WHERE motif = ?1", params![key])?;
    }
    Ok(())
}

fn set_state(tx: &Transaction, key: &str, value: &str) -> Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO engine_state (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

// ── Load ────────────────────────────────────────────────────────────────────

/// Read the persisted state. An empty database yields an empty snapshot.
pub fn read_snapshot(conn: &Connection) -> Result<EngineSnapshot> {
    let elements = {
        let mut stmt = conn.prepare("SELECT motif FROM motifs ORDER BY motif")?;
        let raw = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        raw.iter()
            .map(|r| decode_motif("motifs", r))
            .collect::<Result<Vec<_>, _>>()?
    };

    let cooldowns = {
        let mut stmt = conn.prepare("SELECT motif, expires_at FROM cooldowns ORDER BY motif")?;
        let raw = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(m, expires_at)| -> Result<CooldownEntry, CheckpointError> {
                Ok(CooldownEntry {
                    motif: decode_motif("cooldowns", &m)?,
                    expires_at,
                })
            })
            .collect::<Result<Vec<_>, CheckpointError>>()?
    };

    let entropy_history = {
        let mut stmt = conn.prepare("SELECT value FROM entropy_history ORDER BY position")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, f64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let last_blocked_set = match get_state(conn, "last_blocked_set")? {
        Some(raw) => serde_json::from_str::<Vec<Motif>>(&raw).map_err(|source| {
            CheckpointError::CorruptMotif {
                table: "engine_state",
                raw,
                source,
            }
        })?,
        None => Vec::new(),
    };

    Ok(EngineSnapshot {
        elements,
        entropy_history,
        cooldowns,
        merge_count: parse_state(conn, "merge_count")?.unwrap_or(0),
        consecutive_blocks: parse_state(conn, "consecutive_blocks")?.unwrap_or(0),
        last_blocked_set,
        last_merge_time: parse_state(conn, "last_merge_time")?.unwrap_or(0.0),
    })
}

/// Rebuild an engine from the database. With no prior checkpoint the engine
/// starts empty and its idle timer starts now.
pub fn load_checkpoint(
    conn: &Connection,
    config: &RmeConfig,
    clock: Arc<dyn Clock>,
) -> Result<AdmissionPolicy> {
    let mut policy = AdmissionPolicy::with_clock(config, clock);
    if latest_checkpoint(conn)?.is_some() {
        let snapshot = read_snapshot(conn)?;
        tracing::debug!(elements = snapshot.elements.len(), "restoring checkpoint");
        policy.restore(snapshot);
    }
    Ok(policy)
}

/// Most recent checkpoint summary, if any were saved.
pub fn latest_checkpoint(conn: &Connection) -> Result<Option<CheckpointSummary>> {
    let row = conn
        .query_row(
            "SELECT id, element_count, entropy, merge_count, created_at \
             FROM checkpoints ORDER BY id DESC LIMIT 1",
            [],
            |row| {
                Ok(CheckpointSummary {
                    id: row.get(0)?,
                    element_count: row.get::<_, i64>(1)? as usize,
                    entropy: row.get(2)?,
                    merge_count: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Engine time at the last save, so a restarted engine can resume the same
/// clock (replay runs on logical cycles rather than wall seconds).
pub fn saved_clock(conn: &Connection) -> Result<Option<f64>> {
    parse_state(conn, "clock")
}

fn get_state(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM engine_state WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(value)
}

fn parse_state<T: std::str::FromStr>(conn: &Connection, key: &str) -> Result<Option<T>> {
    match get_state(conn, key)? {
        Some(value) => match value.parse::<T>() {
            Ok(v) => Ok(Some(v)),
            Err(_) => Err(CheckpointError::InvalidState {
                key: key.to_string(),
                value,
            }
            .into()),
        },
        None => Ok(None),
    }
}

// ── Decision log ────────────────────────────────────────────────────────────

/// Append one merge decision to the audit log.
pub fn log_decision(conn: &Connection, candidate: &MotifSet, decision: &MergeDecision) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let verdict = if decision.reason.is_accept() { "accept" } else { "reject" };
    conn.execute(
        "INSERT INTO merge_log (verdict, reason, candidate, delta_reduction, effective_threshold, \
         echo_score, stagnation, loop_detected, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            verdict,
            decision.reason.as_str(),
            serde_json::to_string(candidate)?,
            decision.delta_reduction,
            decision.effective_threshold,
            decision.echo_score,
            decision.stagnation,
            decision.loop_detected,
            now,
        ],
    )?;
    Ok(())
}

/// Most recent `limit` decisions, newest first.
pub fn recent_decisions(conn: &Connection, limit: usize) -> Result<Vec<DecisionLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, reason, candidate, delta_reduction, effective_threshold, \
         echo_score, stagnation, loop_detected, created_at \
         FROM merge_log ORDER BY id DESC LIMIT ?1",
    )?;

    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, f64>(6)?,
                row.get::<_, bool>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(
            |(id, reason, candidate, delta, threshold, echo, stagnation, looped, at)|
             -> Result<DecisionLogEntry> {
                let reason = reason
                    .parse::<MergeReason>()
                    .map_err(|_| CheckpointError::UnknownReason { id, raw: reason.clone() })?;
                let candidate = serde_json::from_str::<Vec<Motif>>(&candidate).map_err(|source| {
                    CheckpointError::CorruptMotif {
                        table: "merge_log",
                        raw: candidate,
                        source,
                    }
                })?;
                Ok(DecisionLogEntry {
                    id,
                    reason,
                    candidate,
                    delta_reduction: delta,
                    effective_threshold: threshold,
                    echo_score: echo,
                    stagnation,
                    loop_detected: looped,
                    created_at: at,
                })
            },
        )
        .collect()
}

/// Delete every checkpoint row, decision, and counter.
pub fn clear(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "DELETE FROM motifs;
         DELETE FROM cooldowns;
         DELETE FROM entropy_history;
         DELETE FROM engine_state;
         DELETE FROM checkpoints;
         DELETE FROM merge_log;",
    )?;
    Ok(())
}

// ── Encoding ────────────────────────────────────────────────────────────────

fn encode_motif(motif: &Motif) -> Result<String> {
    Ok(serde_json::to_string(motif)?)
}

fn decode_motif(table: &'static str, raw: &str) -> Result<Motif, CheckpointError> {
    serde_json::from_str(raw).map_err(|source| CheckpointError::CorruptMotif {
        table,
        raw: raw.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::engine::{EmotionalState, ManualClock};

    fn policy(clock: &ManualClock) -> AdmissionPolicy {
        AdmissionPolicy::with_clock(&RmeConfig::default(), Arc::new(clock.clone()))
    }

    #[test]
    fn empty_database_loads_empty_engine() {
        let conn = open_memory_database().unwrap();
        let clock = ManualClock::new(0.0);
        let p = load_checkpoint(&conn, &RmeConfig::default(), Arc::new(clock)).unwrap();
        assert!(p.elements().is_empty());
        assert_eq!(p.merge_count(), 0);
        assert!(latest_checkpoint(&conn).unwrap().is_none());
        assert!(saved_clock(&conn).unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips_state() {
        let mut conn = open_memory_database().unwrap();
        let clock = ManualClock::new(100.0);
        let mut p = policy(&clock);
        p.merge(
            [Motif::from(["hello", "there"])],
            0.9,
            0.05,
            &MotifSet::new(),
            EmotionalState::calm(),
        );
        p.add_to_cooldown(Motif::from("hello"), false);

        let summary = save_checkpoint(&mut conn, &p).unwrap();
        assert_eq!(summary.element_count, 1);
        assert_eq!(summary.merge_count, 1);

        assert_eq!(saved_clock(&conn).unwrap(), Some(100.0));
        let loaded = load_checkpoint(&conn, &RmeConfig::default(), Arc::new(clock)).unwrap();
        assert_eq!(loaded.snapshot(), p.snapshot());
        assert_eq!(loaded.entropy(), p.entropy());
    }

    #[test]
    fn resaving_keeps_admission_time() {
        let mut conn = open_memory_database().unwrap();
        let clock = ManualClock::new(0.0);
        let mut p = policy(&clock);
        p.merge([Motif::from("a")], 0.9, 0.05, &MotifSet::new(), EmotionalState::calm());
        save_checkpoint(&mut conn, &p).unwrap();

        let first: String = conn
            .query_row("SELECT admitted_at FROM motifs", [], |row| row.get(0))
            .unwrap();
        save_checkpoint(&mut conn, &p).unwrap();
        let second: String = conn
            .query_row("SELECT admitted_at FROM motifs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(first, second);

        let checkpoints: i64 = conn
            .query_row("SELECT COUNT(*) FROM checkpoints", [], |row| row.get(0))
            .unwrap();
        assert_eq!(checkpoints, 2);
    }

    #[test]
    fn corrupt_motif_is_a_typed_error() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO motifs (motif, token_count, admitted_at) VALUES ('not json', 1, 'now')",
            [],
        )
        .unwrap();
        let err = read_snapshot(&conn).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CheckpointError>(),
            Some(CheckpointError::CorruptMotif { table: "motifs", .. })
        ));
    }

    #[test]
    fn invalid_counter_is_a_typed_error() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO engine_state (key, value) VALUES ('merge_count', 'lots')",
            [],
        )
        .unwrap();
        let err = read_snapshot(&conn).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CheckpointError>(),
            Some(CheckpointError::InvalidState { .. })
        ));
    }

    #[test]
    fn decisions_are_logged_newest_first() {
        let conn = open_memory_database().unwrap();
        let clock = ManualClock::new(0.0);
        let mut p = policy(&clock);

        let first: MotifSet = [Motif::from(["I", "am"])].into_iter().collect();
        let d1 = p.merge_detailed(first.clone(), 0.0, 0.05, &MotifSet::new(), EmotionalState::calm());
        log_decision(&conn, &first, &d1).unwrap();

        let second: MotifSet = [Motif::from("x")].into_iter().collect();
        let d2 = p.merge_detailed(second.clone(), 0.9, 5.0, &MotifSet::new(), EmotionalState::calm());
        log_decision(&conn, &second, &d2).unwrap();

        let log = recent_decisions(&conn, 10).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].reason, MergeReason::StrongEcho);
        assert!(log[0].reason.is_accept());
        assert_eq!(log[1].reason, MergeReason::BelowThreshold);
        assert!(!log[1].reason.is_accept());
        assert_eq!(log[1].candidate, vec![Motif::from(["I", "am"])]);
    }

    #[test]
    fn unknown_reason_in_log_is_a_typed_error() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO merge_log (verdict, reason, candidate, delta_reduction, \
             effective_threshold, echo_score, stagnation, loop_detected, created_at) \
             VALUES ('accept', 'gut_feeling', '[[\"a\"]]', 0.0, 0.0, 0.0, 0.0, 0, 'now')",
            [],
        )
        .unwrap();

        let err = recent_decisions(&conn, 5).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CheckpointError>(),
            Some(CheckpointError::UnknownReason { raw, .. }) if raw == "gut_feeling"
        ));
    }

    #[test]
    fn clear_empties_everything() {
        let mut conn = open_memory_database().unwrap();
        let clock = ManualClock::new(0.0);
        let mut p = policy(&clock);
        p.merge([Motif::from("a")], 0.9, 0.05, &MotifSet::new(), EmotionalState::calm());
        save_checkpoint(&mut conn, &p).unwrap();

        clear(&conn).unwrap();
        assert!(latest_checkpoint(&conn).unwrap().is_none());
        assert!(read_snapshot(&conn).unwrap().elements.is_empty());
    }
}
