//! SQL DDL for the checkpoint tables.
//!
//! Defines `motifs`, `cooldowns`, `entropy_history`, `engine_state`,
//! `checkpoints`, and `schema_meta`. All DDL uses `IF NOT EXISTS` for
//! idempotent initialization. The decision audit log arrives in migration v2.

use rusqlite::Connection;

/// All schema DDL statements for the engine's core tables.
const SCHEMA_SQL: &str = r#"
-- Admitted motifs (JSON token arrays)
CREATE TABLE IF NOT EXISTS motifs (
    motif TEXT PRIMARY KEY,
    token_count INTEGER NOT NULL CHECK(token_count >= 0),
    admitted_at TEXT NOT NULL
);

-- Cooldown blacklist, expiry in clock time units
CREATE TABLE IF NOT EXISTS cooldowns (
    motif TEXT PRIMARY KEY,
    expires_at REAL NOT NULL
);

-- Rolling entropy window, oldest first
CREATE TABLE IF NOT EXISTS entropy_history (
    position INTEGER PRIMARY KEY,
    value REAL NOT NULL
);

-- Scalar engine state (merge_count, consecutive_blocks, ...)
CREATE TABLE IF NOT EXISTS engine_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- One row per saved checkpoint
CREATE TABLE IF NOT EXISTS checkpoints (
    id TEXT PRIMARY KEY,
    element_count INTEGER NOT NULL,
    entropy REAL NOT NULL,
    merge_count INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_checkpoints_created ON checkpoints(created_at);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
