#![allow(dead_code)]

use rme::config::RmeConfig;
use rme::db;
use rme::engine::{AdmissionPolicy, ManualClock, Motif, MotifSet};
use rusqlite::Connection;
use std::sync::Arc;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::migrations::run_migrations(&conn).unwrap();
    conn
}

/// An empty engine with default config on a manual clock starting at zero.
pub fn test_policy() -> (AdmissionPolicy, ManualClock) {
    test_policy_with(&RmeConfig::default())
}

pub fn test_policy_with(config: &RmeConfig) -> (AdmissionPolicy, ManualClock) {
    let clock = ManualClock::new(0.0);
    let policy = AdmissionPolicy::with_clock(config, Arc::new(clock.clone()));
    (policy, clock)
}

/// Shorthand motif constructor: `m(&["I", "am"])`.
pub fn m(tokens: &[&str]) -> Motif {
    Motif::new(tokens.iter().copied())
}

/// Shorthand set constructor: `set(&[&["I", "am"], &["you"]])`.
pub fn set(motifs: &[&[&str]]) -> MotifSet {
    motifs.iter().map(|t| m(t)).collect()
}
