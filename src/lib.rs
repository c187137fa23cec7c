//! Recursive Memory Engine — entropy-gated admission control for an agent's
//! long-term motif memory.
//!
//! Each cognition cycle, a perception layer proposes a set of *motifs* (short
//! token sequences). The engine decides whether to absorb them permanently by
//! weighing:
//!
//! | Signal | Source | Effect |
//! |--------|--------|--------|
//! | **Entropy reduction** | token distribution of store ∪ candidate | primary gate |
//! | **Echo / resonance** | token overlap with known motifs | admits familiar content |
//! | **Panic / joy** | emotion engine | raises / lowers the threshold |
//! | **Stagnation** | flat entropy window, idle time | relaxes the threshold |
//! | **Loops** | repeated rejection of the same content | forced admission + cooldown |
//!
//! # Architecture
//!
//! - **Engine**: synchronous, single-owner [`engine::AdmissionPolicy`] composing a
//!   motif store, a cooldown registry, and a stagnation tracker
//! - **Storage**: SQLite checkpoints of the store, cooldowns, and counters, plus
//!   an audit log of decisions
//! - **Time**: pluggable [`engine::Clock`]; wall-clock seconds or logical cycles
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite checkpoint schema, migrations, and save/restore
//! - [`engine`]: Motif types, entropy math, cooldowns, stagnation, and the merge decision

pub mod config;
pub mod db;
pub mod engine;
