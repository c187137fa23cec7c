//! Recursive Memory Engine: motif admission control.
//!
//! Leaves first: [`types`] and [`clock`] are plain values, [`store`] owns the
//! admitted motifs and their entropy, [`cooldown`] and [`stagnation`] keep the
//! anti-pathology bookkeeping, and [`admission`] composes them into the
//! per-cycle merge decision.

pub mod admission;
pub mod clock;
pub mod cooldown;
pub mod overlap;
pub mod stagnation;
pub mod store;
pub mod types;

pub use admission::{AdmissionPolicy, EngineSnapshot, EngineStats, MergeDecision, MergeReason};
pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{compute_entropy, MotifStore};
pub use types::{EmotionalState, Motif, MotifSet};
