//! Time source for cooldown expiry and idle detection.
//!
//! The admission math never reads the clock; only TTLs and the
//! "time since last merge" boost do. [`SystemClock`] measures seconds,
//! [`ManualClock`] measures whatever the caller advances it by (typically one
//! unit per cognition cycle).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A monotonic-enough source of "time units".
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall clock, in seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

/// A logical clock that only moves when told to.
///
/// Clones share the same underlying reading, so a test (or the replay loop) can
/// hand one clone to the engine and keep another to advance time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(start.to_bits())),
        }
    }

    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: f64) {
        self.set(self.now() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}
