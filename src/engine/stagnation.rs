//! Stagnation and loop bookkeeping.
//!
//! [`StagnationTracker`] keeps a short rolling window of entropy readings, the
//! time of the last accepted merge, and the run of consecutive rejections
//! (with the candidate set that was rejected last). The admission policy reads
//! it to relax its threshold when the store stops learning, and to detect a
//! caller stuck proposing the same content.

use std::collections::VecDeque;

use super::overlap::containment_ratio;
use super::types::{Motif, MotifSet};
use crate::config::StagnationConfig;

#[derive(Debug, Clone)]
pub struct StagnationTracker {
    config: StagnationConfig,
    entropy_history: VecDeque<f64>,
    last_merge_time: f64,
    consecutive_blocks: u32,
    last_blocked_set: MotifSet,
}

impl StagnationTracker {
    /// A fresh tracker; `now` counts as the last merge so idle time starts at zero.
    pub fn new(config: StagnationConfig, now: f64) -> Self {
        Self {
            entropy_history: VecDeque::with_capacity(config.window.max(1)),
            config,
            last_merge_time: now,
            consecutive_blocks: 0,
            last_blocked_set: MotifSet::new(),
        }
    }

    /// Append an entropy reading, dropping the oldest past the window size.
    pub fn record(&mut self, entropy: f64) {
        self.entropy_history.push_back(entropy);
        while self.entropy_history.len() > self.config.window.max(1) {
            self.entropy_history.pop_front();
        }
    }

    /// Severity in `[0, 1]`: a flat entropy window means high stagnation, and a
    /// long idle stretch since the last merge boosts it.
    ///
    /// Needs at least two readings; returns `0.0` before that.
    pub fn detect_stagnation(&self, now: f64) -> f64 {
        if self.entropy_history.len() < 2 {
            return 0.0;
        }

        let (min, max) = self
            .entropy_history
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &h| {
                (lo.min(h), hi.max(h))
            });
        let range = max - min;

        let mut severity = 1.0 - (range * self.config.range_scale).min(1.0);
        if now - self.last_merge_time > self.config.idle_after {
            severity += self.config.idle_boost;
        }
        severity.clamp(0.0, 1.0)
    }

    /// How much of `candidate` was also in the last rejected set.
    pub fn loop_similarity(&self, candidate: &MotifSet) -> f64 {
        containment_ratio(candidate, &self.last_blocked_set)
    }

    pub fn record_accept(&mut self, entropy: f64, now: f64) {
        self.record(entropy);
        self.last_merge_time = now;
        self.consecutive_blocks = 0;
        self.last_blocked_set.clear();
    }

    /// Count a rejection. `entropy` is the unchanged store entropy, so the
    /// window sees no progress.
    pub fn record_reject(&mut self, candidate: &MotifSet, entropy: f64) -> u32 {
        self.consecutive_blocks = self.consecutive_blocks.saturating_add(1);
        self.last_blocked_set = candidate.clone();
        self.record(entropy);
        self.consecutive_blocks
    }

    pub fn consecutive_blocks(&self) -> u32 {
        self.consecutive_blocks
    }

    pub fn last_blocked_set(&self) -> &MotifSet {
        &self.last_blocked_set
    }

    pub fn last_merge_time(&self) -> f64 {
        self.last_merge_time
    }

    pub fn history(&self) -> impl Iterator<Item = f64> + '_ {
        self.entropy_history.iter().copied()
    }

    /// Reinstate persisted state. History beyond the window keeps only the newest readings.
    pub fn restore<H, B>(
        &mut self,
        history: H,
        last_merge_time: f64,
        consecutive_blocks: u32,
        last_blocked: B,
    ) where
        H: IntoIterator<Item = f64>,
        B: IntoIterator<Item = Motif>,
    {
        self.entropy_history.clear();
        for h in history {
            self.record(h);
        }
        self.last_merge_time = last_merge_time;
        self.consecutive_blocks = consecutive_blocks;
        self.last_blocked_set = last_blocked.into_iter().collect();
    }
}
