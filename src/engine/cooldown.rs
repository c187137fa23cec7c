//! Time-to-live blacklist for recently admitted or repeatedly rejected motifs.
//!
//! The registry holds no clock; callers pass `now` in the same time units the
//! TTL is configured in. Expired entries are dropped lazily on access.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{Motif, MotifSet};

/// A single persisted cooldown entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooldownEntry {
    pub motif: Motif,
    pub expires_at: f64,
}

#[derive(Debug, Clone)]
pub struct CooldownRegistry {
    ttl: f64,
    cooldowns: BTreeMap<Motif, f64>,
}

impl CooldownRegistry {
    pub fn new(ttl: f64) -> Self {
        Self {
            ttl: ttl.max(0.0),
            cooldowns: BTreeMap::new(),
        }
    }

    /// Blacklist `motif` until `now + ttl` (or `now + 2·ttl` when `extended`).
    ///
    /// Re-adding a motif replaces its expiry.
    pub fn add(&mut self, motif: Motif, now: f64, extended: bool) -> f64 {
        let window = if extended { 2.0 * self.ttl } else { self.ttl };
        let expires_at = now + window;
        self.cooldowns.insert(motif, expires_at);
        expires_at
    }

    /// Whether `motif` is still cooling down at `now`. Drops it if expired.
    pub fn is_in_cooldown(&mut self, motif: &Motif, now: f64) -> bool {
        match self.cooldowns.get(motif) {
            Some(&expires_at) if now <= expires_at => true,
            Some(_) => {
                self.cooldowns.remove(motif);
                false
            }
            None => false,
        }
    }

    /// Purge expired entries and return the live set.
    pub fn active(&mut self, now: f64) -> MotifSet {
        self.purge(now);
        self.cooldowns.keys().cloned().collect()
    }

    /// Remove every entry whose expiry has passed. Returns how many were removed.
    pub fn purge(&mut self, now: f64) -> usize {
        let before = self.cooldowns.len();
        self.cooldowns.retain(|_, expires_at| now <= *expires_at);
        before - self.cooldowns.len()
    }

    /// Number of entries, including ones that may have expired but were not purged yet.
    pub fn len(&self) -> usize {
        self.cooldowns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cooldowns.is_empty()
    }

    /// Snapshot for checkpointing, verbatim (no purge).
    pub fn entries(&self) -> Vec<CooldownEntry> {
        self.cooldowns
            .iter()
            .map(|(motif, &expires_at)| CooldownEntry {
                motif: motif.clone(),
                expires_at,
            })
            .collect()
    }

    pub fn restore<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = CooldownEntry>,
    {
        self.cooldowns = entries
            .into_iter()
            .map(|e| (e.motif, e.expires_at))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_ttl_expires_after_window() {
        let mut reg = CooldownRegistry::new(3.0);
        let m = Motif::from(["a", "b"]);
        reg.add(m.clone(), 10.0, false);

        assert!(reg.is_in_cooldown(&m, 10.0));
        assert!(reg.is_in_cooldown(&m, 13.0));
        assert!(!reg.is_in_cooldown(&m, 13.01));
        // lazily removed
        assert!(reg.is_empty());
    }

    #[test]
    fn extended_ttl_doubles_window() {
        let mut reg = CooldownRegistry::new(3.0);
        let m = Motif::from("loop");
        assert_eq!(reg.add(m.clone(), 0.0, true), 6.0);
        assert!(reg.is_in_cooldown(&m, 5.5));
        assert!(!reg.is_in_cooldown(&m, 6.5));
    }

    #[test]
    fn active_purges_expired() {
        let mut reg = CooldownRegistry::new(3.0);
        reg.add(Motif::from("old"), 0.0, false);
        reg.add(Motif::from("new"), 2.0, false);

        let live = reg.active(4.0);
        assert_eq!(live.len(), 1);
        assert!(live.contains(&Motif::from("new")));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unknown_motif_is_not_cooling() {
        let mut reg = CooldownRegistry::new(3.0);
        assert!(!reg.is_in_cooldown(&Motif::from("never"), 0.0));
    }

    #[test]
    fn restore_round_trips_entries() {
        let mut reg = CooldownRegistry::new(3.0);
        reg.add(Motif::from("x"), 1.0, true);
        let entries = reg.entries();

        let mut copy = CooldownRegistry::new(3.0);
        copy.restore(entries.clone());
        assert_eq!(copy.entries(), entries);
    }
}
