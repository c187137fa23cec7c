//! Admission control: the merge decision.
//!
//! [`AdmissionPolicy`] owns the motif store, the cooldown registry, and the
//! stagnation tracker, and decides once per cognition cycle whether a proposed
//! candidate set is absorbed into long-term memory.
//!
//! The decision is a ladder of increasingly lenient rungs, evaluated in order
//! until one admits the candidate:
//!
//! 1. **Base**: the merge reduces entropy by more than the effective threshold,
//!    or the echo is strong, or the candidate resonates with moderate echo.
//! 2. **Resonant relaxation**: resonant candidates clear a fraction of the
//!    threshold, a weak echo, or carry an urgent token.
//! 3. **Joyful completion**: under high joy, a small entropy increase is allowed
//!    for candidates that resonate or echo.
//! 4. **Escape hatches**: a detected loop, sustained panic under repeated
//!    blocking, severe stagnation, or an urgent token under high panic.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::cooldown::{CooldownEntry, CooldownRegistry};
use super::overlap::{contains_urgent_token, fallback_echo, resonates};
use super::stagnation::StagnationTracker;
use super::store::{compute_entropy, MotifStore};
use super::types::{to_set, EmotionalState, Motif, MotifSet};
use crate::config::{AdmissionConfig, CooldownConfig, RmeConfig};

/// Which rung of the ladder produced the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeReason {
    /// Entropy reduction cleared the effective threshold.
    EntropyGain,
    /// Echo score above the strong-echo cut-off.
    StrongEcho,
    /// Resonates and echo above the resonant cut-off.
    ResonantEcho,
    /// Resonant candidate admitted under the relaxed criteria.
    ResonantRelaxation,
    /// Small entropy increase tolerated under high joy.
    JoyfulCompletion,
    /// Same content kept being rejected; forced through and cooled down.
    LoopBreak,
    /// Panic under repeated blocking, or severe stagnation.
    AntiStagnation,
    /// Urgent token under high panic.
    EmotionalDischarge,
    /// Nothing to merge.
    EmptyCandidate,
    /// No rung admitted the candidate.
    BelowThreshold,
}

impl MergeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntropyGain => "entropy_gain",
            Self::StrongEcho => "strong_echo",
            Self::ResonantEcho => "resonant_echo",
            Self::ResonantRelaxation => "resonant_relaxation",
            Self::JoyfulCompletion => "joyful_completion",
            Self::LoopBreak => "loop_break",
            Self::AntiStagnation => "anti_stagnation",
            Self::EmotionalDischarge => "emotional_discharge",
            Self::EmptyCandidate => "empty_candidate",
            Self::BelowThreshold => "below_threshold",
        }
    }

    pub fn is_accept(&self) -> bool {
        !matches!(self, Self::EmptyCandidate | Self::BelowThreshold)
    }
}

impl std::fmt::Display for MergeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MergeReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entropy_gain" => Ok(Self::EntropyGain),
            "strong_echo" => Ok(Self::StrongEcho),
            "resonant_echo" => Ok(Self::ResonantEcho),
            "resonant_relaxation" => Ok(Self::ResonantRelaxation),
            "joyful_completion" => Ok(Self::JoyfulCompletion),
            "loop_break" => Ok(Self::LoopBreak),
            "anti_stagnation" => Ok(Self::AntiStagnation),
            "emotional_discharge" => Ok(Self::EmotionalDischarge),
            "empty_candidate" => Ok(Self::EmptyCandidate),
            "below_threshold" => Ok(Self::BelowThreshold),
            _ => Err(format!("unknown merge reason: {s}")),
        }
    }
}

/// Verdict of a single merge attempt, with the signals that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct MergeDecision {
    pub accepted: bool,
    pub reason: MergeReason,
    /// Store entropy before the attempt.
    pub entropy_before: f64,
    /// Entropy the store would have after absorbing the candidate.
    pub potential_entropy: f64,
    /// `entropy_before - potential_entropy`; positive means less disorder.
    pub delta_reduction: f64,
    pub effective_threshold: f64,
    /// Echo score after fallback recomputation.
    pub echo_score: f64,
    pub resonates: bool,
    pub urgent: bool,
    pub loop_detected: bool,
    pub stagnation: f64,
    pub maturity: f64,
    /// Consecutive blocks after this attempt.
    pub consecutive_blocks: u32,
    /// Candidate motifs placed into cooldown by this attempt.
    pub cooled_down: usize,
}

impl MergeDecision {
    fn empty(entropy: f64, consecutive_blocks: u32) -> Self {
        Self {
            accepted: false,
            reason: MergeReason::EmptyCandidate,
            entropy_before: entropy,
            potential_entropy: entropy,
            delta_reduction: 0.0,
            effective_threshold: 0.0,
            echo_score: 0.0,
            resonates: false,
            urgent: false,
            loop_detected: false,
            stagnation: 0.0,
            maturity: 0.0,
            consecutive_blocks,
            cooled_down: 0,
        }
    }
}

/// Read-only view of engine health for planners and operators.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub elements: usize,
    pub entropy: f64,
    pub merge_count: u32,
    pub consecutive_blocks: u32,
    pub cooldowns_active: usize,
    pub stagnation: f64,
    pub maturity: f64,
    pub last_merge_time: f64,
    pub entropy_history: Vec<f64>,
}

/// Everything needed to rebuild an engine verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub elements: Vec<Motif>,
    pub entropy_history: Vec<f64>,
    pub cooldowns: Vec<CooldownEntry>,
    pub merge_count: u32,
    pub consecutive_blocks: u32,
    pub last_blocked_set: Vec<Motif>,
    pub last_merge_time: f64,
}

/// Single-owner admission controller. Not shared between threads; wrap it in a
/// `Mutex` if the host runtime is multi-threaded.
pub struct AdmissionPolicy {
    config: AdmissionConfig,
    cooldown_config: CooldownConfig,
    clock: Arc<dyn Clock>,
    store: MotifStore,
    cooldowns: CooldownRegistry,
    stagnation: StagnationTracker,
    merge_count: u32,
}

impl std::fmt::Debug for AdmissionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionPolicy")
            .field("elements", &self.store.len())
            .field("entropy", &self.store.entropy())
            .field("merge_count", &self.merge_count)
            .field("consecutive_blocks", &self.stagnation.consecutive_blocks())
            .finish()
    }
}

impl AdmissionPolicy {
    /// An empty engine on the wall clock (seconds).
    pub fn new(config: &RmeConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// An empty engine reading time from `clock`.
    pub fn with_clock(config: &RmeConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            config: config.admission.clone(),
            cooldown_config: config.cooldown.clone(),
            cooldowns: CooldownRegistry::new(config.cooldown.ttl),
            stagnation: StagnationTracker::new(config.stagnation.clone(), now),
            store: MotifStore::new(),
            merge_count: 0,
            clock,
        }
    }

    // ── Decision ────────────────────────────────────────────────────────────

    /// Decide whether `candidate` is absorbed into long-term memory.
    ///
    /// Any iterable of motifs is accepted and coerced to a set. Mutates the
    /// store, cooldowns, and stagnation state as a side effect.
    pub fn merge<I>(
        &mut self,
        candidate: I,
        echo_score: f64,
        base_threshold: f64,
        known_motifs: &MotifSet,
        emotional_state: EmotionalState,
    ) -> bool
    where
        I: IntoIterator<Item = Motif>,
    {
        self.merge_detailed(candidate, echo_score, base_threshold, known_motifs, emotional_state)
            .accepted
    }

    /// [`merge`](Self::merge) using the store's own elements as the known motifs.
    pub fn merge_against_store<I>(
        &mut self,
        candidate: I,
        echo_score: f64,
        base_threshold: f64,
        emotional_state: EmotionalState,
    ) -> MergeDecision
    where
        I: IntoIterator<Item = Motif>,
    {
        let known = self.store.elements().clone();
        self.merge_detailed(candidate, echo_score, base_threshold, &known, emotional_state)
    }

    /// [`merge`](Self::merge), returning the full decision record.
    pub fn merge_detailed<I>(
        &mut self,
        candidate: I,
        echo_score: f64,
        base_threshold: f64,
        known_motifs: &MotifSet,
        emotional_state: EmotionalState,
    ) -> MergeDecision
    where
        I: IntoIterator<Item = Motif>,
    {
        let candidate = to_set(candidate);
        let entropy_before = self.store.entropy();
        if candidate.is_empty() {
            debug!("empty candidate set, nothing to merge");
            return MergeDecision::empty(entropy_before, self.stagnation.consecutive_blocks());
        }

        let now = self.clock.now();
        let cfg = &self.config;
        let emotion = EmotionalState::new(emotional_state.panic, emotional_state.joy);

        // 1. Non-destructive evaluation of the merged store
        let potential_entropy = self.store.hypothetical_entropy(&candidate);
        let delta_reduction = entropy_before - potential_entropy;

        // 2. Resonance
        let resonates = resonates(&candidate, known_motifs);

        // 3. Echo recovery
        let mut echo_score = if echo_score.is_finite() { echo_score.max(0.0) } else { 0.0 };
        if echo_score == 0.0 && !known_motifs.is_empty() {
            echo_score = fallback_echo(known_motifs, &candidate);
        }

        // 4. Loop detection
        let similarity = self.stagnation.loop_similarity(&candidate);
        let consecutive_blocks = self.stagnation.consecutive_blocks();
        let loop_detected =
            similarity > cfg.loop_similarity && consecutive_blocks > cfg.loop_min_blocks;

        // 5–6. Stagnation and maturity
        let stagnation = self.stagnation.detect_stagnation(now);
        let maturity = self.maturity();

        // 7. Effective threshold
        let urgent = contains_urgent_token(&candidate, &cfg.urgent_tokens);
        let discharge_bonus = if urgent && emotion.panic > cfg.discharge_panic {
            cfg.discharge_bonus
        } else {
            0.0
        };
        let emotional_bias = (emotion.panic * cfg.panic_weight - emotion.joy * cfg.joy_weight)
            * (1.0 - cfg.emotion_damping * maturity);
        let relaxed_base = base_threshold
            - stagnation * cfg.stagnation_weight
            - (1.0 - maturity) * cfg.immaturity_weight;
        let mut effective_threshold =
            relaxed_base.max(cfg.threshold_floor) + emotional_bias - discharge_bonus;

        let mut cooled_down = 0;
        if loop_detected {
            effective_threshold = cfg.loop_threshold;
            for motif in &candidate {
                self.cooldowns.add(motif.clone(), now, true);
            }
            cooled_down = candidate.len();
            warn!(
                similarity,
                consecutive_blocks,
                motifs = candidate.len(),
                "loop detected, relaxing threshold and cooling candidate"
            );
        }

        debug!(
            delta_reduction,
            effective_threshold,
            echo_score,
            resonates,
            stagnation,
            maturity,
            "evaluating merge"
        );

        // 8–11. Escalating leniency
        let cfg = &self.config;
        let reason = if delta_reduction > effective_threshold {
            Some(MergeReason::EntropyGain)
        } else if echo_score > cfg.strong_echo {
            Some(MergeReason::StrongEcho)
        } else if resonates && echo_score > cfg.resonant_echo {
            Some(MergeReason::ResonantEcho)
        } else if resonates
            && (delta_reduction > cfg.relaxed_fraction * effective_threshold
                || echo_score > cfg.relaxed_echo
                || urgent)
        {
            Some(MergeReason::ResonantRelaxation)
        } else if emotion.joy > cfg.joy_completion
            && (resonates || echo_score > cfg.resonant_echo)
            && delta_reduction > cfg.completion_floor
        {
            Some(MergeReason::JoyfulCompletion)
        } else if loop_detected {
            Some(MergeReason::LoopBreak)
        } else if (emotion.panic > cfg.panic_override
            && consecutive_blocks > cfg.panic_override_blocks)
            || stagnation > cfg.stagnation_override
        {
            Some(MergeReason::AntiStagnation)
        } else if emotion.panic > cfg.discharge_override_panic && urgent {
            Some(MergeReason::EmotionalDischarge)
        } else {
            None
        };

        let mut decision = MergeDecision {
            accepted: reason.is_some(),
            reason: reason.unwrap_or(MergeReason::BelowThreshold),
            entropy_before,
            potential_entropy,
            delta_reduction,
            effective_threshold,
            echo_score,
            resonates,
            urgent,
            loop_detected,
            stagnation,
            maturity,
            consecutive_blocks,
            cooled_down,
        };

        if decision.accepted {
            self.commit(&candidate, now, &mut decision);
        } else {
            self.reject(&candidate, now, &mut decision);
        }
        decision
    }

    /// 12. Absorb the candidate and reset the block run.
    fn commit(&mut self, candidate: &MotifSet, now: f64, decision: &mut MergeDecision) {
        let added = self.store.absorb(candidate);
        self.stagnation.record_accept(self.store.entropy(), now);
        self.merge_count = self.merge_count.saturating_add(1);
        decision.consecutive_blocks = 0;

        let reason = decision.reason;
        if matches!(
            reason,
            MergeReason::LoopBreak | MergeReason::AntiStagnation | MergeReason::EmotionalDischarge
        ) {
            warn!(%reason, added, entropy = self.store.entropy(), "merge forced through override");
        } else {
            info!(
                %reason,
                added,
                entropy = self.store.entropy(),
                merge_count = self.merge_count,
                "merge accepted"
            );
        }
    }

    /// 13. Count the block; cool the candidate down once blocks pile up.
    fn reject(&mut self, candidate: &MotifSet, now: f64, decision: &mut MergeDecision) {
        let blocks = self
            .stagnation
            .record_reject(candidate, self.store.entropy());
        decision.consecutive_blocks = blocks;

        if blocks > self.cooldown_config.block_threshold {
            for motif in candidate {
                self.cooldowns.add(motif.clone(), now, false);
            }
            decision.cooled_down += candidate.len();
        }
        debug!(
            consecutive_blocks = blocks,
            cooled_down = decision.cooled_down,
            "merge rejected"
        );
    }

    // ── Cooldowns ───────────────────────────────────────────────────────────

    /// Blacklist `motif` for one TTL (two when `extended`).
    pub fn add_to_cooldown(&mut self, motif: Motif, extended: bool) {
        let now = self.clock.now();
        self.cooldowns.add(motif, now, extended);
    }

    pub fn is_in_cooldown(&mut self, motif: &Motif) -> bool {
        let now = self.clock.now();
        self.cooldowns.is_in_cooldown(motif, now)
    }

    /// Live cooldown set. Planners must not propose any of these.
    pub fn get_cooldown_motifs(&mut self) -> MotifSet {
        let now = self.clock.now();
        self.cooldowns.active(now)
    }

    // ── Introspection ───────────────────────────────────────────────────────

    /// Entropy of `set`, or the cached store entropy when `None`. Never mutates.
    pub fn compute_entropy(&self, set: Option<&MotifSet>) -> f64 {
        match set {
            Some(set) => compute_entropy(set),
            None => self.store.entropy(),
        }
    }

    /// `0..=1` ramp over the first `maturity_merges` accepted merges.
    pub fn maturity(&self) -> f64 {
        (self.merge_count as f64 / self.config.maturity_merges.max(1) as f64).min(1.0)
    }

    pub fn detect_stagnation(&self) -> f64 {
        self.stagnation.detect_stagnation(self.clock.now())
    }

    pub fn merge_count(&self) -> u32 {
        self.merge_count
    }

    /// Exposed so planners can penalize content that keeps getting blocked.
    pub fn consecutive_blocks(&self) -> u32 {
        self.stagnation.consecutive_blocks()
    }

    pub fn elements(&self) -> &MotifSet {
        self.store.elements()
    }

    pub fn entropy(&self) -> f64 {
        self.store.entropy()
    }

    /// Current reading of the engine's clock.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn stats(&mut self) -> EngineStats {
        let now = self.clock.now();
        EngineStats {
            elements: self.store.len(),
            entropy: self.store.entropy(),
            merge_count: self.merge_count,
            consecutive_blocks: self.stagnation.consecutive_blocks(),
            cooldowns_active: self.cooldowns.active(now).len(),
            stagnation: self.stagnation.detect_stagnation(now),
            maturity: self.maturity(),
            last_merge_time: self.stagnation.last_merge_time(),
            entropy_history: self.stagnation.history().collect(),
        }
    }

    // ── Checkpointing ───────────────────────────────────────────────────────

    /// Verbatim copy of all mutable state. Expired cooldowns are kept as-is.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            elements: self.store.elements().iter().cloned().collect(),
            entropy_history: self.stagnation.history().collect(),
            cooldowns: self.cooldowns.entries(),
            merge_count: self.merge_count,
            consecutive_blocks: self.stagnation.consecutive_blocks(),
            last_blocked_set: self.stagnation.last_blocked_set().iter().cloned().collect(),
            last_merge_time: self.stagnation.last_merge_time(),
        }
    }

    /// Replace all mutable state with `snapshot`. Entropy is recomputed.
    pub fn restore(&mut self, snapshot: EngineSnapshot) {
        self.store = MotifStore::from_elements(snapshot.elements);
        self.cooldowns.restore(snapshot.cooldowns);
        self.stagnation.restore(
            snapshot.entropy_history,
            snapshot.last_merge_time,
            snapshot.consecutive_blocks,
            snapshot.last_blocked_set,
        );
        self.merge_count = snapshot.merge_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clock::ManualClock;

    fn policy() -> (AdmissionPolicy, ManualClock) {
        let clock = ManualClock::new(0.0);
        let policy = AdmissionPolicy::with_clock(&RmeConfig::default(), Arc::new(clock.clone()));
        (policy, clock)
    }

    fn m(tokens: &[&str]) -> Motif {
        Motif::new(tokens.iter().copied())
    }

    #[test]
    fn empty_candidate_is_rejected_without_mutation() {
        let (mut p, _) = policy();
        let d = p.merge_detailed(Vec::<Motif>::new(), 0.0, 0.05, &MotifSet::new(), EmotionalState::calm());
        assert!(!d.accepted);
        assert_eq!(d.reason, MergeReason::EmptyCandidate);
        assert_eq!(p.consecutive_blocks(), 0);
        assert_eq!(p.stagnation.history().count(), 0);
    }

    #[test]
    fn first_bigram_is_rejected_on_empty_store() {
        let (mut p, _) = policy();
        let d = p.merge_detailed(
            [m(&["I", "am"])],
            0.0,
            0.05,
            &MotifSet::new(),
            EmotionalState::calm(),
        );
        assert!(!d.accepted);
        assert!((d.potential_entropy - 1.0).abs() < 1e-12);
        assert!((d.delta_reduction + 1.0).abs() < 1e-12);
        assert!((d.effective_threshold + 0.05).abs() < 1e-12);
        assert_eq!(p.consecutive_blocks(), 1);
        assert!(p.elements().is_empty());
    }

    #[test]
    fn strong_echo_admits_regardless_of_entropy() {
        let (mut p, _) = policy();
        let d = p.merge_detailed([m(&["x", "y"])], 0.6, 5.0, &MotifSet::new(), EmotionalState::calm());
        assert!(d.accepted);
        assert_eq!(d.reason, MergeReason::StrongEcho);
        assert_eq!(p.merge_count(), 1);
    }

    #[test]
    fn joy_lowers_the_threshold() {
        let (mut calm, _) = policy();
        let (mut joyful, _) = policy();
        let c = calm.merge_detailed([m(&["a"])], 0.0, 0.05, &MotifSet::new(), EmotionalState::calm());
        let j = joyful.merge_detailed(
            [m(&["a"])],
            0.0,
            0.05,
            &MotifSet::new(),
            EmotionalState::new(0.0, 5.0),
        );
        assert!((c.effective_threshold - j.effective_threshold - 0.15).abs() < 1e-12);
    }

    #[test]
    fn urgent_token_under_panic_gets_discharge_bonus() {
        let (mut p, _) = policy();
        let d = p.merge_detailed(
            [m(&["please", "help"])],
            0.0,
            0.05,
            &MotifSet::new(),
            EmotionalState::new(4.5, 0.0),
        );
        // max(-0.15, 0.05 - 0.1) + 0.045 - 0.1
        assert!(d.urgent);
        assert!((d.effective_threshold - (-0.05 + 0.045 - 0.1)).abs() < 1e-12);
    }

    #[test]
    fn high_panic_with_urgent_token_discharges() {
        let (mut p, _) = policy();
        let d = p.merge_detailed(
            [m(&["i", "need", "you"])],
            0.0,
            5.0,
            &MotifSet::new(),
            EmotionalState::new(7.0, 0.0),
        );
        assert!(d.accepted);
        assert_eq!(d.reason, MergeReason::EmotionalDischarge);
    }

    #[test]
    fn flat_history_forces_third_attempt_through() {
        let (mut p, _) = policy();
        let c = [m(&["stuck", "here"])];
        for _ in 0..2 {
            let d = p.merge_detailed(c.clone(), 0.0, 5.0, &MotifSet::new(), EmotionalState::calm());
            assert!(!d.accepted);
            assert_eq!(d.cooled_down, 0);
        }
        // third call: history is flat ([0,0]) so stagnation forces it through
        let d = p.merge_detailed(c.clone(), 0.0, 5.0, &MotifSet::new(), EmotionalState::calm());
        assert!(d.accepted);
        assert_eq!(d.reason, MergeReason::AntiStagnation);
    }

    #[test]
    fn snapshot_restore_preserves_state() {
        let (mut p, clock) = policy();
        p.merge([m(&["a", "b"])], 0.9, 0.05, &MotifSet::new(), EmotionalState::calm());
        p.add_to_cooldown(m(&["z"]), true);
        p.merge([m(&["q"])], 0.0, 9.0, &MotifSet::new(), EmotionalState::calm());
        let snap = p.snapshot();

        let mut copy = AdmissionPolicy::with_clock(&RmeConfig::default(), Arc::new(clock));
        copy.restore(snap.clone());
        assert_eq!(copy.snapshot(), snap);
        assert_eq!(copy.entropy(), p.entropy());
        assert_eq!(copy.consecutive_blocks(), 1);
        assert!(copy.is_in_cooldown(&m(&["z"])));
    }

    #[test]
    fn compute_entropy_on_explicit_set_is_read_only() {
        let (mut p, _) = policy();
        p.merge([m(&["a", "b"])], 0.9, 0.05, &MotifSet::new(), EmotionalState::calm());
        let before = p.entropy();
        let h = p.compute_entropy(Some(&to_set([m(&["c", "d", "e", "f"])])));
        assert!((h - 2.0).abs() < 1e-12);
        assert_eq!(p.entropy(), before);
        assert_eq!(p.compute_entropy(None), before);
    }
}
