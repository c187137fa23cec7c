//! Token-overlap signals: resonance, echo, and set containment.

use super::types::{token_set, Motif, MotifSet};

/// Whether any candidate motif shares at least one token with any known motif.
///
/// A single shared token is enough.
pub fn resonates(candidate: &MotifSet, known: &MotifSet) -> bool {
    if candidate.is_empty() || known.is_empty() {
        return false;
    }
    let known_tokens = token_set(known);
    candidate
        .iter()
        .any(|m| m.tokens().iter().any(|t| known_tokens.contains(t.as_str())))
}

/// Fraction of the candidate's distinct tokens that also appear in `known`.
pub fn exact_echo(known: &MotifSet, candidate: &MotifSet) -> f64 {
    let candidate_tokens = token_set(candidate);
    if candidate_tokens.is_empty() {
        return 0.0;
    }
    let known_tokens = token_set(known);
    let shared = candidate_tokens.intersection(&known_tokens).count();
    shared as f64 / candidate_tokens.len().max(1) as f64
}

/// Half-credit echo for near matches.
///
/// A candidate token counts if, case-insensitively, it contains or is contained
/// in some known token. The resulting fraction is halved.
pub fn loose_echo(known: &MotifSet, candidate: &MotifSet) -> f64 {
    let candidate_tokens: Vec<String> = token_set(candidate)
        .into_iter()
        .map(str::to_lowercase)
        .filter(|t| !t.is_empty())
        .collect();
    if candidate_tokens.is_empty() {
        return 0.0;
    }
    let known_tokens: Vec<String> = token_set(known)
        .into_iter()
        .map(str::to_lowercase)
        .filter(|t| !t.is_empty())
        .collect();

    let matched = candidate_tokens
        .iter()
        .filter(|c| {
            known_tokens
                .iter()
                .any(|k| k.contains(c.as_str()) || c.contains(k.as_str()))
        })
        .count();

    0.5 * matched as f64 / candidate_tokens.len().max(1) as f64
}

/// Two-tier echo recovery used when the caller supplied a zero echo score.
pub fn fallback_echo(known: &MotifSet, candidate: &MotifSet) -> f64 {
    let exact = exact_echo(known, candidate);
    if exact > 0.0 {
        exact
    } else {
        loose_echo(known, candidate)
    }
}

/// `|a ∩ b| / |a|`, or `0.0` when `a` is empty.
pub fn containment_ratio(a: &MotifSet, b: &MotifSet) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    a.intersection(b).count() as f64 / a.len().max(1) as f64
}

/// Whether any token of any candidate motif is one of `urgent` (case-insensitive).
pub fn contains_urgent_token(candidate: &MotifSet, urgent: &[String]) -> bool {
    candidate
        .iter()
        .flat_map(Motif::tokens)
        .any(|t| urgent.iter().any(|u| u.eq_ignore_ascii_case(t)))
}
