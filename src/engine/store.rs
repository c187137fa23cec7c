//! The long-term motif store and its entropy accounting.
//!
//! [`MotifStore`] owns the admitted motifs and caches the Shannon entropy of
//! their flattened token distribution. [`compute_entropy`] is the same math
//! over an arbitrary set, used to evaluate a merge before committing it.

use std::collections::HashMap;

use super::types::{flatten, Motif, MotifSet};

/// Shannon entropy (base 2) of the token distribution across `motifs`.
///
/// Every motif is flattened into one token multiset; `p(t) = count(t) / total`.
/// An empty multiset has entropy `0.0`.
pub fn compute_entropy<'a, I>(motifs: I) -> f64
where
    I: IntoIterator<Item = &'a Motif>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut total = 0usize;
    for token in flatten(motifs) {
        *counts.entry(token).or_insert(0) += 1;
        total += 1;
    }

    if total == 0 {
        return 0.0;
    }

    let total = total as f64;
    let h: f64 = counts
        .values()
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum();
    // A single distinct token yields -0.0
    h.max(0.0)
}

/// Set of admitted motifs plus the cached entropy of their tokens.
///
/// Invariant: `entropy == compute_entropy(elements)` after every mutation.
/// The store only grows; there is no eviction path.
#[derive(Debug, Clone, Default)]
pub struct MotifStore {
    elements: MotifSet,
    entropy: f64,
}

impl MotifStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted elements, recomputing the entropy.
    pub fn from_elements<I>(elements: I) -> Self
    where
        I: IntoIterator<Item = Motif>,
    {
        let elements: MotifSet = elements.into_iter().collect();
        let entropy = compute_entropy(&elements);
        Self { elements, entropy }
    }

    /// Cached entropy of the current elements.
    pub fn entropy(&self) -> f64 {
        self.entropy
    }

    pub fn elements(&self) -> &MotifSet {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Entropy the store would have after absorbing `candidate`. Does not mutate.
    pub fn hypothetical_entropy(&self, candidate: &MotifSet) -> f64 {
        compute_entropy(self.elements.union(candidate))
    }

    /// Union `candidate` into the store and refresh the cached entropy.
    ///
    /// Returns how many motifs were new.
    pub fn absorb(&mut self, candidate: &MotifSet) -> usize {
        let before = self.elements.len();
        self.elements.extend(candidate.iter().cloned());
        let added = self.elements.len() - before;
        if added > 0 {
            self.entropy = compute_entropy(&self.elements);
        }
        added
    }
}
