//! Core value types shared by every engine component.
//!
//! Defines [`Motif`] (an immutable token sequence), [`MotifSet`] (the set type
//! all set algebra runs over), and [`EmotionalState`] (the panic/joy scalars
//! supplied by the emotion engine).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An immutable, ordered sequence of string tokens.
///
/// Identity is value equality: two motifs with the same tokens in the same order
/// are the same motif. There is no way to mutate a motif after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Motif(Box<[String]>);

/// The set type used for stores, candidates, and blacklists.
///
/// A `BTreeSet` keeps iteration order stable, so logs and checkpoints are
/// reproducible across runs.
pub type MotifSet = BTreeSet<Motif>;

impl Motif {
    /// Build a motif from any sequence of tokens.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[&str; N]> for Motif {
    fn from(tokens: [&str; N]) -> Self {
        Self::new(tokens)
    }
}

impl From<&str> for Motif {
    /// A bare string is a single-token motif.
    fn from(token: &str) -> Self {
        Self::new([token])
    }
}

impl std::fmt::Display for Motif {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// Normalize any iterable of motifs into a set.
///
/// Duplicates collapse; a single motif can be passed as `Some(motif)` or
/// `[motif]`.
pub fn to_set<I>(motifs: I) -> MotifSet
where
    I: IntoIterator<Item = Motif>,
{
    motifs.into_iter().collect()
}

/// Every token across a set of motifs, flattened in iteration order.
pub fn flatten<'a, I>(motifs: I) -> impl Iterator<Item = &'a str>
where
    I: IntoIterator<Item = &'a Motif>,
{
    motifs
        .into_iter()
        .flat_map(|m| m.tokens().iter().map(String::as_str))
}

/// Distinct tokens across a set of motifs.
pub fn token_set<'a, I>(motifs: I) -> BTreeSet<&'a str>
where
    I: IntoIterator<Item = &'a Motif>,
{
    flatten(motifs).collect()
}

/// Split raw text into every 1..=`max_n` token n-gram.
///
/// Lowercases, and treats anything but alphanumerics and apostrophes as a
/// separator. This is a minimal stand-in for the agent's perception layer.
pub fn ngrams(text: &str, max_n: usize) -> MotifSet {
    let words: Vec<String> = text
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    let mut out = MotifSet::new();
    for n in 1..=max_n.max(1) {
        for window in words.windows(n) {
            out.insert(Motif::new(window.iter().cloned()));
        }
    }
    out
}

/// Emotional modulation supplied by the emotion engine each cycle.
///
/// Both scalars are non-negative; the reference range is roughly `0..=10`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionalState {
    pub panic: f64,
    pub joy: f64,
}

impl EmotionalState {
    /// Construct a state, clamping negative or NaN inputs to zero.
    pub fn new(panic: f64, joy: f64) -> Self {
        Self {
            panic: non_negative(panic),
            joy: non_negative(joy),
        }
    }

    pub fn calm() -> Self {
        Self::default()
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0)
    }
}
