// src/dedup/title.rs
//! Title similarity used by the second cascade stage.
//!
//! Titles are compared after normalization (see `article::normalize_title`)
//! with normalized Levenshtein similarity in `[0.0, 1.0]`. Exact equality is
//! always a match; near matches count once they reach the threshold.

use strsim::normalized_levenshtein;

/// Default similarity at or above which two titles are the same story.
pub const DEFAULT_TITLE_SIMILARITY: f64 = 0.90;

/// Titles shorter than this only match exactly; edit distance on a handful of
/// characters is too coarse to mean anything.
pub const MIN_FUZZY_CHARS: usize = 12;

/// Similarity of two already-normalized titles.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(a, b)
}

/// Whether `candidate` duplicates `accepted` under `threshold`.
pub fn is_near_duplicate(candidate: &str, accepted: &str, threshold: f64) -> bool {
    if candidate.is_empty() || accepted.is_empty() {
        return false;
    }
    if candidate == accepted {
        return true;
    }
    let shortest = candidate.chars().count().min(accepted.chars().count());
    if shortest < MIN_FUZZY_CHARS {
        return false;
    }
    similarity(candidate, accepted) >= threshold
}
