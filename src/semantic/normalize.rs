//! Text normalization and n-gram generation.
//!
//! Queries and demonstrations must pass through the same functions here,
//! otherwise their similarity scores are not comparable:
//! 1. `canonicalize`: lowercase, drop apostrophes (the masking buffer)
//! 2. `tokenize`: additionally drop every non-word, non-space character
//! 3. `ngrams` / `ngrams_up_to`: contiguous word windows over canonical text

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));

/// Lowercase `text` and strip apostrophes.
pub fn canonicalize(text: &str) -> String {
    text.replace('\'', "").to_lowercase()
}

/// Split `text` into a set of lowercase tokens with punctuation removed.
pub fn tokenize(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    NON_WORD
        .replace_all(&lowered, "")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Every contiguous window of exactly `n` whitespace-separated words,
/// left to right, joined by single spaces.
pub fn ngrams(text: &str, n: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if n == 0 || n > words.len() {
        return vec![];
    }

    words.windows(n).map(|window| window.join(" ")).collect()
}

/// All n-grams for n = 1..=max_n, concatenated in increasing-n order.
pub fn ngrams_up_to(text: &str, max_n: usize) -> Vec<String> {
    (1..=max_n).flat_map(|n| ngrams(text, n)).collect()
}
