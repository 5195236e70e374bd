//! Similarity metrics and top-k ranking over the demonstration index.
//!
//! Two interchangeable strategies share one contract: score every indexed
//! demonstration, return the indices of the `min(k, len)` best, highest
//! first, ties in corpus order.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::semantic::index::DemonstrationIndex;

/// Default number of demonstrations returned per query.
pub const DEFAULT_TOP_K: usize = 3;

/// How a query is compared against the demonstration index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Jaccard over masked, normalized token sets.
    TokenOverlap,
    /// Cosine over embeddings of the raw text.
    Embedding,
}

/// |a ∩ b| / |a ∪ b|. Two empty sets score 0.0.
pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f32 / union as f32
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity; 0.0 for zero-norm, mismatched or non-finite vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let similarity = dot_product / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

/// Indices of the `min(k, scores.len())` highest scores, best first.
/// The sort is stable so equal scores keep ascending index order. NaN
/// ranks as negative infinity.
pub fn top_k(scores: &[f32], k: usize) -> Vec<usize> {
    // with NaN mapped away partial_cmp is a total order (and -0.0 == 0.0)
    let key = |i: usize| {
        let score = scores[i];
        if score.is_nan() {
            f32::NEG_INFINITY
        } else {
            score
        }
    };

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
    order.truncate(k);
    order
}

/// Rank demonstrations by token overlap with `query_tokens`.
pub fn rank_tokens(
    query_tokens: &HashSet<String>,
    index: &DemonstrationIndex,
    k: usize,
) -> Vec<usize> {
    let scores: Vec<f32> = index
        .entries()
        .iter()
        .map(|entry| jaccard_similarity(query_tokens, &entry.tokens))
        .collect();
    top_k(&scores, k)
}

/// Rank demonstrations by cosine similarity with `query_embedding`.
pub fn rank_embedding(query_embedding: &[f32], index: &DemonstrationIndex, k: usize) -> Vec<usize> {
    let scores: Vec<f32> = index
        .entries()
        .iter()
        .map(|entry| cosine_similarity(query_embedding, &entry.embedding))
        .collect();
    top_k(&scores, k)
}
