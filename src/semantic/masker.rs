//! Semantic keyword masking.
//!
//! Every n-gram (n = 1..=max_ngram) of the canonical text is embedded in a
//! single batch and compared against the keyword index. Spans whose best
//! category clears the threshold are replaced by that category's
//! placeholder.
//!
//! Substitution walks the candidates in reverse generation order, so the
//! longest spans are replaced before their own sub-spans. Replacement is a
//! literal substring replace of every occurrence; a span that no longer
//! occurs in the buffer (already consumed by a longer span) is skipped.
//! Replacement ignores word boundaries: a tagged `pin` also rewrites
//! `spinning`.

use std::sync::Arc;

use crate::semantic::embeddings::{Embedder, EmbeddingError};
use crate::semantic::keywords::KeywordIndex;
use crate::semantic::normalize::{canonicalize, ngrams_up_to};

/// Default minimum similarity for a span to be masked
pub const DEFAULT_MASK_THRESHOLD: f32 = 0.65;

/// Default longest n-gram considered for masking
pub const DEFAULT_MAX_NGRAM: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaskerSettings {
    pub threshold: f32,
    pub max_ngram: usize,
}

impl Default for MaskerSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MASK_THRESHOLD,
            max_ngram: DEFAULT_MAX_NGRAM,
        }
    }
}

/// One scored n-gram. `category`/`placeholder` are set only when the best
/// category reached the threshold.
#[derive(Debug, Clone)]
pub struct MaskCandidate {
    pub span: String,
    pub score: f32,
    pub category: Option<String>,
    pub placeholder: Option<String>,
}

impl MaskCandidate {
    pub fn is_tagged(&self) -> bool {
        self.placeholder.is_some()
    }
}

pub struct Masker {
    embedder: Arc<dyn Embedder>,
    keywords: Arc<KeywordIndex>,
    settings: MaskerSettings,
}

impl Masker {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        keywords: Arc<KeywordIndex>,
        settings: MaskerSettings,
    ) -> Self {
        Self {
            embedder,
            keywords,
            settings,
        }
    }

    pub fn settings(&self) -> MaskerSettings {
        self.settings
    }

    pub fn keywords(&self) -> &KeywordIndex {
        &self.keywords
    }

    /// Score every n-gram of `text` in generation order (all 1-grams, then
    /// all 2-grams, ...). Issues exactly one batch embedding call, or none
    /// when the text has no words.
    pub fn candidates(&self, text: &str) -> Result<Vec<MaskCandidate>, EmbeddingError> {
        let canonical = canonicalize(text);
        self.score_spans(ngrams_up_to(&canonical, self.settings.max_ngram))
    }

    /// Mask keyword-like spans of `text`. Whitespace-only input masks to "".
    pub fn mask(&self, text: &str) -> Result<String, EmbeddingError> {
        let canonical = canonicalize(text);
        if canonical.split_whitespace().next().is_none() {
            return Ok(String::new());
        }

        let candidates = self.score_spans(ngrams_up_to(&canonical, self.settings.max_ngram))?;
        Ok(apply_substitutions(canonical, &candidates))
    }

    fn score_spans(&self, spans: Vec<String>) -> Result<Vec<MaskCandidate>, EmbeddingError> {
        if spans.is_empty() {
            return Ok(vec![]);
        }

        let embeddings = self.embedder.embed_batch(&spans)?;
        if embeddings.len() != spans.len() {
            return Err(EmbeddingError::CountMismatch {
                sent: spans.len(),
                got: embeddings.len(),
            });
        }

        let candidates = spans
            .into_iter()
            .zip(embeddings.iter())
            .map(|(span, embedding)| {
                match self.keywords.best_match(embedding, self.settings.threshold) {
                    Some(hit) => MaskCandidate {
                        span,
                        score: hit.score,
                        category: Some(hit.category.name.clone()),
                        placeholder: Some(hit.category.placeholder.clone()),
                    },
                    None => MaskCandidate {
                        span,
                        score: self.best_score(embedding),
                        category: None,
                        placeholder: None,
                    },
                }
            })
            .collect();

        Ok(candidates)
    }

    fn best_score(&self, embedding: &[f32]) -> f32 {
        self.keywords
            .best_match(embedding, f32::NEG_INFINITY)
            .map(|hit| hit.score)
            .unwrap_or(0.0)
    }
}

/// Replace tagged spans in `canonical`, longest (last generated) first.
pub fn apply_substitutions(canonical: String, candidates: &[MaskCandidate]) -> String {
    let mut masked = canonical;

    for candidate in candidates.iter().rev() {
        let Some(placeholder) = &candidate.placeholder else {
            continue;
        };

        // consumed by a longer span
        if !masked.contains(candidate.span.as_str()) {
            continue;
        }

        masked = masked.replace(candidate.span.as_str(), placeholder);
    }

    masked
}
