//! Per-category keyword phrases and their precomputed embeddings.

use std::collections::{BTreeMap, HashMap};

use sha2::{Digest, Sha256};

use crate::corpus::LoadError;
use crate::semantic::embeddings::{Embedder, EmbeddingError};
use crate::semantic::rank::cosine_similarity;

/// A named keyword category with one embedding per phrase.
#[derive(Debug, Clone)]
pub struct KeywordCategory {
    pub name: String,
    pub phrases: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub placeholder: String,
}

impl KeywordCategory {
    /// Highest cosine similarity between `embedding` and any phrase.
    pub fn max_similarity(&self, embedding: &[f32]) -> f32 {
        self.embeddings
            .iter()
            .map(|phrase| cosine_similarity(embedding, phrase))
            .fold(f32::NEG_INFINITY, f32::max)
    }
}

/// The best category for an embedding, with its score.
#[derive(Debug, Clone, Copy)]
pub struct KeywordMatch<'a> {
    pub category: &'a KeywordCategory,
    pub score: f32,
}

/// Immutable keyword index, ordered by category name.
#[derive(Debug, Clone)]
pub struct KeywordIndex {
    categories: Vec<KeywordCategory>,
    model: String,
}

#[derive(Debug, thiserror::Error)]
pub enum KeywordIndexError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Placeholder for `category`: the explicit literal when configured,
/// `<category>` otherwise.
pub fn placeholder_for(category: &str, placeholders: &HashMap<String, String>) -> String {
    placeholders
        .get(category)
        .cloned()
        .unwrap_or_else(|| format!("<{category}>"))
}

impl KeywordIndex {
    /// Embed every category's phrases, one batch call per category.
    pub fn build(
        embedder: &dyn Embedder,
        mapping: &BTreeMap<String, Vec<String>>,
        placeholders: &HashMap<String, String>,
    ) -> Result<Self, KeywordIndexError> {
        let mut categories = Vec::with_capacity(mapping.len());

        for (name, phrases) in mapping {
            if phrases.is_empty() {
                return Err(LoadError::EmptyCategory(name.clone()).into());
            }

            let embeddings = embedder.embed_batch(phrases)?;
            if embeddings.len() != phrases.len() {
                return Err(EmbeddingError::CountMismatch {
                    sent: phrases.len(),
                    got: embeddings.len(),
                }
                .into());
            }

            log::debug!("category '{name}': {} phrases embedded", phrases.len());

            categories.push(KeywordCategory {
                name: name.clone(),
                phrases: phrases.clone(),
                embeddings,
                placeholder: placeholder_for(name, placeholders),
            });
        }

        Ok(Self {
            categories,
            model: embedder.name().to_string(),
        })
    }

    #[cfg(test)]
    pub fn categories(&self) -> &[KeywordCategory] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Category with the highest phrase similarity, if that similarity
    /// reaches `threshold`. Ties keep the earlier category.
    pub fn best_match(&self, embedding: &[f32], threshold: f32) -> Option<KeywordMatch<'_>> {
        let mut best: Option<KeywordMatch<'_>> = None;

        for category in &self.categories {
            let score = category.max_similarity(embedding);
            if best.map_or(true, |b| score > b.score) {
                best = Some(KeywordMatch { category, score });
            }
        }

        best.filter(|m| m.score >= threshold)
    }

    /// SHA256 over model, categories, phrases and placeholders. Derived
    /// indexes store it to detect that they must be rebuilt.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.model.as_bytes());
        for category in &self.categories {
            hasher.update([0u8]);
            hasher.update(category.name.as_bytes());
            hasher.update([1u8]);
            hasher.update(category.placeholder.as_bytes());
            for phrase in &category.phrases {
                hasher.update([2u8]);
                hasher.update(phrase.as_bytes());
            }
        }
        hasher.finalize().into()
    }
}
