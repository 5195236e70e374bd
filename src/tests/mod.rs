//! Shared fixtures for cross-module tests.
//!
//! `FakeEmbedder` stands in for the model: registered concept phrases map
//! to one-hot vectors in the first `CONCEPT_DIMS` dimensions, everything
//! else to a hashed bag of words in the remaining dimensions, so unrelated
//! text never reaches the masking threshold.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::context::RetrievalContext;
use crate::corpus::Demonstration;
use crate::semantic::{Embedder, EmbeddingError, KeywordIndex, MaskerSettings};


pub const DIMS: usize = 64;
const CONCEPT_DIMS: usize = 8;

pub const THEMES: &[&str] = &["fork", "pin", "skewer", "back rank mate", "smothered mate"];
pub const OPENINGS: &[&str] = &["sicilian defense", "queens gambit", "italian game"];

#[derive(Clone, Default)]
pub struct FakeEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    calls: Arc<AtomicUsize>,
    offline: Arc<AtomicBool>,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Themes and openings as two concepts, plus a synonym of "fork".
    pub fn chess() -> Self {
        Self::new()
            .concept(0, THEMES)
            .concept(0, &["double attack"])
            .concept(1, OPENINGS)
    }

    /// Map every phrase to the one-hot vector of `dim`.
    pub fn concept(mut self, dim: usize, phrases: &[&str]) -> Self {
        assert!(dim < CONCEPT_DIMS);
        let mut one_hot = vec![0.0; DIMS];
        one_hot[dim] = 1.0;
        for phrase in phrases {
            self.vectors.insert(key(phrase), one_hot.clone());
        }
        self
    }

    /// Map `text` to an explicit vector, zero-padded to `DIMS`.
    pub fn vector(mut self, text: &str, mut vector: Vec<f32>) -> Self {
        vector.resize(DIMS, 0.0);
        self.vectors.insert(key(text), vector);
        self
    }

    /// Unit vector whose cosine with concept `dim` is `similarity`.
    pub fn blend(dim: usize, similarity: f32) -> Vec<f32> {
        let mut v = vec![0.0; DIMS];
        v[dim] = similarity;
        v[DIMS - 1] = (1.0 - similarity * similarity).sqrt();
        v
    }

    pub fn failing(self) -> Self {
        self.set_offline(true);
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn batch_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let key = key(text);
        if let Some(v) = self.vectors.get(&key) {
            return v.clone();
        }

        let mut v = vec![0.0; DIMS];
        for word in key.split_whitespace() {
            let bucket = fnv1a(word) as usize % (DIMS - CONCEPT_DIMS) + CONCEPT_DIMS;
            v[bucket] += 1.0;
        }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn name(&self) -> &str {
        "fake-embedder"
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(EmbeddingError::EmbeddingFailed("provider offline".to_string()));
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

/// Lowercase, letters/digits/spaces only, single-spaced.
fn key(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf29ce484222325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    })
}

pub fn keyword_mapping() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        (
            "themes".to_string(),
            THEMES.iter().map(|s| s.to_string()).collect(),
        ),
        (
            "opening_tags".to_string(),
            OPENINGS.iter().map(|s| s.to_string()).collect(),
        ),
    ])
}

pub fn placeholders() -> HashMap<String, String> {
    HashMap::from([
        ("themes".to_string(), "<theme>".to_string()),
        ("opening_tags".to_string(), "<opening_tag>".to_string()),
    ])
}

pub fn keyword_fixture(embedder: &dyn Embedder) -> KeywordIndex {
    KeywordIndex::build(embedder, &keyword_mapping(), &placeholders())
        .expect("failed to build keyword index")
}

pub fn demo(text: &str) -> Demonstration {
    Demonstration {
        text: text.to_string(),
        metadata: serde_json::Map::new(),
    }
}

pub fn demo_with_sql(text: &str, sql: &str) -> Demonstration {
    let mut demo = demo(text);
    demo.metadata
        .insert("sql".to_string(), serde_json::Value::String(sql.to_string()));
    demo
}

pub fn corpus() -> Vec<Demonstration> {
    vec![
        demo_with_sql(
            "Find puzzles with a fork",
            "SELECT * FROM puzzles WHERE themes LIKE '%fork%'",
        ),
        demo_with_sql(
            "Show me Sicilian Defense puzzles",
            "SELECT * FROM puzzles WHERE opening_tags LIKE '%Sicilian_Defense%'",
        ),
        demo_with_sql(
            "Find mate in two puzzles",
            "SELECT * FROM puzzles WHERE themes LIKE '%mateIn2%'",
        ),
        demo_with_sql(
            "Puzzles with a pin rated above 2000",
            "SELECT * FROM puzzles WHERE themes LIKE '%pin%' AND rating > 2000",
        ),
        demo_with_sql(
            "Find puzzles with a skewer",
            "SELECT * FROM puzzles WHERE themes LIKE '%skewer%'",
        ),
    ]
}

pub fn context_fixture(embedder: FakeEmbedder) -> RetrievalContext {
    RetrievalContext::build(
        Arc::new(embedder),
        &keyword_mapping(),
        &placeholders(),
        corpus(),
        MaskerSettings::default(),
        3,
    )
    .expect("failed to build retrieval context")
}
