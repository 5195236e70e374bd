use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::corpus::{self, Demonstration, LoadError};
use crate::semantic::{
    rank_embedding, rank_tokens, tokenize, DemonstrationIndex, Embedder, EmbeddingError,
    KeywordIndex, KeywordIndexError, MaskCandidate, Masker, MaskerSettings, Strategy,
};

/// Status string of a successful retrieval
pub const STATUS_SUCCESS: &str = "success";

/// `masked_query` reported by the embedding-only variant
pub const MASK_DISABLED: &str = "<DISABLED>";

/// Fatal errors while building the context.
#[derive(thiserror::Error, Debug)]
pub enum StartupError {
    #[error("failed to load data: {0}")]
    Load(#[from] LoadError),

    #[error("failed to build index: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl From<KeywordIndexError> for StartupError {
    fn from(err: KeywordIndexError) -> Self {
        match err {
            KeywordIndexError::Load(e) => StartupError::Load(e),
            KeywordIndexError::Embedding(e) => StartupError::Embedding(e),
        }
    }
}

/// Request-scoped errors.
#[derive(thiserror::Error, Debug)]
pub enum RetrievalError {
    #[error("embedding provider failed: {0}")]
    Embedding(#[from] EmbeddingError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResponse {
    pub status: String,
    pub masked_query: String,
    pub data: Vec<Demonstration>,
}

/// Everything a request needs, built once at startup and shared read-only.
pub struct RetrievalContext {
    embedder: Arc<dyn Embedder>,
    masker: Masker,
    demonstrations: Vec<Demonstration>,
    index: DemonstrationIndex,
    top_k: usize,
}

impl RetrievalContext {
    /// Load keywords and demonstrations from the configured files and build
    /// both indexes.
    pub fn from_config(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Self, StartupError> {
        let keywords = corpus::load_keywords(&config.keywords_file())?;
        let demonstrations = corpus::load_demonstrations(&config.demonstrations_file())?;

        Self::build(
            embedder,
            &keywords,
            &config.masking.placeholders,
            demonstrations,
            config.masking.settings(),
            config.retrieval.top_k,
        )
    }

    pub fn build(
        embedder: Arc<dyn Embedder>,
        keywords: &BTreeMap<String, Vec<String>>,
        placeholders: &HashMap<String, String>,
        demonstrations: Vec<Demonstration>,
        settings: MaskerSettings,
        top_k: usize,
    ) -> Result<Self, StartupError> {
        let keyword_index = KeywordIndex::build(embedder.as_ref(), keywords, placeholders)?;
        log::info!(
            "Keyword index ready: {} categories, model '{}'",
            keyword_index.len(),
            embedder.name()
        );

        let masker = Masker::new(embedder.clone(), Arc::new(keyword_index), settings);
        log::info!(
            "Masking spans up to {} words at threshold {}",
            masker.settings().max_ngram,
            masker.settings().threshold
        );

        let index = DemonstrationIndex::build(&masker, embedder.as_ref(), &demonstrations)?;
        debug_assert!(index.is_current_for(masker.keywords()));

        Ok(Self {
            embedder,
            masker,
            demonstrations,
            index,
            top_k,
        })
    }

    pub fn demonstrations(&self) -> &[Demonstration] {
        &self.demonstrations
    }

    pub fn keywords(&self) -> &KeywordIndex {
        self.masker.keywords()
    }

    pub fn model_name(&self) -> &str {
        self.embedder.name()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn mask(&self, query: &str) -> Result<String, RetrievalError> {
        Ok(self.masker.mask(query)?)
    }

    pub fn explain(&self, query: &str) -> Result<Vec<MaskCandidate>, RetrievalError> {
        Ok(self.masker.candidates(query)?)
    }

    /// Rank by token overlap of the masked query, using the configured `top_k`.
    pub fn similarity(&self, query: &str) -> Result<SimilarityResponse, RetrievalError> {
        self.similarity_top(query, self.top_k)
    }

    pub fn similarity_top(&self, query: &str, k: usize) -> Result<SimilarityResponse, RetrievalError> {
        let masked_query = self.masker.mask(query)?;
        let tokens = tokenize(&masked_query);
        let ranked = rank_tokens(&tokens, &self.index, k);

        log::debug!(
            "strategy={:?} query_len={} results={}",
            Strategy::TokenOverlap,
            query.len(),
            ranked.len()
        );

        Ok(self.respond(masked_query, &ranked))
    }

    /// Rank by embedding of the raw query; the mask is not exposed.
    pub fn similarity_partial(&self, query: &str) -> Result<SimilarityResponse, RetrievalError> {
        self.similarity_partial_top(query, self.top_k)
    }

    pub fn similarity_partial_top(
        &self,
        query: &str,
        k: usize,
    ) -> Result<SimilarityResponse, RetrievalError> {
        let embedding = self.embedder.embed(query)?;
        let ranked = rank_embedding(&embedding, &self.index, k);

        log::debug!(
            "strategy={:?} query_len={} results={}",
            Strategy::Embedding,
            query.len(),
            ranked.len()
        );

        Ok(self.respond(MASK_DISABLED.to_string(), &ranked))
    }

    pub fn search(
        &self,
        query: &str,
        strategy: Strategy,
        k: usize,
    ) -> Result<SimilarityResponse, RetrievalError> {
        match strategy {
            Strategy::TokenOverlap => self.similarity_top(query, k),
            Strategy::Embedding => self.similarity_partial_top(query, k),
        }
    }

    fn respond(&self, masked_query: String, ranked: &[usize]) -> SimilarityResponse {
        SimilarityResponse {
            status: STATUS_SUCCESS.to_string(),
            masked_query,
            data: ranked
                .iter()
                .filter_map(|&i| self.demonstrations.get(i).cloned())
                .collect(),
        }
    }
}
