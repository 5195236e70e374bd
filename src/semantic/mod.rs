//! Semantic masking and similarity retrieval.
//!
//! # Architecture
//!
//! - `embeddings`: `Embedder` trait and the fastembed-backed model
//! - `normalize`: canonical text, tokenization and n-grams
//! - `keywords`: per-category keyword embeddings and best-match lookup
//! - `masker`: replaces keyword-like spans with category placeholders
//! - `index`: precomputed token sets and embeddings of the demonstrations
//! - `rank`: Jaccard / cosine scoring and stable top-k

mod embeddings;
mod index;
mod keywords;
mod masker;
mod normalize;
mod rank;

pub use embeddings::{Embedder, EmbeddingError, EmbeddingModel};
pub use index::DemonstrationIndex;
pub use keywords::{KeywordIndex, KeywordIndexError};
pub use masker::{MaskCandidate, Masker, MaskerSettings};
pub use normalize::tokenize;
pub use rank::{rank_embedding, rank_tokens, Strategy, DEFAULT_TOP_K};

/// Default embedding model name
pub const DEFAULT_MODEL: &str = "all-mpnet-base-v2";
