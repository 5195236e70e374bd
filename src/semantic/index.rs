//! Precomputed demonstration index.
//!
//! Stores, per demonstration and in corpus order, the token set of its
//! masked text and the embedding of its raw text. Both are computed once
//! at build time and never mutated.

use std::collections::HashSet;
use std::time::Instant;

use crate::corpus::Demonstration;
use crate::semantic::embeddings::{Embedder, EmbeddingError};
use crate::semantic::keywords::KeywordIndex;
use crate::semantic::masker::Masker;
use crate::semantic::normalize::tokenize;

/// Derived values for one demonstration.
#[derive(Debug, Clone)]
pub struct DemoEntry {
    /// Tokens of the masked, normalized text
    pub tokens: HashSet<String>,
    /// Embedding of the raw (unmasked) text
    pub embedding: Vec<f32>,
}

/// In-memory index over the demonstration corpus, addressed by corpus position.
pub struct DemonstrationIndex {
    entries: Vec<DemoEntry>,
    /// Fingerprint of the keyword index the token sets were masked against
    keywords_fingerprint: [u8; 32],
}

impl DemonstrationIndex {
    /// Mask and tokenize every demonstration, and embed all raw texts in one
    /// batch call.
    pub fn build(
        masker: &Masker,
        embedder: &dyn Embedder,
        demonstrations: &[Demonstration],
    ) -> Result<Self, EmbeddingError> {
        let started = Instant::now();

        let tokens = demonstrations
            .iter()
            .map(|demo| masker.mask(&demo.text).map(|masked| tokenize(&masked)))
            .collect::<Result<Vec<_>, _>>()?;

        let texts: Vec<String> = demonstrations.iter().map(|d| d.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts)?;
        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                sent: texts.len(),
                got: embeddings.len(),
            });
        }

        let entries: Vec<DemoEntry> = tokens
            .into_iter()
            .zip(embeddings)
            .map(|(tokens, embedding)| DemoEntry { tokens, embedding })
            .collect();

        log::info!(
            "Indexed {} demonstrations in {:.2?}",
            entries.len(),
            started.elapsed()
        );

        Ok(Self::from_entries(
            entries,
            masker.keywords().fingerprint(),
        ))
    }

    pub fn from_entries(entries: Vec<DemoEntry>, keywords_fingerprint: [u8; 32]) -> Self {
        Self {
            entries,
            keywords_fingerprint,
        }
    }

    pub fn entries(&self) -> &[DemoEntry] {
        &self.entries
    }

    #[cfg(test)]
    pub fn get(&self, position: usize) -> Option<&DemoEntry> {
        self.entries.get(position)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the token sets were derived from `keywords`. A `false` means
    /// the index must be rebuilt before use.
    pub fn is_current_for(&self, keywords: &KeywordIndex) -> bool {
        self.keywords_fingerprint == keywords.fingerprint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::masker::MaskerSettings;
    use crate::tests::{demo, keyword_fixture, FakeEmbedder};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Arc;

    fn masker(embedder: Arc<dyn Embedder>) -> Masker {
        let keywords = Arc::new(keyword_fixture(embedder.as_ref()));
        Masker::new(embedder, keywords, MaskerSettings::default())
    }

    #[test]
    fn test_build_masks_tokens_and_embeds_raw_text() {
        let embedder = FakeEmbedder::chess();
        let shared: Arc<dyn Embedder> = Arc::new(embedder.clone());
        let masker = masker(shared.clone());

        let corpus = vec![
            demo("Find a Fork, rated 1500!"),
            demo("Sicilian Defense puzzles"),
        ];
        let index = DemonstrationIndex::build(&masker, shared.as_ref(), &corpus).unwrap();

        assert_eq!(index.len(), 2);
        let first = index.get(0).unwrap();
        let expected: HashSet<String> = ["find", "a", "theme", "rated", "1500"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(first.tokens, expected);
        assert_eq!(first.embedding, embedder.embed("Find a Fork, rated 1500!").unwrap());

        assert!(index.get(1).unwrap().tokens.contains("opening_tag"));
        assert!(index.get(2).is_none());
    }

    #[test]
    fn test_build_embeds_corpus_in_one_batch() {
        let embedder = FakeEmbedder::chess();
        let shared: Arc<dyn Embedder> = Arc::new(embedder.clone());
        let masker = masker(shared.clone());
        let corpus = vec![demo("one"), demo("two"), demo("three")];

        let before = embedder.batch_calls();
        DemonstrationIndex::build(&masker, shared.as_ref(), &corpus).unwrap();

        // one mask batch per demonstration plus one for raw texts
        assert_eq!(embedder.batch_calls(), before + corpus.len() + 1);
    }

    #[test]
    fn test_empty_corpus() {
        let shared: Arc<dyn Embedder> = Arc::new(FakeEmbedder::chess());
        let masker = masker(shared.clone());
        let index = DemonstrationIndex::build(&masker, shared.as_ref(), &[]).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_is_current_for_detects_keyword_change() {
        let shared: Arc<dyn Embedder> = Arc::new(FakeEmbedder::chess());
        let masker = masker(shared.clone());
        let index =
            DemonstrationIndex::build(&masker, shared.as_ref(), &[demo("a fork")]).unwrap();

        assert!(index.is_current_for(masker.keywords()));

        let changed = KeywordIndex::build(
            shared.as_ref(),
            &BTreeMap::from([("themes".to_string(), vec!["pin".to_string()])]),
            &HashMap::new(),
        )
        .unwrap();
        assert!(!index.is_current_for(&changed));
    }
}
