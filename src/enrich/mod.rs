//! Enrichment pipeline: derived fields computed on write.
//!
//! The engine depends only on the [`Enricher`] capability; an
//! implementation may run fully in-process ([`LocalEnricher`]) or call
//! an external service for the embedding ([`OllamaEnricher`]). Either
//! way the contract is a blocking call the engine timeboxes.
//!
//! # Submodules
//!
//! - [`tokenize`] - lowercasing tokenizer with stopword removal
//! - [`keywords`] - term-frequency keyword extraction
//! - [`concepts`] - closed-vocabulary concept detection
//! - [`embedding`] - deterministic 128-dim embedder and int8 quantization
//! - [`local`] - the default deterministic enricher
//! - [`ollama`] - embedding via a local Ollama server

pub mod concepts;
pub mod embedding;
pub mod keywords;
pub mod local;
pub mod ollama;
pub mod tokenize;

pub use embedding::{EMBEDDING_DIM, QuantizedEmbedding, cosine_similarity, dot};
pub use local::LocalEnricher;
pub use ollama::OllamaEnricher;

use crate::error::Result;

/// Derived fields produced from `(title, content, tags)`.
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    /// Short free-form summary (<= 500 chars); absent for tiny inputs.
    pub ai_summary: Option<String>,
    /// `(word, weight)` pairs, weights in `[0, 1]`, heaviest first.
    pub keywords: Vec<(String, f64)>,
    /// `(label, confidence)` pairs from the closed vocabulary.
    pub concepts: Vec<(String, f64)>,
    /// Space-separated tokenized keywords.
    pub search_index: String,
    /// Quantized 128-dim vector; `None` only when enrichment failed.
    pub embedding: Option<QuantizedEmbedding>,
}

impl Enrichment {
    /// The degraded result used when enrichment fails or times out:
    /// the write still succeeds with empty derived fields.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// The capability the engine depends on to compute derived fields.
///
/// Implementations must be pure with respect to their inputs at a
/// given `version()`; a version change may trigger a reindex.
pub trait Enricher: Send + Sync {
    /// Compute derived fields from title, content, and tag names.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the engine degrades failures to
    /// [`Enrichment::empty`] and logs them.
    fn enrich(&self, title: &str, content: Option<&str>, tags: &[String]) -> Result<Enrichment>;

    /// Embedding dimensionality; must be 128 for compatibility.
    fn embedding_dim(&self) -> usize;

    /// Opaque version identifier.
    fn version(&self) -> String;
}
