//! Ollama-backed enricher.
//!
//! Keywords, concepts, summary, and search index come from the same
//! deterministic pipeline as [`LocalEnricher`]; only the embedding is
//! produced by a local Ollama server, folded down to 128 dims and
//! quantized. Any HTTP failure degrades to the local embedding so the
//! write path never depends on the server being up.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

use super::concepts::detect_concepts;
use super::embedding::{EMBEDDING_DIM, QuantizedEmbedding, embed_tokens};
use super::keywords::extract_keywords;
use super::local::{build_search_index, summarize};
use super::tokenize::tokenize;
use super::{Enricher, Enrichment};

/// Default Ollama server endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default embedding model.
pub const DEFAULT_MODEL: &str = "nomic-embed-text";

/// Per-request HTTP timeout.
const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(8);

/// Enricher that sources embeddings from a local Ollama server.
pub struct OllamaEnricher {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEnricher {
    /// Create an enricher against the given endpoint and model, with
    /// defaults for `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(endpoint: Option<String>, model: Option<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    fn remote_vector(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.endpoint);
        let request = EmbedRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .map_err(|e| Error::Internal(format!("embedding request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Internal(format!(
                "embedding request returned {}",
                response.status()
            )));
        }

        let data: EmbedResponse = response
            .json()
            .map_err(|e| Error::Internal(format!("bad embedding response: {e}")))?;

        data.embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Internal("no embeddings in response".to_string()))
    }
}

/// Fold an arbitrary-dimension vector into [`EMBEDDING_DIM`] and
/// L2-normalize, so remote models of any width stay compatible with
/// the stored format.
#[must_use]
pub fn fold_to_dim(v: &[f32]) -> Vec<f32> {
    let mut folded = vec![0.0_f32; EMBEDDING_DIM];
    for (i, &x) in v.iter().enumerate() {
        folded[i % EMBEDDING_DIM] += x;
    }

    let norm = folded.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut folded {
            *x /= norm;
        }
    }
    folded
}

impl Enricher for OllamaEnricher {
    fn enrich(&self, title: &str, content: Option<&str>, tags: &[String]) -> Result<Enrichment> {
        let mut all_tokens = tokenize(title);
        if let Some(content) = content {
            all_tokens.extend(tokenize(content));
        }
        for tag in tags {
            all_tokens.extend(tokenize(tag));
        }

        let mut text = title.to_string();
        if let Some(content) = content {
            text.push_str("\n\n");
            text.push_str(content);
        }

        let vector = match self.remote_vector(&text) {
            Ok(v) => fold_to_dim(&v),
            Err(e) => {
                warn!(error = %e, "remote embedding failed, using local embedder");
                embed_tokens(&all_tokens)
            }
        };

        Ok(Enrichment {
            ai_summary: summarize(title, content),
            keywords: extract_keywords(title, content, tags),
            concepts: detect_concepts(&all_tokens),
            search_index: build_search_index(title, content, tags),
            embedding: Some(QuantizedEmbedding::quantize(&vector)),
        })
    }

    fn embedding_dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn version(&self) -> String {
        format!("ollama-{}", self.model)
    }
}
