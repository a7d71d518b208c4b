//! The default in-process enricher.
//!
//! Fully deterministic: same `(title, content, tags)` always yields
//! the same derived fields, which is what makes reindexing and the
//! write-path purity invariant testable.

use crate::error::Result;

use super::concepts::detect_concepts;
use super::embedding::{QuantizedEmbedding, embed_tokens};
use super::keywords::extract_keywords;
use super::tokenize::{tokenize, tokenize_unique};
use super::{Enricher, Enrichment};

/// Maximum summary length in characters.
pub const MAX_SUMMARY_LEN: usize = 500;

/// Minimum token count before a summary is produced.
const MIN_SUMMARY_TOKENS: usize = 3;

/// Deterministic in-process enricher, version `local-1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalEnricher;

impl LocalEnricher {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Enricher for LocalEnricher {
    fn enrich(&self, title: &str, content: Option<&str>, tags: &[String]) -> Result<Enrichment> {
        let mut all_tokens = tokenize(title);
        if let Some(content) = content {
            all_tokens.extend(tokenize(content));
        }
        for tag in tags {
            all_tokens.extend(tokenize(tag));
        }

        let keywords = extract_keywords(title, content, tags);
        let concepts = detect_concepts(&all_tokens);
        let search_index = build_search_index(title, content, tags);
        let embedding = QuantizedEmbedding::quantize(&embed_tokens(&all_tokens));
        let ai_summary = summarize(title, content);

        Ok(Enrichment {
            ai_summary,
            keywords,
            concepts,
            search_index,
            embedding: Some(embedding),
        })
    }

    fn embedding_dim(&self) -> usize {
        super::EMBEDDING_DIM
    }

    fn version(&self) -> String {
        "local-1".to_string()
    }
}

/// Space-separated first-seen-order unique tokens of the item text.
#[must_use]
pub fn build_search_index(title: &str, content: Option<&str>, tags: &[String]) -> String {
    let mut combined = String::from(title);
    if let Some(content) = content {
        combined.push(' ');
        combined.push_str(content);
    }
    for tag in tags {
        combined.push(' ');
        combined.push_str(tag);
    }
    tokenize_unique(&combined).join(" ")
}

/// Short extractive summary: leading sentences of the content
/// (falling back to the title), truncated to [`MAX_SUMMARY_LEN`].
///
/// Returns `None` when the input carries fewer than three tokens.
#[must_use]
pub fn summarize(title: &str, content: Option<&str>) -> Option<String> {
    let source = match content {
        Some(c) if !c.trim().is_empty() => c.trim(),
        _ => title.trim(),
    };

    let token_count = tokenize(source).len() + tokenize(title).len();
    if token_count < MIN_SUMMARY_TOKENS {
        return None;
    }

    let mut summary = String::new();
    for sentence in source.split_inclusive(['.', '!', '?', '\n']) {
        if summary.chars().count() + sentence.chars().count() > MAX_SUMMARY_LEN {
            break;
        }
        summary.push_str(sentence);
    }

    let summary = summary.trim();
    if summary.is_empty() {
        // A single run-on sentence longer than the cap: hard-truncate
        Some(source.chars().take(MAX_SUMMARY_LEN).collect())
    } else {
        Some(summary.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrich_is_deterministic() {
        let enricher = LocalEnricher::new();
        let tags = vec!["bug".to_string(), "auth".to_string()];
        let a = enricher
            .enrich("Login broken", Some("POST /login 500"), &tags)
            .unwrap();
        let b = enricher
            .enrich("Login broken", Some("POST /login 500"), &tags)
            .unwrap();

        assert_eq!(a.keywords, b.keywords);
        assert_eq!(a.concepts, b.concepts);
        assert_eq!(a.search_index, b.search_index);
        assert_eq!(a.embedding, b.embedding);
        assert_eq!(a.ai_summary, b.ai_summary);
    }

    #[test]
    fn test_enrich_produces_all_derived_fields() {
        let enricher = LocalEnricher::new();
        let result = enricher
            .enrich(
                "Login broken",
                Some("POST /login returns 500 when the auth token expires."),
                &[],
            )
            .unwrap();

        assert!(!result.keywords.is_empty());
        assert!(result.concepts.iter().any(|(l, _)| l == "authentication"));
        assert!(result.search_index.contains("login"));
        assert!(result.embedding.is_some());
        assert!(result.ai_summary.is_some());
    }

    #[test]
    fn test_summary_absent_for_tiny_input() {
        assert!(summarize("Hi", None).is_none());
        assert!(summarize("x", Some("y")).is_none());
    }

    #[test]
    fn test_summary_respects_cap() {
        let long = "word ".repeat(400);
        let summary = summarize("Title here", Some(&long)).unwrap();
        assert!(summary.chars().count() <= MAX_SUMMARY_LEN);
    }

    #[test]
    fn test_summary_takes_leading_sentences() {
        let summary = summarize(
            "Title goes here",
            Some("First sentence. Second sentence. Third."),
        )
        .unwrap();
        assert!(summary.starts_with("First sentence."));
    }

    #[test]
    fn test_search_index_dedupes_in_order() {
        let index = build_search_index("login broken", Some("login auth"), &[]);
        assert_eq!(index, "login broken auth");
    }

    #[test]
    fn test_embedding_dim_contract() {
        assert_eq!(LocalEnricher::new().embedding_dim(), 128);
    }
}
