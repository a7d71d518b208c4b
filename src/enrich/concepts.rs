//! Closed-vocabulary concept detection.
//!
//! Each concept label carries a seed-term list; an item's confidence
//! in a concept is its seed-term hit count normalized by the best
//! concept's count. The vocabulary is fixed and versioned with the
//! enricher.

/// Concepts retained per item.
pub const MAX_CONCEPTS: usize = 10;

/// The concept vocabulary: `(label, seed terms)`.
pub const CONCEPT_VOCABULARY: &[(&str, &[&str])] = &[
    (
        "authentication",
        &["auth", "login", "password", "token", "oauth", "credential", "signin", "session"],
    ),
    (
        "database",
        &["database", "sql", "sqlite", "query", "schema", "migration", "index", "transaction"],
    ),
    (
        "networking",
        &["http", "request", "response", "endpoint", "socket", "timeout", "network", "url"],
    ),
    (
        "testing",
        &["test", "tests", "assert", "coverage", "fixture", "mock", "regression", "flaky"],
    ),
    (
        "performance",
        &["slow", "performance", "latency", "cache", "optimize", "memory", "profiling", "fast"],
    ),
    (
        "security",
        &["security", "vulnerability", "exploit", "injection", "xss", "csrf", "encryption"],
    ),
    (
        "ui",
        &["ui", "button", "render", "layout", "css", "frontend", "screen", "display"],
    ),
    (
        "api",
        &["api", "rest", "graphql", "rpc", "contract", "payload", "json", "serialization"],
    ),
    (
        "deployment",
        &["deploy", "release", "docker", "pipeline", "ci", "build", "rollback", "production"],
    ),
    (
        "configuration",
        &["config", "configuration", "environment", "settings", "flag", "option", "default"],
    ),
    (
        "documentation",
        &["docs", "documentation", "readme", "guide", "tutorial", "reference", "example"],
    ),
    (
        "error-handling",
        &["error", "exception", "panic", "crash", "failure", "retry", "fallback", "bug"],
    ),
    (
        "search",
        &["search", "filter", "ranking", "relevance", "fulltext", "match", "suggest"],
    ),
    (
        "storage",
        &["storage", "file", "disk", "persistence", "backup", "blob", "archive"],
    ),
    (
        "planning",
        &["plan", "milestone", "roadmap", "estimate", "scope", "priority", "deadline"],
    ),
    (
        "refactoring",
        &["refactor", "cleanup", "rename", "restructure", "simplify", "duplication", "debt"],
    ),
];

/// Detect concepts from the item's tokens.
///
/// Returns `(label, confidence)` pairs with confidences in `(0, 1]`,
/// sorted by confidence descending then label ascending, truncated to
/// [`MAX_CONCEPTS`].
#[must_use]
pub fn detect_concepts(tokens: &[String]) -> Vec<(String, f64)> {
    let mut scores: Vec<(&str, f64)> = Vec::new();

    for (label, seeds) in CONCEPT_VOCABULARY {
        let hits = tokens
            .iter()
            .filter(|t| seeds.contains(&t.as_str()))
            .count();
        if hits > 0 {
            scores.push((label, hits as f64));
        }
    }

    let max = scores.iter().map(|(_, s)| *s).fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return Vec::new();
    }

    let mut weighted: Vec<(String, f64)> = scores
        .into_iter()
        .map(|(label, score)| (label.to_string(), score / max))
        .collect();

    weighted.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    weighted.truncate(MAX_CONCEPTS);
    weighted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::tokenize::tokenize;

    #[test]
    fn test_detects_authentication() {
        let tokens = tokenize("login fails when the auth token expires");
        let concepts = detect_concepts(&tokens);
        assert_eq!(concepts[0].0, "authentication");
        assert!((concepts[0].1 - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_multiple_concepts_ranked() {
        let tokens = tokenize("sql query timeout on the http endpoint");
        let concepts = detect_concepts(&tokens);
        let labels: Vec<&str> = concepts.iter().map(|(l, _)| l.as_str()).collect();
        assert!(labels.contains(&"database"));
        assert!(labels.contains(&"networking"));
        assert!(concepts.iter().all(|(_, w)| *w > 0.0 && *w <= 1.0));
    }

    #[test]
    fn test_no_match_yields_empty() {
        let tokens = tokenize("zebra giraffe hippo");
        assert!(detect_concepts(&tokens).is_empty());
    }

    #[test]
    fn test_deterministic_and_capped() {
        let tokens = tokenize(
            "auth sql http test slow security ui api deploy config docs error search file plan refactor",
        );
        let a = detect_concepts(&tokens);
        let b = detect_concepts(&tokens);
        assert_eq!(a, b);
        assert!(a.len() <= MAX_CONCEPTS);
    }
}
