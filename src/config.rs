//! Engine configuration.
//!
//! Resolves recognized options from environment variables, falling
//! back to built-in defaults. The database path default is relative
//! (`./shirokuma.db`); hosts that want a global location pass an
//! explicit path.

use std::path::PathBuf;

/// Default hybrid-search weight for the keyword strategy.
pub const DEFAULT_HYBRID_KEYWORDS: f64 = 0.4;
/// Default hybrid-search weight for the embedding strategy.
pub const DEFAULT_HYBRID_EMBEDDING: f64 = 0.6;
/// Tolerance when checking that hybrid weights sum to 1.0.
pub const HYBRID_WEIGHT_EPSILON: f64 = 1e-3;

/// Weights for hybrid related-item scoring.
///
/// Strategies absent from the caller's request contribute 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridWeights {
    pub keywords: f64,
    pub concepts: f64,
    pub embedding: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_HYBRID_KEYWORDS,
            concepts: 0.0,
            embedding: DEFAULT_HYBRID_EMBEDDING,
        }
    }
}

impl HybridWeights {
    /// Sum of all strategy weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.keywords + self.concepts + self.embedding
    }

    /// Whether the weights sum to 1.0 within the allowed epsilon.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        (self.total() - 1.0).abs() <= HYBRID_WEIGHT_EPSILON
    }
}

/// Recognized engine options with their defaults.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Location of the persisted store.
    pub database_path: PathBuf,
    /// Page size for `list_items` when the caller omits `limit`.
    pub default_list_limit: usize,
    /// Cap on page size.
    pub max_list_limit: usize,
    /// Per-call enricher budget in milliseconds.
    pub enricher_timeout_ms: u64,
    /// In-flight enricher cap before shedding with `Busy`.
    pub enricher_queue_depth: usize,
    /// Max items scanned in embedding search without a pre-filter.
    pub embedding_candidate_ceiling: usize,
    /// Default hybrid weights if the caller omits them.
    pub hybrid_default_weights: HybridWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./shirokuma.db"),
            default_list_limit: 20,
            max_list_limit: 1000,
            enricher_timeout_ms: 10_000,
            enricher_queue_depth: 64,
            embedding_candidate_ceiling: 10_000,
            hybrid_default_weights: HybridWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Build a config from environment variables, falling back to the
    /// defaults for anything unset or unparseable.
    ///
    /// Recognized variables:
    /// - `SHIROKUMA_DB_PATH`
    /// - `SHIROKUMA_DEFAULT_LIST_LIMIT`
    /// - `SHIROKUMA_MAX_LIST_LIMIT`
    /// - `SHIROKUMA_ENRICHER_TIMEOUT_MS`
    /// - `SHIROKUMA_ENRICHER_QUEUE_DEPTH`
    /// - `SHIROKUMA_EMBEDDING_CANDIDATE_CEILING`
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("SHIROKUMA_DB_PATH") {
            if !path.trim().is_empty() {
                config.database_path = PathBuf::from(path);
            }
        }

        config.default_list_limit =
            env_parse("SHIROKUMA_DEFAULT_LIST_LIMIT", config.default_list_limit);
        config.max_list_limit = env_parse("SHIROKUMA_MAX_LIST_LIMIT", config.max_list_limit);
        config.enricher_timeout_ms =
            env_parse("SHIROKUMA_ENRICHER_TIMEOUT_MS", config.enricher_timeout_ms);
        config.enricher_queue_depth =
            env_parse("SHIROKUMA_ENRICHER_QUEUE_DEPTH", config.enricher_queue_depth);
        config.embedding_candidate_ceiling = env_parse(
            "SHIROKUMA_EMBEDDING_CANDIDATE_CEILING",
            config.embedding_candidate_ceiling,
        );

        config
    }

    /// Clamp a requested page size to `[1, max_list_limit]`, applying
    /// the default when absent.
    #[must_use]
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_list_limit)
            .clamp(1, self.max_list_limit)
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.database_path, PathBuf::from("./shirokuma.db"));
        assert_eq!(config.default_list_limit, 20);
        assert_eq!(config.max_list_limit, 1000);
        assert_eq!(config.enricher_timeout_ms, 10_000);
        assert_eq!(config.enricher_queue_depth, 64);
        assert_eq!(config.embedding_candidate_ceiling, 10_000);
    }

    #[test]
    fn test_default_hybrid_weights_are_normalized() {
        let weights = HybridWeights::default();
        assert!(weights.is_normalized());
        assert!((weights.keywords - 0.4).abs() < f64::EPSILON);
        assert!((weights.embedding - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_effective_limit() {
        let config = EngineConfig::default();
        assert_eq!(config.effective_limit(None), 20);
        assert_eq!(config.effective_limit(Some(50)), 50);
        assert_eq!(config.effective_limit(Some(5000)), 1000);
        assert_eq!(config.effective_limit(Some(0)), 1);
    }

    #[test]
    fn test_unnormalized_weights_detected() {
        let weights = HybridWeights {
            keywords: 0.5,
            concepts: 0.0,
            embedding: 0.6,
        };
        assert!(!weights.is_normalized());
    }
}
