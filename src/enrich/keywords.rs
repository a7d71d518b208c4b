//! Term-frequency keyword extraction.
//!
//! Weights are normalized by the maximum frequency so the heaviest
//! keyword always scores 1.0; title tokens count double because the
//! title is the strongest relevance signal an item carries.

use std::collections::HashMap;

use super::tokenize::tokenize;

/// Keywords retained per item.
pub const MAX_KEYWORDS: usize = 20;

/// Frequency boost applied to title tokens.
const TITLE_BOOST: f64 = 2.0;

/// Extract weighted keywords from an item's text and tags.
///
/// Returns `(word, weight)` pairs with weights in `(0, 1]`, sorted by
/// weight descending then word ascending, truncated to
/// [`MAX_KEYWORDS`].
#[must_use]
pub fn extract_keywords(
    title: &str,
    content: Option<&str>,
    tags: &[String],
) -> Vec<(String, f64)> {
    let mut counts: HashMap<String, f64> = HashMap::new();

    for token in tokenize(title) {
        *counts.entry(token).or_default() += TITLE_BOOST;
    }
    if let Some(content) = content {
        for token in tokenize(content) {
            *counts.entry(token).or_default() += 1.0;
        }
    }
    for tag in tags {
        for token in tokenize(tag) {
            *counts.entry(token).or_default() += 1.0;
        }
    }

    let max = counts.values().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return Vec::new();
    }

    let mut weighted: Vec<(String, f64)> = counts
        .into_iter()
        .map(|(word, count)| (word, count / max))
        .collect();

    weighted.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    weighted.truncate(MAX_KEYWORDS);
    weighted
}
