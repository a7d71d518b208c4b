//! Tokenizer shared by the enrichment pipeline.
//!
//! Lowercases, splits on non-alphanumeric runs, drops single-character
//! tokens and a fixed English stopword list. Deterministic across
//! calls; the stopword list is part of the enricher version.

/// Stopwords removed before weighting.
pub const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "because",
    "been", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has", "have",
    "he", "her", "his", "how", "if", "in", "into", "is", "it", "its", "just", "like", "may",
    "more", "most", "no", "not", "of", "on", "one", "only", "or", "other", "our", "out", "over",
    "she", "should", "so", "some", "such", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "to", "up", "us", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "will", "with", "would", "you", "your",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.binary_search(&token).is_ok()
}

/// Tokenize text into lowercase English-like tokens.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(str::to_lowercase)
        .filter(|t| !is_stopword(t))
        .collect()
}

/// Tokenize while preserving first-seen order and dropping duplicates.
#[must_use]
pub fn tokenize_unique(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopwords_are_sorted_for_binary_search() {
        let mut sorted = STOPWORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(STOPWORDS, sorted.as_slice());
    }

    #[test]
    fn test_tokenize_lowercases_and_strips_punctuation() {
        let tokens = tokenize("POST /login returned 500!");
        assert_eq!(tokens, vec!["post", "login", "returned", "500"]);
    }

    #[test]
    fn test_tokenize_drops_stopwords_and_short_tokens() {
        let tokens = tokenize("the login is a broken thing");
        assert_eq!(tokens, vec!["login", "broken", "thing"]);
    }

    #[test]
    fn test_tokenize_unique_preserves_order() {
        let tokens = tokenize_unique("login broken login auth broken");
        assert_eq!(tokens, vec!["login", "broken", "auth"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("... !!! ---").is_empty());
    }
}
