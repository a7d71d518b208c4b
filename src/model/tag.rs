//! Cross-cutting tags.
//!
//! Tags are shared across all item types. Names are normalized to
//! lowercase with hyphens; lookup is case-insensitive.

use serde::{Deserialize, Serialize};

/// A normalized tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Normalize a tag name: trim, lowercase, collapse internal
/// whitespace runs into single hyphens.
///
/// Returns `None` if nothing remains after trimming.
#[must_use]
pub fn normalize_tag_name(input: &str) -> Option<String> {
    let trimmed = input.trim().to_lowercase();
    if trimmed.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(trimmed.len());
    let mut last_was_gap = false;
    for c in trimmed.chars() {
        if c.is_whitespace() {
            if !last_was_gap && !out.is_empty() {
                out.push('-');
            }
            last_was_gap = true;
        } else {
            out.push(c);
            last_was_gap = false;
        }
    }

    // A trailing whitespace run leaves a dangling hyphen
    while out.ends_with('-') {
        out.pop();
    }

    if out.is_empty() { None } else { Some(out) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_trims() {
        assert_eq!(normalize_tag_name("  Bug  "), Some("bug".to_string()));
        assert_eq!(normalize_tag_name("AUTH"), Some("auth".to_string()));
    }

    #[test]
    fn test_normalize_hyphenates_whitespace() {
        assert_eq!(
            normalize_tag_name("api  design"),
            Some("api-design".to_string())
        );
        assert_eq!(
            normalize_tag_name("a\tb\nc"),
            Some("a-b-c".to_string())
        );
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_tag_name(""), None);
        assert_eq!(normalize_tag_name("   "), None);
    }

    #[test]
    fn test_normalize_keeps_existing_hyphens() {
        assert_eq!(
            normalize_tag_name("api-design"),
            Some("api-design".to_string())
        );
    }
}
