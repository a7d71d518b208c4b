//! Structured query parser.
//!
//! Accepts `key:value` filter terms (`status`, `type`, `is`,
//! `priority`), field-scoped full-text terms (`title:`, `description:`,
//! `content:`, `tags:`), quoted values, and bare words. Bare words are
//! AND-combined keyword terms; filters OR within a key and AND across
//! keys. Unknown `key:value` tokens are kept as plain terms. Negation
//! (`-key:value`) is rejected as unsupported.

use crate::error::{Error, Result};
use crate::model::Priority;

/// A full-text scope column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeField {
    Title,
    Description,
    Content,
    Tags,
}

impl ScopeField {
    /// The FTS column name.
    #[must_use]
    pub const fn column(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::Content => "content",
            Self::Tags => "tags",
        }
    }

    fn parse(key: &str) -> Option<Self> {
        match key {
            "title" => Some(Self::Title),
            "description" => Some(Self::Description),
            "content" => Some(Self::Content),
            "tags" => Some(Self::Tags),
            _ => None,
        }
    }
}

/// The parsed form of a query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    /// Status names; OR within the key, matched case-insensitively.
    pub statuses: Vec<String>,
    /// Type names; OR within the key.
    pub types: Vec<String>,
    /// Priorities; OR within the key.
    pub priorities: Vec<Priority>,
    /// `is:open` => `Some(false)`, `is:closed` => `Some(true)`.
    pub is_closed: Option<bool>,
    /// Bare words, AND-combined over title/description/content.
    pub terms: Vec<String>,
    /// Field-scoped full-text terms.
    pub scoped_terms: Vec<(ScopeField, String)>,
    /// Raw query for legacy substring search when nothing parsed.
    pub fallback: Option<String>,
}

impl ParsedQuery {
    /// Whether any structured filter is present.
    #[must_use]
    pub fn has_filters(&self) -> bool {
        !self.statuses.is_empty()
            || !self.types.is_empty()
            || !self.priorities.is_empty()
            || self.is_closed.is_some()
    }
}

/// Split a query into whitespace-separated tokens, honoring quotes.
///
/// Quoted regions keep their spaces and drop the quote characters:
/// `tags:"two words"` lexes to one token `tags:two words`.
fn lex(query: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = query.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                // Consume until the closing quote; an unclosed quote
                // runs to the end of the query.
                for n in chars.by_ref() {
                    if n == '"' {
                        break;
                    }
                    current.push(n);
                }
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// Parse a query string.
///
/// # Errors
///
/// Returns `InvalidQuery` for negation tokens, empty filter values,
/// unknown `is:` values, and unknown priority levels.
pub fn parse(query: &str) -> Result<ParsedQuery> {
    let mut parsed = ParsedQuery::default();
    let tokens = lex(query);

    for token in &tokens {
        if token.starts_with('-') && token.contains(':') {
            return Err(Error::InvalidQuery(
                "negation is not supported".to_string(),
            ));
        }

        let Some((key, value)) = token.split_once(':') else {
            parsed.terms.push(token.clone());
            continue;
        };

        let key_lower = key.to_lowercase();
        match key_lower.as_str() {
            "status" | "type" | "is" | "priority" if value.is_empty() => {
                return Err(Error::InvalidQuery(format!("empty value for {key_lower}:")));
            }
            "status" => parsed.statuses.push(value.to_string()),
            "type" => parsed.types.push(value.to_string()),
            "is" => match value.to_lowercase().as_str() {
                "open" => parsed.is_closed = Some(false),
                "closed" => parsed.is_closed = Some(true),
                other => {
                    return Err(Error::InvalidQuery(format!(
                        "is: accepts open or closed, got {other}"
                    )));
                }
            },
            "priority" => match Priority::parse(value) {
                Some(p) => parsed.priorities.push(p),
                None => {
                    return Err(Error::InvalidQuery(format!(
                        "unknown priority level: {value}"
                    )));
                }
            },
            _ => match ScopeField::parse(&key_lower) {
                Some(field) if !value.is_empty() => {
                    parsed.scoped_terms.push((field, value.to_string()));
                }
                // Unknown key or empty scoped value: keep the whole
                // token as a plain term (agents paste arbitrary text)
                _ => parsed.terms.push(token.clone()),
            },
        }
    }

    if tokens.is_empty() && !query.trim().is_empty() {
        parsed.fallback = Some(query.trim().to_string());
    }

    Ok(parsed)
}
