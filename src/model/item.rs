//! The universal item record and its projections.
//!
//! Items carry free-form content plus metadata (tags, status, priority,
//! dates, relations) and the derived fields produced by the enricher
//! (summary, keywords, concepts, search index, embedding). Timestamps
//! are Unix milliseconds.

use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 255;

// ── Priority ──────────────────────────────────────────────────

/// Item priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
    Minimal,
}

impl Priority {
    /// Storage/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Minimal => "MINIMAL",
        }
    }

    /// Parse a priority, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CRITICAL" => Some(Self::Critical),
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            "MINIMAL" => Some(Self::Minimal),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Item ──────────────────────────────────────────────────────

/// The universal record stored by the engine.
///
/// The quantized embedding blob is not part of this struct; it is
/// fetched separately by the search layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Monotonic positive integer, never reused.
    pub id: i64,

    /// Registered type name (`^[a-z][a-z0-9_]*$`).
    #[serde(rename = "type")]
    pub item_type: String,

    /// 1-255 character non-empty title.
    pub title: String,

    /// Optional short list-view summary.
    pub description: Option<String>,

    /// Optional long text payload.
    pub content: Option<String>,

    /// Enricher-produced summary (<= 500 chars).
    pub ai_summary: Option<String>,

    /// Foreign key into the status registry.
    pub status_id: i64,

    pub priority: Priority,

    /// Optional free-form category.
    pub category: Option<String>,

    /// Optional `YYYY-MM-DD`; when both are set, start <= end.
    pub start_date: Option<String>,
    pub end_date: Option<String>,

    /// Optional free-form version string.
    pub version: Option<String>,

    /// Derived space-separated tokenized keywords.
    pub search_index: Option<String>,

    /// Unix milliseconds.
    pub created_at: i64,
    /// Unix milliseconds; always >= `created_at`.
    pub updated_at: i64,
}

/// A keyword with its per-item weight in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub word: String,
    pub weight: f64,
}

/// A concept label with its per-item confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptEntry {
    pub name: String,
    pub weight: f64,
}

/// Full item view returned by `get_item` and the write operations:
/// the row plus resolved status name, tag names, derived term lists,
/// and related item ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: Item,

    /// Resolved status name.
    pub status: String,

    /// Tag names in insertion order.
    pub tags: Vec<String>,

    pub keywords: Vec<KeywordEntry>,
    pub concepts: Vec<ConceptEntry>,

    /// Ids of related items.
    pub related: Vec<i64>,
}

/// Lightweight projection returned by `list_items` and search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub id: i64,
    #[serde(rename = "type")]
    pub item_type: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub updated_at: i64,
}

// ── Field validation ──────────────────────────────────────────

/// Validate a title: non-empty after trimming, at most 255 chars.
pub fn validate_title(title: &str) -> Result<(), FieldError> {
    if title.trim().is_empty() {
        return Err(FieldError::new("title", "must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(FieldError::new("title", "must be 1-255 characters"));
    }
    Ok(())
}

/// Validate a `YYYY-MM-DD` date string.
pub fn validate_date(field: &str, value: &str) -> Result<(), FieldError> {
    match chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(_) => Ok(()),
        Err(_) => Err(FieldError::new(field, "expected YYYY-MM-DD")),
    }
}
