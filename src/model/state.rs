//! The current-state singleton document.
//!
//! Exactly one exists at any time: a mutable "project state" document
//! describing the where-are-we of the knowledge base for the consuming
//! agent. No history is kept.

use serde::{Deserialize, Serialize};

/// The singleton project-state document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentState {
    pub content: String,

    /// Tag names (normalized on write).
    pub tags: Vec<String>,

    /// Pinned item ids; existence is validated on update and pruned
    /// when a pinned item is deleted.
    pub related: Vec<i64>,

    /// Unix milliseconds of the last update; 0 for the fresh default.
    pub updated_at: i64,

    /// Free-form caller tag.
    pub updated_by: Option<String>,
}
