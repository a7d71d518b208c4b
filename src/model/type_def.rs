//! Registered item types and their field schemas.
//!
//! Every item type is backed by one of two base types (`tasks`,
//! `documents`); the base type fixes the set of fields accepted on
//! create/update. User-registered types add vocabulary, not schema.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// Type names that can never be registered or removed as item types.
pub const RESERVED_TYPE_NAMES: &[&str] = &["tasks", "documents"];

/// Maximum length of a type name.
pub const MAX_TYPE_NAME_LEN: usize = 50;

// ── Base types ────────────────────────────────────────────────

/// The two built-in categories that fix a type's field schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseType {
    Tasks,
    Documents,
}

impl BaseType {
    /// Storage/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Documents => "documents",
        }
    }

    /// Parse a base type name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tasks" => Some(Self::Tasks),
            "documents" => Some(Self::Documents),
            _ => None,
        }
    }
}

impl std::fmt::Display for BaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Type definitions ──────────────────────────────────────────

/// A registered item type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefinition {
    pub name: String,
    pub base_type: BaseType,
    pub description: Option<String>,
}

/// Types seeded at initialization: `(name, base, description)`.
pub const DEFAULT_TYPES: &[(&str, BaseType, &str)] = &[
    ("issues", BaseType::Tasks, "Bugs and work items"),
    ("plans", BaseType::Tasks, "Implementation plans with date ranges"),
    ("docs", BaseType::Documents, "Reference documentation"),
    ("knowledge", BaseType::Documents, "Reusable knowledge entries"),
    ("sessions", BaseType::Documents, "Work session records"),
    ("decisions", BaseType::Documents, "Recorded decisions"),
];

/// Validate a type name against `^[a-z][a-z0-9_]*$` with length 1-50.
pub fn validate_type_name(name: &str) -> Result<(), FieldError> {
    if name.is_empty() || name.len() > MAX_TYPE_NAME_LEN {
        return Err(FieldError::new("type", "must be 1-50 characters"));
    }

    let mut chars = name.chars();
    let first = chars.next().unwrap_or(' ');
    if !first.is_ascii_lowercase() {
        return Err(FieldError::new(
            "type",
            "must match ^[a-z][a-z0-9_]*$",
        ));
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return Err(FieldError::new(
            "type",
            "must match ^[a-z][a-z0-9_]*$",
        ));
    }

    Ok(())
}

// ── Field schemas ─────────────────────────────────────────────

/// The set of wire fields accepted for items of a given type.
///
/// Resolved per type name from the base type: the common fields plus
/// the base-specific ones. Write validation rejects anything outside
/// this set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    allowed: BTreeSet<&'static str>,
}

/// Fields accepted for every type.
const COMMON_FIELDS: &[&str] = &[
    "id",
    "type",
    "title",
    "description",
    "category",
    "version",
    "tags",
    "related",
    "createdAt",
    "updatedAt",
];

/// Additional fields for `tasks`-based types.
const TASKS_FIELDS: &[&str] = &["content", "priority", "status", "statusId", "startDate", "endDate"];

/// Additional fields for `documents`-based types.
const DOCUMENTS_FIELDS: &[&str] = &["content", "priority", "status", "statusId"];

impl FieldSchema {
    /// Resolve the schema for a base type.
    #[must_use]
    pub fn for_base(base: BaseType) -> Self {
        let extra = match base {
            BaseType::Tasks => TASKS_FIELDS,
            BaseType::Documents => DOCUMENTS_FIELDS,
        };
        Self {
            allowed: COMMON_FIELDS.iter().chain(extra).copied().collect(),
        }
    }

    /// Whether a wire field is accepted by this schema.
    #[must_use]
    pub fn allows(&self, field: &str) -> bool {
        self.allowed.contains(field)
    }

    /// The accepted wire fields, sorted.
    #[must_use]
    pub fn fields(&self) -> Vec<&'static str> {
        self.allowed.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_type_name() {
        assert!(validate_type_name("issues").is_ok());
        assert!(validate_type_name("a").is_ok());
        assert!(validate_type_name("bug_reports2").is_ok());

        assert!(validate_type_name("").is_err());
        assert!(validate_type_name("2issues").is_err());
        assert!(validate_type_name("Issues").is_err());
        assert!(validate_type_name("bad-name").is_err());
        assert!(validate_type_name(&"a".repeat(51)).is_err());
    }

    #[test]
    fn test_tasks_schema_allows_dates() {
        let schema = FieldSchema::for_base(BaseType::Tasks);
        assert!(schema.allows("startDate"));
        assert!(schema.allows("endDate"));
        assert!(schema.allows("content"));
        assert!(schema.allows("tags"));
        assert!(!schema.allows("embedding"));
    }

    #[test]
    fn test_documents_schema_rejects_dates() {
        let schema = FieldSchema::for_base(BaseType::Documents);
        assert!(!schema.allows("startDate"));
        assert!(!schema.allows("endDate"));
        assert!(schema.allows("content"));
        assert!(schema.allows("priority"));
    }

    #[test]
    fn test_base_type_roundtrip() {
        assert_eq!(BaseType::parse("tasks"), Some(BaseType::Tasks));
        assert_eq!(BaseType::parse("documents"), Some(BaseType::Documents));
        assert_eq!(BaseType::parse("Tasks"), None);
    }

    #[test]
    fn test_default_types_are_valid_names() {
        for (name, _, _) in DEFAULT_TYPES {
            assert!(validate_type_name(name).is_ok(), "bad seed name: {name}");
            assert!(!RESERVED_TYPE_NAMES.contains(name));
        }
    }
}
