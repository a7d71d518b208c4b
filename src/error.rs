//! Error types for the knowledge-base engine.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Retryability flags for agent self-correction
//! - Per-field validation breakdowns (`FieldError`)
//! - Structured JSON output for the transport layer
//!
//! Messages never expose filesystem paths; the transport maps these
//! kinds into its own code space.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes.
///
/// Each code maps to a SCREAMING_SNAKE string. Agents match on the
/// string; the transport maps it to its own wire code space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    AlreadyExists,
    ValidationError,
    InUse,
    InvalidRelation,
    InvalidQuery,
    Busy,
    Timeout,
    IntegrityError,
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InUse => "IN_USE",
            Self::InvalidRelation => "INVALID_RELATION",
            Self::InvalidQuery => "INVALID_QUERY",
            Self::Busy => "BUSY",
            Self::Timeout => "TIMEOUT",
            Self::IntegrityError => "INTEGRITY_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether an agent should retry with corrected input.
    ///
    /// True for validation and query errors (fix the input and retry)
    /// and for `Busy` (back off and retry). False for not-found,
    /// integrity, and internal errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ValidationError | Self::InvalidQuery | Self::Busy
        )
    }
}

// ── Field errors ──────────────────────────────────────────────

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// The offending field name as it appears on the wire.
    pub field: String,
    /// Human-readable reason (unknown-field, regex-mismatch, length,
    /// enum, date-order, date-format).
    pub reason: String,
}

impl FieldError {
    /// Create a field error.
    #[must_use]
    pub fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors surfaced by the engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity kind: item, status, tag, type, relation, tool.
        entity: &'static str,
        key: String,
    },

    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("{entity} is in use by {by}")]
    InUse { entity: &'static str, by: String },

    #[error("invalid relation: {0}")]
    InvalidRelation(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("enricher queue is full")]
    Busy,

    #[error("operation timed out: {op}")]
    Timeout { op: String },

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for a single-field validation error.
    #[must_use]
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, reason)])
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::InUse { .. } => ErrorCode::InUse,
            Self::InvalidRelation(_) => ErrorCode::InvalidRelation,
            Self::InvalidQuery(_) => ErrorCode::InvalidQuery,
            Self::Busy => ErrorCode::Busy,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Integrity(_) => ErrorCode::IntegrityError,
            Self::Database(_) | Self::Json(_) | Self::Io(_) | Self::Internal(_) => {
                ErrorCode::InternalError
            }
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, and retryability. Validation
    /// errors additionally carry the per-field breakdown under
    /// `details`. Agents parse this instead of display text.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
            }
        });

        if let Self::Validation(fields) = self {
            obj["error"]["details"] =
                serde_json::to_value(fields).unwrap_or(serde_json::Value::Null);
        }

        obj
    }
}
