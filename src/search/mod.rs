//! Search subsystem: query parsing, FTS, execution, and semantic
//! neighborhoods.
//!
//! # Submodules
//!
//! - [`query`] - structured query parser
//! - [`fts`] - FTS5 index maintenance and matching
//! - [`executor`] - relational search execution and grouping
//! - [`related`] - keyword/concept/embedding/hybrid related items

pub mod executor;
pub mod fts;
pub mod query;
pub mod related;

pub use query::{ParsedQuery, ScopeField, parse};
pub use related::{RelatedStrategy, ScoredItem};
