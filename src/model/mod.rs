//! Data types for the knowledge base.
//!
//! - [`item`] - the universal `Item` record, priority enum, projections
//! - [`status`] - workflow statuses and the seeded 12-status set
//! - [`tag`] - normalized tags
//! - [`type_def`] - registered item types, base types, field schemas
//! - [`state`] - the current-state singleton document

pub mod item;
pub mod state;
pub mod status;
pub mod tag;
pub mod type_def;

pub use item::{
    ConceptEntry, Item, ItemDetail, ItemSummary, KeywordEntry, Priority, validate_date,
    validate_title,
};
pub use state::CurrentState;
pub use status::{DEFAULT_STATUSES, Status};
pub use tag::{Tag, normalize_tag_name};
pub use type_def::{
    BaseType, DEFAULT_TYPES, FieldSchema, RESERVED_TYPE_NAMES, TypeDefinition, validate_type_name,
};
