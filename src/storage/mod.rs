//! SQLite persistence layer.
//!
//! - WAL mode for concurrent reads
//! - IMMEDIATE transactions for atomic writes
//! - Component stores over the shared connection
//!
//! # Submodules
//!
//! - [`schema`] - DDL, seed data, FTS5 companion table
//! - [`migrations`] - embedded forward migrations
//! - [`sqlite`] - connection management and transaction discipline
//! - [`type_registry`] - registered item types
//! - [`status_registry`] - workflow statuses
//! - [`tag_store`] - normalized tags
//! - [`item_store`] - item CRUD and derived rows
//! - [`relation_graph`] - bidirectional links
//! - [`state_store`] - current-state singleton

pub mod item_store;
pub mod migrations;
pub mod relation_graph;
pub mod schema;
pub mod sqlite;
pub mod state_store;
pub mod status_registry;
pub mod tag_store;
pub mod type_registry;

pub use item_store::{ListFilter, NewItemRow, StatsReport};
pub use sqlite::SqliteStorage;
