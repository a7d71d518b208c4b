//! Database schema definitions.
//!
//! The complete SQLite schema for the knowledge base: the unified item
//! table with its side tables, the FTS5 companion index, and the seed
//! data for statuses and default types.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema.
///
/// Timestamps are stored as INTEGER Unix milliseconds. The status seed
/// writes `is_closable` as integer literals; a driver-level boolean
/// binding must never be trusted for this column (see
/// `migrations/001_fix_closable_statuses.sql`).
pub const SCHEMA_SQL: &str = r#"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Registries
-- ====================

CREATE TABLE IF NOT EXISTS statuses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    sort_order INTEGER NOT NULL,
    is_closable INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS type_definitions (
    name TEXT PRIMARY KEY,
    base_type TEXT NOT NULL CHECK (base_type IN ('tasks', 'documents')),
    description TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

-- ====================
-- Items
-- ====================

-- The unified item table. AUTOINCREMENT keeps deleted ids retired.
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type TEXT NOT NULL REFERENCES type_definitions(name),
    title TEXT NOT NULL,
    description TEXT,
    content TEXT,
    ai_summary TEXT,
    status_id INTEGER NOT NULL REFERENCES statuses(id),
    priority TEXT NOT NULL DEFAULT 'MEDIUM'
        CHECK (priority IN ('CRITICAL', 'HIGH', 'MEDIUM', 'LOW', 'MINIMAL')),
    category TEXT,
    start_date TEXT,
    end_date TEXT,
    version TEXT,
    search_index TEXT,
    embedding BLOB,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_type ON items(type);
CREATE INDEX IF NOT EXISTS idx_items_status ON items(status_id);
CREATE INDEX IF NOT EXISTS idx_items_priority ON items(priority);
CREATE INDEX IF NOT EXISTS idx_items_updated ON items(updated_at DESC);
CREATE INDEX IF NOT EXISTS idx_items_start_date ON items(start_date);

-- Item <-> Tag link table; position preserves input order.
CREATE TABLE IF NOT EXISTS item_tags (
    item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id),
    position INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (item_id, tag_id)
);

CREATE INDEX IF NOT EXISTS idx_item_tags_tag ON item_tags(tag_id);

-- ====================
-- Derived terms (enricher output)
-- ====================

CREATE TABLE IF NOT EXISTS keywords (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    word TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS item_keywords (
    item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    keyword_id INTEGER NOT NULL REFERENCES keywords(id),
    weight REAL NOT NULL,
    PRIMARY KEY (item_id, keyword_id)
);

CREATE INDEX IF NOT EXISTS idx_item_keywords_keyword ON item_keywords(keyword_id);

CREATE TABLE IF NOT EXISTS concepts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS item_concepts (
    item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    concept_id INTEGER NOT NULL REFERENCES concepts(id),
    weight REAL NOT NULL,
    PRIMARY KEY (item_id, concept_id)
);

CREATE INDEX IF NOT EXISTS idx_item_concepts_concept ON item_concepts(concept_id);

-- ====================
-- Relations
-- ====================

-- Undirected semantics via paired rows: (a,b) always coexists with (b,a).
CREATE TABLE IF NOT EXISTS item_relations (
    source_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    target_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (source_id, target_id),
    CHECK (source_id <> target_id)
);

CREATE INDEX IF NOT EXISTS idx_item_relations_target ON item_relations(target_id);

-- ====================
-- Current State Singleton
-- ====================

CREATE TABLE IF NOT EXISTS current_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    content TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT '[]',
    related TEXT NOT NULL DEFAULT '[]',
    updated_at INTEGER NOT NULL DEFAULT 0,
    updated_by TEXT
);

INSERT OR IGNORE INTO current_state (id) VALUES (1);

-- ====================
-- Full-Text Search
-- ====================

-- Companion index, rowid = item id. Maintained explicitly on the
-- item write path so it commits with the row it mirrors.
CREATE VIRTUAL TABLE IF NOT EXISTS items_fts USING fts5(
    title,
    description,
    content,
    tags,
    tokenize='porter unicode61'
);

-- ====================
-- Seed Data
-- ====================

-- is_closable is written as integer literals on purpose; see
-- migrations/001_fix_closable_statuses.sql.
INSERT OR IGNORE INTO statuses (name, sort_order, is_closable) VALUES
    ('Open', 1, 0),
    ('Specification', 2, 0),
    ('Waiting', 3, 0),
    ('Ready', 4, 0),
    ('In Progress', 5, 0),
    ('Review', 6, 0),
    ('Testing', 7, 0),
    ('Pending', 8, 0),
    ('Completed', 9, 1),
    ('Closed', 10, 1),
    ('Canceled', 11, 1),
    ('Rejected', 12, 1);

INSERT OR IGNORE INTO type_definitions (name, base_type, description, created_at) VALUES
    ('issues', 'tasks', 'Bugs and work items', 0),
    ('plans', 'tasks', 'Implementation plans with date ranges', 0),
    ('docs', 'documents', 'Reference documentation', 0),
    ('knowledge', 'documents', 'Reusable knowledge entries', 0),
    ('sessions', 'documents', 'Work session records', 0),
    ('decisions', 'documents', 'Recorded decisions', 0);
"#;

/// Apply the schema to the database.
///
/// Runs the entire DDL script via `execute_batch`; idempotent because
/// all statements use `IF NOT EXISTS` / `OR IGNORE`. Pending
/// migrations run afterwards.
///
/// # Errors
///
/// Returns an error if SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    super::migrations::run_migrations(conn)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}
