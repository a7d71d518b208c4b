//! Item store: primary CRUD over the unified item table and its
//! derived side rows (keywords, concepts, embedding).
//!
//! Relation and FTS maintenance live in their own modules; the engine
//! sequences all of them inside one transaction per operation.

use std::collections::BTreeMap;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{ConceptEntry, Item, ItemSummary, KeywordEntry, Priority, normalize_tag_name};
use crate::storage::tag_store;

// ── Row types ─────────────────────────────────────────────────

/// Column values for a fresh item row.
#[derive(Debug, Clone)]
pub struct NewItemRow<'a> {
    pub item_type: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub content: Option<&'a str>,
    pub status_id: i64,
    pub priority: Priority,
    pub category: Option<&'a str>,
    pub start_date: Option<&'a str>,
    pub end_date: Option<&'a str>,
    pub version: Option<&'a str>,
}

/// Filter for `list_items`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListFilter {
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub types: Option<Vec<String>>,
    pub status: Option<String>,
    pub priority: Option<Priority>,
    /// All listed tags must be present (AND).
    pub tags: Vec<String>,
    /// Inclusive bounds on `startDate`.
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub include_closed_statuses: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListFilter {
    /// The union of `type` and `types`.
    #[must_use]
    pub fn all_types(&self) -> Vec<String> {
        let mut types = Vec::new();
        if let Some(t) = &self.item_type {
            types.push(t.clone());
        }
        if let Some(ts) = &self.types {
            for t in ts {
                if !types.contains(t) {
                    types.push(t.clone());
                }
            }
        }
        types
    }
}

/// Counts returned by `get_stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub total_items: i64,
    pub items_by_type: BTreeMap<String, i64>,
    pub items_by_status: BTreeMap<String, i64>,
    pub total_tags: i64,
    pub last_updated_at: Option<i64>,
}

// ── Row mapping ───────────────────────────────────────────────

const ITEM_COLUMNS: &str = "id, type, title, description, content, ai_summary, status_id, \
     priority, category, start_date, end_date, version, search_index, created_at, updated_at";

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    let priority: String = row.get(7)?;
    Ok(Item {
        id: row.get(0)?,
        item_type: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        content: row.get(4)?,
        ai_summary: row.get(5)?,
        status_id: row.get(6)?,
        priority: Priority::parse(&priority).unwrap_or_default(),
        category: row.get(8)?,
        start_date: row.get(9)?,
        end_date: row.get(10)?,
        version: row.get(11)?,
        search_index: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

// ── CRUD ──────────────────────────────────────────────────────

/// Insert a fresh item row and return its allocated id.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert(conn: &Connection, row: &NewItemRow<'_>, now: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO items (type, title, description, content, status_id, priority,
                            category, start_date, end_date, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        rusqlite::params![
            row.item_type,
            row.title,
            row.description,
            row.content,
            row.status_id,
            row.priority.as_str(),
            row.category,
            row.start_date,
            row.end_date,
            row.version,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Fetch an item row if present.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn try_get(conn: &Connection, id: i64) -> Result<Option<Item>> {
    let item = conn
        .prepare(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"))?
        .query_row([id], row_to_item)
        .optional()?;
    Ok(item)
}

/// Fetch an item row.
///
/// # Errors
///
/// Returns `NotFound` if absent.
pub fn get(conn: &Connection, id: i64) -> Result<Item> {
    try_get(conn, id)?.ok_or_else(|| Error::NotFound {
        entity: "item",
        key: id.to_string(),
    })
}

/// Whether an item row exists.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn exists(conn: &Connection, id: i64) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM items WHERE id = ?1",
        [id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Write back the editable columns of an item (not the derived ones).
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn update_row(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "UPDATE items SET type = ?2, title = ?3, description = ?4, content = ?5,
                          status_id = ?6, priority = ?7, category = ?8,
                          start_date = ?9, end_date = ?10, version = ?11,
                          updated_at = ?12
         WHERE id = ?1",
        rusqlite::params![
            item.id,
            item.item_type,
            item.title,
            item.description,
            item.content,
            item.status_id,
            item.priority.as_str(),
            item.category,
            item.start_date,
            item.end_date,
            item.version,
            item.updated_at,
        ],
    )?;
    Ok(())
}

/// Delete an item row. Side rows cascade.
///
/// # Errors
///
/// Returns `NotFound` if absent.
pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    let affected = conn.execute("DELETE FROM items WHERE id = ?1", [id])?;
    if affected == 0 {
        return Err(Error::NotFound {
            entity: "item",
            key: id.to_string(),
        });
    }
    Ok(())
}

// ── Derived fields ────────────────────────────────────────────

/// Write the enricher-derived columns of an item.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn write_derived(
    conn: &Connection,
    id: i64,
    ai_summary: Option<&str>,
    search_index: Option<&str>,
    embedding: Option<&[u8]>,
) -> Result<()> {
    conn.execute(
        "UPDATE items SET ai_summary = ?2, search_index = ?3, embedding = ?4 WHERE id = ?1",
        rusqlite::params![id, ai_summary, search_index, embedding],
    )?;
    Ok(())
}

/// Replace an item's keyword rows.
///
/// # Errors
///
/// Returns an error if a statement fails.
pub fn replace_keywords(conn: &Connection, id: i64, entries: &[(String, f64)]) -> Result<()> {
    replace_terms(conn, id, entries, "keywords", "item_keywords", "keyword_id", "word")
}

/// Replace an item's concept rows.
///
/// # Errors
///
/// Returns an error if a statement fails.
pub fn replace_concepts(conn: &Connection, id: i64, entries: &[(String, f64)]) -> Result<()> {
    replace_terms(conn, id, entries, "concepts", "item_concepts", "concept_id", "name")
}

fn replace_terms(
    conn: &Connection,
    id: i64,
    entries: &[(String, f64)],
    term_table: &str,
    link_table: &str,
    link_col: &str,
    term_col: &str,
) -> Result<()> {
    conn.execute(
        &format!("DELETE FROM {link_table} WHERE item_id = ?1"),
        [id],
    )?;

    let mut lookup = conn.prepare(&format!(
        "SELECT id FROM {term_table} WHERE {term_col} = ?1"
    ))?;
    let mut insert_term =
        conn.prepare(&format!("INSERT INTO {term_table} ({term_col}) VALUES (?1)"))?;
    let mut insert_link = conn.prepare(&format!(
        "INSERT OR REPLACE INTO {link_table} (item_id, {link_col}, weight) VALUES (?1, ?2, ?3)"
    ))?;

    for (term, weight) in entries {
        let existing: Option<i64> = lookup.query_row([term], |row| row.get(0)).optional()?;
        let term_id = match existing {
            Some(tid) => tid,
            None => {
                insert_term.execute([term])?;
                conn.last_insert_rowid()
            }
        };
        insert_link.execute(rusqlite::params![id, term_id, weight])?;
    }

    Ok(())
}

/// An item's keywords, heaviest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn keywords_of(conn: &Connection, id: i64) -> Result<Vec<KeywordEntry>> {
    let mut stmt = conn.prepare(
        "SELECT k.word, ik.weight FROM item_keywords ik
         JOIN keywords k ON ik.keyword_id = k.id
         WHERE ik.item_id = ?1
         ORDER BY ik.weight DESC, k.word",
    )?;
    let entries = stmt
        .query_map([id], |row| {
            Ok(KeywordEntry {
                word: row.get(0)?,
                weight: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

/// An item's concepts, heaviest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn concepts_of(conn: &Connection, id: i64) -> Result<Vec<ConceptEntry>> {
    let mut stmt = conn.prepare(
        "SELECT c.name, ic.weight FROM item_concepts ic
         JOIN concepts c ON ic.concept_id = c.id
         WHERE ic.item_id = ?1
         ORDER BY ic.weight DESC, c.name",
    )?;
    let entries = stmt
        .query_map([id], |row| {
            Ok(ConceptEntry {
                name: row.get(0)?,
                weight: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

/// An item's stored embedding blob, if enrichment produced one.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn embedding_of(conn: &Connection, id: i64) -> Result<Option<Vec<u8>>> {
    let blob: Option<Option<Vec<u8>>> = conn
        .prepare("SELECT embedding FROM items WHERE id = ?1")?
        .query_row([id], |row| row.get(0))
        .optional()?;
    Ok(blob.flatten())
}

/// All item ids, ascending.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn all_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM items ORDER BY id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

// ── Listing ───────────────────────────────────────────────────

/// List item summaries with structured filters.
///
/// Ordering is `updated_at DESC`. The closed-status exclusion applies
/// only when the filter names no explicit status.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list(conn: &Connection, filter: &ListFilter, limit: usize) -> Result<Vec<ItemSummary>> {
    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    let types = filter.all_types();
    if !types.is_empty() {
        let placeholders = push_in_clause(&mut params, &types);
        conditions.push(format!("i.type IN ({placeholders})"));
    }

    if let Some(status) = &filter.status {
        params.push(Value::from(status.clone()));
        conditions.push(format!("s.name = ?{} COLLATE NOCASE", params.len()));
    } else if !filter.include_closed_statuses {
        conditions.push("s.is_closable = 0".to_string());
    }

    if let Some(priority) = filter.priority {
        params.push(Value::from(priority.as_str().to_string()));
        conditions.push(format!("i.priority = ?{}", params.len()));
    }

    if let Some(start) = &filter.start_date {
        params.push(Value::from(start.clone()));
        conditions.push(format!("i.start_date >= ?{}", params.len()));
    }
    if let Some(end) = &filter.end_date {
        params.push(Value::from(end.clone()));
        conditions.push(format!("i.start_date <= ?{}", params.len()));
    }

    let normalized_tags: Vec<String> = filter
        .tags
        .iter()
        .filter_map(|t| normalize_tag_name(t))
        .collect();
    if !normalized_tags.is_empty() {
        let placeholders = push_in_clause(&mut params, &normalized_tags);
        params.push(Value::from(normalized_tags.len() as i64));
        conditions.push(format!(
            "i.id IN (SELECT it.item_id FROM item_tags it
                      JOIN tags t ON it.tag_id = t.id
                      WHERE t.name IN ({placeholders})
                      GROUP BY it.item_id
                      HAVING COUNT(DISTINCT t.name) = ?{})",
            params.len()
        ));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    params.push(Value::from(limit as i64));
    let limit_idx = params.len();
    params.push(Value::from(filter.offset.unwrap_or(0) as i64));
    let offset_idx = params.len();

    let sql = format!(
        "SELECT i.id, i.type, i.title, i.description, s.name, i.priority, i.updated_at
         FROM items i JOIN statuses s ON i.status_id = s.id{where_clause}
         ORDER BY i.updated_at DESC, i.id DESC
         LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), |row| {
            let priority: String = row.get(5)?;
            Ok(ItemSummary {
                id: row.get(0)?,
                item_type: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
                status: row.get(4)?,
                priority: Priority::parse(&priority).unwrap_or_default(),
                tags: Vec::new(),
                updated_at: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    attach_tags(conn, rows)
}

/// Fill in the tag names on a batch of summaries.
///
/// # Errors
///
/// Returns an error if a query fails.
pub fn attach_tags(conn: &Connection, mut rows: Vec<ItemSummary>) -> Result<Vec<ItemSummary>> {
    for row in &mut rows {
        row.tags = tag_store::tags_of_item(conn, row.id)?;
    }
    Ok(rows)
}

fn push_in_clause(params: &mut Vec<Value>, values: &[String]) -> String {
    let mut placeholders = Vec::with_capacity(values.len());
    for v in values {
        params.push(Value::from(v.clone()));
        placeholders.push(format!("?{}", params.len()));
    }
    placeholders.join(", ")
}

// ── Stats ─────────────────────────────────────────────────────

/// Counts per type and status, total tags, and the latest update.
///
/// # Errors
///
/// Returns an error if a query fails.
pub fn stats(conn: &Connection) -> Result<StatsReport> {
    let total_items: i64 =
        conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;

    let mut items_by_type = BTreeMap::new();
    let mut stmt = conn.prepare("SELECT type, COUNT(*) FROM items GROUP BY type")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (name, count) = row?;
        items_by_type.insert(name, count);
    }

    let mut items_by_status = BTreeMap::new();
    let mut stmt = conn.prepare(
        "SELECT s.name, COUNT(*) FROM items i
         JOIN statuses s ON i.status_id = s.id GROUP BY s.name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (name, count) = row?;
        items_by_status.insert(name, count);
    }

    let total_tags: i64 = conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?;
    let last_updated_at: Option<i64> =
        conn.query_row("SELECT MAX(updated_at) FROM items", [], |row| row.get(0))?;

    Ok(StatsReport {
        total_items,
        items_by_type,
        items_by_status,
        total_tags,
        last_updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    fn seed(conn: &Connection, item_type: &str, title: &str, status_id: i64) -> i64 {
        let row = NewItemRow {
            item_type,
            title,
            description: None,
            content: None,
            status_id,
            priority: Priority::Medium,
            category: None,
            start_date: None,
            end_date: None,
            version: None,
        };
        insert(conn, &row, chrono::Utc::now().timestamp_millis()).unwrap()
    }

    #[test]
    fn test_insert_allocates_monotonic_ids() {
        let storage = SqliteStorage::open_memory().unwrap();
        let a = seed(storage.conn(), "issues", "a", 1);
        let b = seed(storage.conn(), "issues", "b", 1);
        assert!(b > a);

        // Deleting the newest row must not recycle its id
        delete(storage.conn(), b).unwrap();
        let c = seed(storage.conn(), "issues", "c", 1);
        assert!(c > b);
    }

    #[test]
    fn test_get_roundtrip() {
        let storage = SqliteStorage::open_memory().unwrap();
        let id = seed(storage.conn(), "issues", "Login broken", 1);

        let item = get(storage.conn(), id).unwrap();
        assert_eq!(item.title, "Login broken");
        assert_eq!(item.item_type, "issues");
        assert_eq!(item.priority, Priority::Medium);
        assert_eq!(item.created_at, item.updated_at);

        assert!(matches!(
            get(storage.conn(), 9999),
            Err(Error::NotFound { entity: "item", .. })
        ));
    }

    #[test]
    fn test_derived_rows_replace() {
        let storage = SqliteStorage::open_memory().unwrap();
        let id = seed(storage.conn(), "issues", "x", 1);

        replace_keywords(
            storage.conn(),
            id,
            &[("login".to_string(), 1.0), ("auth".to_string(), 0.5)],
        )
        .unwrap();
        let kws = keywords_of(storage.conn(), id).unwrap();
        assert_eq!(kws.len(), 2);
        assert_eq!(kws[0].word, "login");

        replace_keywords(storage.conn(), id, &[("timeout".to_string(), 1.0)]).unwrap();
        let kws = keywords_of(storage.conn(), id).unwrap();
        assert_eq!(kws.len(), 1);
        assert_eq!(kws[0].word, "timeout");
    }

    #[test]
    fn test_cascade_on_delete() {
        let storage = SqliteStorage::open_memory().unwrap();
        let id = seed(storage.conn(), "issues", "x", 1);
        replace_keywords(storage.conn(), id, &[("w".to_string(), 1.0)]).unwrap();
        replace_concepts(storage.conn(), id, &[("testing".to_string(), 1.0)]).unwrap();

        delete(storage.conn(), id).unwrap();

        let orphans: i64 = storage
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM item_keywords WHERE item_id = ?1",
                [id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn test_list_excludes_closed_by_default() {
        let storage = SqliteStorage::open_memory().unwrap();
        let closed_id: i64 = storage
            .conn()
            .query_row("SELECT id FROM statuses WHERE name = 'Closed'", [], |r| {
                r.get(0)
            })
            .unwrap();
        seed(storage.conn(), "issues", "open one", 1);
        seed(storage.conn(), "issues", "closed one", closed_id);

        let rows = list(storage.conn(), &ListFilter::default(), 20).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "open one");

        let filter = ListFilter {
            include_closed_statuses: true,
            ..Default::default()
        };
        assert_eq!(list(storage.conn(), &filter, 20).unwrap().len(), 2);

        // An explicit status filter overrides the exclusion
        let filter = ListFilter {
            status: Some("Closed".to_string()),
            ..Default::default()
        };
        let rows = list(storage.conn(), &filter, 20).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "closed one");
    }

    #[test]
    fn test_list_tags_are_anded() {
        let storage = SqliteStorage::open_memory().unwrap();
        let a = seed(storage.conn(), "issues", "a", 1);
        let b = seed(storage.conn(), "issues", "b", 1);

        let both = tag_store::resolve_or_create(
            storage.conn(),
            &["bug".to_string(), "auth".to_string()],
        )
        .unwrap();
        tag_store::set_item_tags(storage.conn(), a, &both).unwrap();
        tag_store::set_item_tags(storage.conn(), b, &both[..1]).unwrap();

        let filter = ListFilter {
            tags: vec!["bug".to_string(), "auth".to_string()],
            ..Default::default()
        };
        let rows = list(storage.conn(), &filter, 20).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, a);
    }

    #[test]
    fn test_stats() {
        let storage = SqliteStorage::open_memory().unwrap();
        seed(storage.conn(), "issues", "a", 1);
        seed(storage.conn(), "docs", "b", 1);
        tag_store::create(storage.conn(), "t1").unwrap();

        let report = stats(storage.conn()).unwrap();
        assert_eq!(report.total_items, 2);
        assert_eq!(report.items_by_type.get("issues"), Some(&1));
        assert_eq!(report.items_by_status.get("Open"), Some(&2));
        assert_eq!(report.total_tags, 1);
        assert!(report.last_updated_at.is_some());
    }
}
