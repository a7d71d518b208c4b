//! Search execution: parsed query -> relational query + FTS match.
//!
//! Filters become predicates over the item/status join; bare and
//! scoped terms become one FTS MATCH subquery. Results are always
//! ordered `updated_at DESC`.

use std::collections::BTreeMap;

use rusqlite::Connection;
use rusqlite::types::Value;

use crate::error::Result;
use crate::model::{ItemSummary, Priority, normalize_tag_name};
use crate::storage::item_store;

use super::fts;
use super::query::ParsedQuery;

/// Execute a parsed search query.
///
/// `extra_types` (the `types` call parameter) further restricts any
/// `type:` tokens in the query.
///
/// # Errors
///
/// Returns an error if a query fails.
pub fn search_items(
    conn: &Connection,
    parsed: &ParsedQuery,
    extra_types: Option<&[String]>,
    limit: usize,
    offset: usize,
) -> Result<Vec<ItemSummary>> {
    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    if !parsed.types.is_empty() {
        let placeholders = push_values(&mut params, &parsed.types);
        conditions.push(format!("i.type IN ({placeholders})"));
    }
    if let Some(types) = extra_types {
        if !types.is_empty() {
            let placeholders = push_values(&mut params, types);
            conditions.push(format!("i.type IN ({placeholders})"));
        }
    }

    if !parsed.statuses.is_empty() {
        let lowered: Vec<String> = parsed.statuses.iter().map(|s| s.to_lowercase()).collect();
        let placeholders = push_values(&mut params, &lowered);
        conditions.push(format!("LOWER(s.name) IN ({placeholders})"));
    }

    if let Some(closed) = parsed.is_closed {
        conditions.push(format!(
            "s.is_closable = {}",
            if closed { 1 } else { 0 }
        ));
    }

    if !parsed.priorities.is_empty() {
        let names: Vec<String> = parsed
            .priorities
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();
        let placeholders = push_values(&mut params, &names);
        conditions.push(format!("i.priority IN ({placeholders})"));
    }

    if let Some(match_expr) = fts::build_match_expr(&parsed.terms, &parsed.scoped_terms) {
        params.push(Value::from(match_expr));
        conditions.push(format!(
            "i.id IN (SELECT rowid FROM items_fts WHERE items_fts MATCH ?{})",
            params.len()
        ));
    } else if let Some(raw) = &parsed.fallback {
        // Legacy substring search over the text columns
        params.push(Value::from(format!("%{raw}%")));
        let idx = params.len();
        conditions.push(format!(
            "(i.title LIKE ?{idx} COLLATE NOCASE
              OR i.description LIKE ?{idx} COLLATE NOCASE
              OR i.content LIKE ?{idx} COLLATE NOCASE)"
        ));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    params.push(Value::from(limit as i64));
    let limit_idx = params.len();
    params.push(Value::from(offset as i64));
    let offset_idx = params.len();

    let sql = format!(
        "SELECT i.id, i.type, i.title, i.description, s.name, i.priority, i.updated_at
         FROM items i JOIN statuses s ON i.status_id = s.id{where_clause}
         ORDER BY i.updated_at DESC, i.id DESC
         LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), row_to_summary)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    item_store::attach_tags(conn, rows)
}

/// Items carrying a tag, grouped by type, newest first within each
/// group.
///
/// # Errors
///
/// Returns an error if a query fails.
pub fn search_by_tag(
    conn: &Connection,
    tag: &str,
    types: Option<&[String]>,
) -> Result<BTreeMap<String, Vec<ItemSummary>>> {
    let Some(normalized) = normalize_tag_name(tag) else {
        return Ok(BTreeMap::new());
    };

    let mut params: Vec<Value> = vec![Value::from(normalized)];
    let mut sql = "SELECT i.id, i.type, i.title, i.description, s.name, i.priority, i.updated_at
         FROM items i
         JOIN statuses s ON i.status_id = s.id
         JOIN item_tags it ON it.item_id = i.id
         JOIN tags t ON it.tag_id = t.id
         WHERE t.name = ?1"
        .to_string();

    if let Some(types) = types {
        if !types.is_empty() {
            let placeholders = push_values(&mut params, types);
            sql.push_str(&format!(" AND i.type IN ({placeholders})"));
        }
    }
    sql.push_str(" ORDER BY i.updated_at DESC, i.id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), row_to_summary)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let rows = item_store::attach_tags(conn, rows)?;

    let mut grouped: BTreeMap<String, Vec<ItemSummary>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.item_type.clone()).or_default().push(row);
    }
    Ok(grouped)
}

/// Summaries for an id list, preserving the given order.
///
/// Ids that vanished between scoring and fetching are skipped.
///
/// # Errors
///
/// Returns an error if a query fails.
pub fn summaries_for_ids(conn: &Connection, ids: &[i64]) -> Result<Vec<ItemSummary>> {
    let mut stmt = conn.prepare(
        "SELECT i.id, i.type, i.title, i.description, s.name, i.priority, i.updated_at
         FROM items i JOIN statuses s ON i.status_id = s.id
         WHERE i.id = ?1",
    )?;

    let mut rows = Vec::with_capacity(ids.len());
    for &id in ids {
        if let Some(row) = stmt
            .query_row([id], row_to_summary)
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?
        {
            rows.push(row);
        }
    }

    item_store::attach_tags(conn, rows)
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<ItemSummary> {
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
}

fn push_values(params: &mut Vec<Value>, values: &[String]) -> String {
    let mut placeholders = Vec::with_capacity(values.len());
    for v in values {
        params.push(Value::from(v.clone()));
        placeholders.push(format!("?{}", params.len()));
    }
    placeholders.join(", ")
}
