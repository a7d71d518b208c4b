//! Relation graph: bidirectional `related` links between items.
//!
//! Edges are stored as paired directed rows, so `(a,b)` always
//! coexists with `(b,a)`. Pairs are created and deleted inside the
//! caller's transaction, keeping the symmetry invariant atomic.

use rusqlite::Connection;

use crate::error::{Error, Result};

fn assert_item_exists(conn: &Connection, id: i64) -> Result<()> {
    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM items WHERE id = ?1",
        [id],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(Error::InvalidRelation(format!(
            "target item does not exist: {id}"
        )));
    }
    Ok(())
}

/// Add the bidirectional relation between `a` and `b`.
///
/// Adding an existing relation is a no-op.
///
/// # Errors
///
/// Returns `InvalidRelation` for self-edges or dangling endpoints.
pub fn add_relation(conn: &Connection, a: i64, b: i64) -> Result<()> {
    if a == b {
        return Err(Error::InvalidRelation(format!(
            "self-relation not allowed: {a}"
        )));
    }
    assert_item_exists(conn, a)?;
    assert_item_exists(conn, b)?;

    let now = chrono::Utc::now().timestamp_millis();
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO item_relations (source_id, target_id, created_at)
         VALUES (?1, ?2, ?3)",
    )?;
    stmt.execute(rusqlite::params![a, b, now])?;
    stmt.execute(rusqlite::params![b, a, now])?;

    Ok(())
}

/// Remove the bidirectional relation between `a` and `b`.
///
/// Removing an absent relation is a no-op.
///
/// # Errors
///
/// Returns an error if a statement fails.
pub fn remove_relation(conn: &Connection, a: i64, b: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM item_relations
         WHERE (source_id = ?1 AND target_id = ?2)
            OR (source_id = ?2 AND target_id = ?1)",
        rusqlite::params![a, b],
    )?;
    Ok(())
}

/// Ids related to `id`, ascending.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn relations_of(conn: &Connection, id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT target_id FROM item_relations WHERE source_id = ?1 ORDER BY target_id",
    )?;
    let ids = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

/// Replace the full relation set of `id` with `targets`.
///
/// Computes the diff against the current set and applies adds and
/// removes pairwise.
///
/// # Errors
///
/// Returns `InvalidRelation` for self-edges or dangling targets.
pub fn replace_relations(conn: &Connection, id: i64, targets: &[i64]) -> Result<()> {
    use std::collections::BTreeSet;

    let current: BTreeSet<i64> = relations_of(conn, id)?.into_iter().collect();
    let wanted: BTreeSet<i64> = targets.iter().copied().collect();

    for &gone in current.difference(&wanted) {
        remove_relation(conn, id, gone)?;
    }
    for &added in wanted.difference(&current) {
        add_relation(conn, id, added)?;
    }

    Ok(())
}

/// Remove every edge touching `id`.
///
/// Called from the item store before the item row vanishes; the FK
/// cascade would handle rows where `id` is an endpoint, but doing it
/// explicitly keeps deletion observable regardless of pragma state.
///
/// # Errors
///
/// Returns an error if the statement fails.
pub fn on_item_delete(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM item_relations WHERE source_id = ?1 OR target_id = ?1",
        [id],
    )?;
    Ok(())
}

/// Verify pairing symmetry over the whole table.
///
/// Returns descriptions of asymmetric edges; empty means healthy.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn find_asymmetric_edges(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT r.source_id, r.target_id FROM item_relations r
         WHERE NOT EXISTS (
             SELECT 1 FROM item_relations m
             WHERE m.source_id = r.target_id AND m.target_id = r.source_id
         )",
    )?;
    let violations = stmt
        .query_map([], |row| {
            let a: i64 = row.get(0)?;
            let b: i64 = row.get(1)?;
            Ok(format!("relation ({a},{b}) has no mirror"))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(violations)
}
