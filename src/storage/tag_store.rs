//! Tag store: normalized tag table and item associations.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::model::{Tag, normalize_tag_name};

/// Resolve tag names to ids, creating missing tags.
///
/// Names are normalized (lowercase, hyphens); duplicates after
/// normalization collapse to one id. The returned ids preserve input
/// order.
///
/// # Errors
///
/// Returns an error if a query fails.
pub fn resolve_or_create(conn: &Connection, names: &[String]) -> Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(names.len());
    let mut seen = std::collections::HashSet::new();

    for raw in names {
        let Some(name) = normalize_tag_name(raw) else {
            continue;
        };
        if !seen.insert(name.clone()) {
            continue;
        }

        let existing: Option<i64> = conn
            .prepare("SELECT id FROM tags WHERE name = ?1")?
            .query_row([&name], |row| row.get(0))
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                conn.execute("INSERT INTO tags (name) VALUES (?1)", [&name])?;
                conn.last_insert_rowid()
            }
        };
        ids.push(id);
    }

    Ok(ids)
}

/// Create a single tag, failing if it already exists.
///
/// # Errors
///
/// - `Validation` if the name normalizes to nothing.
/// - `AlreadyExists` if the normalized name is taken.
pub fn create(conn: &Connection, name: &str) -> Result<Tag> {
    let Some(normalized) = normalize_tag_name(name) else {
        return Err(Error::validation("tag", "must not be empty"));
    };

    if get_by_name(conn, &normalized)?.is_some() {
        return Err(Error::AlreadyExists {
            entity: "tag",
            key: normalized,
        });
    }

    conn.execute("INSERT INTO tags (name) VALUES (?1)", [&normalized])?;
    Ok(Tag {
        id: conn.last_insert_rowid(),
        name: normalized,
    })
}

/// Look up a tag by normalized name.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<Tag>> {
    let tag = conn
        .prepare("SELECT id, name FROM tags WHERE name = ?1")?
        .query_row([name], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })
        .optional()?;
    Ok(tag)
}

/// List all tags alphabetically.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list(conn: &Connection) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare("SELECT id, name FROM tags ORDER BY name")?;
    let tags = stmt
        .query_map([], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tags)
}

/// Case-insensitive substring search over tag names.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn search_by_pattern(conn: &Connection, pattern: &str) -> Result<Vec<Tag>> {
    let like = format!("%{}%", pattern.to_lowercase());
    let mut stmt =
        conn.prepare("SELECT id, name FROM tags WHERE name LIKE ?1 ORDER BY name")?;
    let tags = stmt
        .query_map([like], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tags)
}

/// Remove a tag by name.
///
/// # Errors
///
/// - `NotFound` if the tag does not exist.
/// - `InUse` if any item still carries it.
pub fn remove(conn: &Connection, name: &str) -> Result<()> {
    let normalized = normalize_tag_name(name).unwrap_or_else(|| name.to_string());
    let Some(tag) = get_by_name(conn, &normalized)? else {
        return Err(Error::NotFound {
            entity: "tag",
            key: normalized,
        });
    };

    let in_use: i64 = conn.query_row(
        "SELECT COUNT(*) FROM item_tags WHERE tag_id = ?1",
        [tag.id],
        |row| row.get(0),
    )?;
    if in_use > 0 {
        return Err(Error::InUse {
            entity: "tag",
            by: format!("{in_use} item(s)"),
        });
    }

    conn.execute("DELETE FROM tags WHERE id = ?1", [tag.id])?;
    Ok(())
}

/// Replace an item's tag associations, preserving order.
///
/// # Errors
///
/// Returns an error if a statement fails.
pub fn set_item_tags(conn: &Connection, item_id: i64, tag_ids: &[i64]) -> Result<()> {
    conn.execute("DELETE FROM item_tags WHERE item_id = ?1", [item_id])?;
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO item_tags (item_id, tag_id, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, tag_id) in tag_ids.iter().enumerate() {
        stmt.execute(rusqlite::params![item_id, tag_id, position as i64])?;
    }
    Ok(())
}

/// Tag names of an item in association order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn tags_of_item(conn: &Connection, item_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name FROM item_tags it
         JOIN tags t ON it.tag_id = t.id
         WHERE it.item_id = ?1
         ORDER BY it.position",
    )?;
    let names = stmt
        .query_map([item_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}
