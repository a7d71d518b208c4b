//! Current-state singleton store.
//!
//! Exactly one row (id = 1, enforced by CHECK). Updates overwrite in
//! place; there is no delete and no history.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::model::CurrentState;

fn decode_json_list<T: serde::de::DeserializeOwned>(raw: &str) -> Vec<T> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Read the singleton, materialising the default row if a legacy
/// database lacks it.
///
/// # Errors
///
/// Returns an error if a query fails.
pub fn get(conn: &Connection) -> Result<CurrentState> {
    let row: Option<(String, String, String, i64, Option<String>)> = conn
        .prepare(
            "SELECT content, tags, related, updated_at, updated_by FROM current_state WHERE id = 1",
        )?
        .query_row([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
            ))
        })
        .optional()?;

    match row {
        Some((content, tags, related, updated_at, updated_by)) => Ok(CurrentState {
            content,
            tags: decode_json_list(&tags),
            related: decode_json_list(&related),
            updated_at,
            updated_by,
        }),
        None => {
            conn.execute("INSERT OR IGNORE INTO current_state (id) VALUES (1)", [])?;
            Ok(CurrentState::default())
        }
    }
}

/// Overwrite the singleton.
///
/// Pinned item ids must exist; tags are stored as given (the engine
/// normalizes them first).
///
/// # Errors
///
/// Returns `NotFound` for a dangling pinned id.
pub fn update(
    conn: &Connection,
    content: &str,
    tags: &[String],
    related: &[i64],
    updated_by: Option<&str>,
    now: i64,
) -> Result<CurrentState> {
    for &id in related {
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM items WHERE id = ?1",
            [id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(Error::NotFound {
                entity: "item",
                key: id.to_string(),
            });
        }
    }

    let tags_json = serde_json::to_string(tags)?;
    let related_json = serde_json::to_string(related)?;

    conn.execute(
        "INSERT INTO current_state (id, content, tags, related, updated_at, updated_by)
         VALUES (1, ?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
             content = excluded.content,
             tags = excluded.tags,
             related = excluded.related,
             updated_at = excluded.updated_at,
             updated_by = excluded.updated_by",
        rusqlite::params![content, tags_json, related_json, now, updated_by],
    )?;

    Ok(CurrentState {
        content: content.to_string(),
        tags: tags.to_vec(),
        related: related.to_vec(),
        updated_at: now,
        updated_by: updated_by.map(ToString::to_string),
    })
}

/// Drop a deleted item id from the pin list, if present.
///
/// # Errors
///
/// Returns an error if a query fails.
pub fn prune_related(conn: &Connection, item_id: i64) -> Result<()> {
    let state = get(conn)?;
    if !state.related.contains(&item_id) {
        return Ok(());
    }

    let pruned: Vec<i64> = state
        .related
        .into_iter()
        .filter(|&id| id != item_id)
        .collect();
    let related_json = serde_json::to_string(&pruned)?;
    conn.execute(
        "UPDATE current_state SET related = ?1 WHERE id = 1",
        [related_json],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    #[test]
    fn test_fresh_db_returns_empty_document() {
        let storage = SqliteStorage::open_memory().unwrap();
        let state = get(storage.conn()).unwrap();
        assert_eq!(state, CurrentState::default());
    }

    #[test]
    fn test_update_overwrites_single_row() {
        let storage = SqliteStorage::open_memory().unwrap();

        update(storage.conn(), "phase A", &[], &[], None, 100).unwrap();
        assert_eq!(get(storage.conn()).unwrap().content, "phase A");

        update(storage.conn(), "phase B", &[], &[], Some("agent"), 200).unwrap();
        let state = get(storage.conn()).unwrap();
        assert_eq!(state.content, "phase B");
        assert_eq!(state.updated_by.as_deref(), Some("agent"));

        let count: i64 = storage
            .conn()
            .query_row("SELECT COUNT(*) FROM current_state", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_update_validates_pinned_ids() {
        let storage = SqliteStorage::open_memory().unwrap();
        let err = update(storage.conn(), "x", &[], &[42], None, 100).unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "item", .. }));
    }

    #[test]
    fn test_prune_related() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage
            .conn()
            .execute(
                "INSERT INTO items (type, title, status_id, created_at, updated_at)
                 VALUES ('issues', 'x', 1, 0, 0)",
                [],
            )
            .unwrap();
        let id = storage.conn().last_insert_rowid();

        update(storage.conn(), "x", &[], &[id], None, 100).unwrap();
        prune_related(storage.conn(), id).unwrap();
        assert!(get(storage.conn()).unwrap().related.is_empty());
    }
}
