//! Status registry (workflow statuses).
//!
//! The set is fixed at seed time; statuses cannot be created or
//! deleted through the engine, and `is_closable` only changes via
//! migration.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::model::Status;

fn row_to_status(row: &rusqlite::Row<'_>) -> rusqlite::Result<Status> {
    Ok(Status {
        id: row.get(0)?,
        name: row.get(1)?,
        sort_order: row.get(2)?,
        is_closable: row.get::<_, i64>(3)? != 0,
    })
}

/// List all statuses in workflow order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list(conn: &Connection) -> Result<Vec<Status>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, sort_order, is_closable FROM statuses ORDER BY sort_order",
    )?;
    let statuses = stmt
        .query_map([], row_to_status)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(statuses)
}

/// Look up a status by name, case-insensitively.
///
/// # Errors
///
/// Returns `NotFound` if no such status exists.
pub fn get_by_name(conn: &Connection, name: &str) -> Result<Status> {
    conn.prepare(
        "SELECT id, name, sort_order, is_closable FROM statuses WHERE name = ?1 COLLATE NOCASE",
    )?
    .query_row([name], row_to_status)
    .optional()?
    .ok_or_else(|| Error::NotFound {
        entity: "status",
        key: name.to_string(),
    })
}

/// Look up a status by id.
///
/// # Errors
///
/// Returns `NotFound` if no such status exists.
pub fn get_by_id(conn: &Connection, id: i64) -> Result<Status> {
    conn.prepare("SELECT id, name, sort_order, is_closable FROM statuses WHERE id = ?1")?
        .query_row([id], row_to_status)
        .optional()?
        .ok_or_else(|| Error::NotFound {
            entity: "status",
            key: id.to_string(),
        })
}

/// Ids of all closable statuses.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn closable_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt =
        conn.prepare("SELECT id FROM statuses WHERE is_closable = 1 ORDER BY sort_order")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    #[test]
    fn test_list_seeded_statuses() {
        let storage = SqliteStorage::open_memory().unwrap();
        let statuses = list(storage.conn()).unwrap();
        assert_eq!(statuses.len(), 12);
        assert_eq!(statuses[0].name, "Open");
        assert_eq!(statuses[11].name, "Rejected");
        assert!(statuses[11].is_closable);
    }

    #[test]
    fn test_get_by_name_case_insensitive() {
        let storage = SqliteStorage::open_memory().unwrap();
        let s = get_by_name(storage.conn(), "in progress").unwrap();
        assert_eq!(s.name, "In Progress");
        assert!(!s.is_closable);

        let err = get_by_name(storage.conn(), "Nonexistent").unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "status", .. }));
    }

    #[test]
    fn test_closable_ids_match_flagged_rows() {
        let storage = SqliteStorage::open_memory().unwrap();
        let ids = closable_ids(storage.conn()).unwrap();
        assert_eq!(ids.len(), 4);

        for id in ids {
            assert!(get_by_id(storage.conn(), id).unwrap().is_closable);
        }
    }
}
