//! Type registry: registered item types and field-schema resolution.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::model::{
    BaseType, FieldSchema, RESERVED_TYPE_NAMES, TypeDefinition, validate_type_name,
};

fn row_to_def(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, Option<String>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn materialize(name: String, base: &str, description: Option<String>) -> Result<TypeDefinition> {
    let base_type = BaseType::parse(base).ok_or_else(|| {
        Error::Integrity(format!("type {name} has unknown base type {base}"))
    })?;
    Ok(TypeDefinition {
        name,
        base_type,
        description,
    })
}

/// Register a new item type.
///
/// # Errors
///
/// - `Validation` if the name violates the pattern/length or is reserved.
/// - `AlreadyExists` if the name is taken.
pub fn register(
    conn: &Connection,
    name: &str,
    base_type: BaseType,
    description: Option<&str>,
) -> Result<TypeDefinition> {
    validate_type_name(name).map_err(|e| Error::Validation(vec![e]))?;
    if RESERVED_TYPE_NAMES.contains(&name) {
        return Err(Error::validation("type", "name is reserved"));
    }

    if get(conn, name).is_ok() {
        return Err(Error::AlreadyExists {
            entity: "type",
            key: name.to_string(),
        });
    }

    conn.execute(
        "INSERT INTO type_definitions (name, base_type, description, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            name,
            base_type.as_str(),
            description,
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(TypeDefinition {
        name: name.to_string(),
        base_type,
        description: description.map(ToString::to_string),
    })
}

/// Look up a type definition by name.
///
/// # Errors
///
/// Returns `NotFound` if the type is not registered.
pub fn get(conn: &Connection, name: &str) -> Result<TypeDefinition> {
    let row = conn
        .prepare("SELECT name, base_type, description FROM type_definitions WHERE name = ?1")?
        .query_row([name], row_to_def)
        .optional()?;

    match row {
        Some((name, base, description)) => materialize(name, &base, description),
        None => Err(Error::NotFound {
            entity: "type",
            key: name.to_string(),
        }),
    }
}

/// List registered types, optionally restricted to one base type.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list(conn: &Connection, base_type: Option<BaseType>) -> Result<Vec<TypeDefinition>> {
    let rows: Vec<(String, String, Option<String>)> = match base_type {
        Some(base) => conn
            .prepare(
                "SELECT name, base_type, description FROM type_definitions
                 WHERE base_type = ?1 ORDER BY name",
            )?
            .query_map([base.as_str()], row_to_def)?
            .collect::<rusqlite::Result<_>>()?,
        None => conn
            .prepare(
                "SELECT name, base_type, description FROM type_definitions ORDER BY name",
            )?
            .query_map([], row_to_def)?
            .collect::<rusqlite::Result<_>>()?,
    };

    rows.into_iter()
        .map(|(name, base, description)| materialize(name, &base, description))
        .collect()
}

/// Update a type's description. Name and base type are immutable.
///
/// # Errors
///
/// Returns `NotFound` if the type is not registered.
pub fn update_description(
    conn: &Connection,
    name: &str,
    description: Option<&str>,
) -> Result<TypeDefinition> {
    let mut def = get(conn, name)?;
    conn.execute(
        "UPDATE type_definitions SET description = ?2 WHERE name = ?1",
        rusqlite::params![name, description],
    )?;
    def.description = description.map(ToString::to_string);
    Ok(def)
}

/// Remove a registered type.
///
/// # Errors
///
/// - `Validation` for reserved base-type names.
/// - `NotFound` if the type is not registered.
/// - `InUse` if any item still has this type.
pub fn remove(conn: &Connection, name: &str) -> Result<()> {
    if RESERVED_TYPE_NAMES.contains(&name) {
        return Err(Error::validation("type", "name is reserved"));
    }
    get(conn, name)?;

    let in_use: i64 = conn.query_row(
        "SELECT COUNT(*) FROM items WHERE type = ?1",
        [name],
        |row| row.get(0),
    )?;
    if in_use > 0 {
        return Err(Error::InUse {
            entity: "type",
            by: format!("{in_use} item(s)"),
        });
    }

    conn.execute("DELETE FROM type_definitions WHERE name = ?1", [name])?;
    Ok(())
}

/// Resolve the field schema for a registered type name.
///
/// # Errors
///
/// Returns `NotFound` if the type is not registered.
pub fn fields_for(conn: &Connection, name: &str) -> Result<FieldSchema> {
    let def = get(conn, name)?;
    Ok(FieldSchema::for_base(def.base_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    #[test]
    fn test_seeded_types_present() {
        let storage = SqliteStorage::open_memory().unwrap();
        let all = list(storage.conn(), None).unwrap();
        let names: Vec<&str> = all.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"issues"));
        assert!(names.contains(&"docs"));

        let tasks_only = list(storage.conn(), Some(BaseType::Tasks)).unwrap();
        assert!(tasks_only.iter().all(|t| t.base_type == BaseType::Tasks));
    }

    #[test]
    fn test_register_and_get() {
        let storage = SqliteStorage::open_memory().unwrap();
        let def = register(storage.conn(), "bugs", BaseType::Tasks, Some("Bug reports")).unwrap();
        assert_eq!(def.base_type, BaseType::Tasks);

        let fetched = get(storage.conn(), "bugs").unwrap();
        assert_eq!(fetched, def);
    }

    #[test]
    fn test_register_rejects_bad_names() {
        let storage = SqliteStorage::open_memory().unwrap();
        assert!(matches!(
            register(storage.conn(), "Bad-Name", BaseType::Tasks, None),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            register(storage.conn(), "tasks", BaseType::Tasks, None),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            register(storage.conn(), "issues", BaseType::Tasks, None),
            Err(Error::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_remove_blocked_while_in_use() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage
            .conn()
            .execute(
                "INSERT INTO items (type, title, status_id, created_at, updated_at)
                 VALUES ('issues', 'x', 1, 0, 0)",
                [],
            )
            .unwrap();

        assert!(matches!(
            remove(storage.conn(), "issues"),
            Err(Error::InUse { .. })
        ));

        // Unused seeded type can be removed
        remove(storage.conn(), "decisions").unwrap();
        assert!(get(storage.conn(), "decisions").is_err());
    }

    #[test]
    fn test_fields_for_resolves_base_schema() {
        let storage = SqliteStorage::open_memory().unwrap();
        let schema = fields_for(storage.conn(), "issues").unwrap();
        assert!(schema.allows("startDate"));

        let schema = fields_for(storage.conn(), "docs").unwrap();
        assert!(!schema.allows("startDate"));

        assert!(fields_for(storage.conn(), "nope").is_err());
    }

    #[test]
    fn test_update_description_only() {
        let storage = SqliteStorage::open_memory().unwrap();
        let def = update_description(storage.conn(), "issues", Some("Updated")).unwrap();
        assert_eq!(def.description.as_deref(), Some("Updated"));
        assert_eq!(def.name, "issues");
    }
}
