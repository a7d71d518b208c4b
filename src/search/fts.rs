//! FTS index maintenance and matching.
//!
//! The `items_fts` virtual table mirrors the item table (rowid = item
//! id) and is rewritten on the same write path that touches the row,
//! inside the same transaction. Terms are sanitized and quoted before
//! they reach the MATCH expression, so user input can never inject
//! FTS syntax.

use rusqlite::Connection;

use crate::error::Result;

use super::query::ScopeField;

/// Insert or rewrite an item's FTS entry.
///
/// # Errors
///
/// Returns an error if a statement fails.
pub fn index_item(
    conn: &Connection,
    id: i64,
    title: &str,
    description: Option<&str>,
    content: Option<&str>,
    tags: &[String],
) -> Result<()> {
    conn.execute("DELETE FROM items_fts WHERE rowid = ?1", [id])?;
    conn.execute(
        "INSERT INTO items_fts (rowid, title, description, content, tags)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![id, title, description, content, tags.join(" ")],
    )?;
    Ok(())
}

/// Remove an item's FTS entry.
///
/// # Errors
///
/// Returns an error if the statement fails.
pub fn deindex_item(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM items_fts WHERE rowid = ?1", [id])?;
    Ok(())
}

/// Strip anything that could read as FTS syntax from a term.
fn sanitize_term(term: &str) -> String {
    term.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build an AND-combined MATCH expression from bare and scoped terms.
///
/// Returns `None` when nothing survives sanitization.
#[must_use]
pub fn build_match_expr(terms: &[String], scoped: &[(ScopeField, String)]) -> Option<String> {
    let mut parts = Vec::new();

    for term in terms {
        let clean = sanitize_term(term);
        if !clean.is_empty() {
            parts.push(format!("\"{clean}\""));
        }
    }
    for (field, term) in scoped {
        let clean = sanitize_term(term);
        if !clean.is_empty() {
            parts.push(format!("{}:\"{clean}\"", field.column()));
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" AND "))
    }
}

/// Item ids matching an FTS expression.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn search_ids(conn: &Connection, match_expr: &str) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT rowid FROM items_fts WHERE items_fts MATCH ?1")?;
    let ids = stmt
        .query_map([match_expr], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

/// Up to `limit` titles starting with `prefix`, newest first,
/// optionally restricted by type.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn suggest(
    conn: &Connection,
    prefix: &str,
    types: Option<&[String]>,
    limit: usize,
) -> Result<Vec<String>> {
    use rusqlite::types::Value;

    let mut params: Vec<Value> = vec![Value::from(format!("{prefix}%"))];
    let mut sql =
        "SELECT title FROM items WHERE title LIKE ?1 COLLATE NOCASE".to_string();

    if let Some(types) = types {
        if !types.is_empty() {
            let mut placeholders = Vec::with_capacity(types.len());
            for t in types {
                params.push(Value::from(t.clone()));
                placeholders.push(format!("?{}", params.len()));
            }
            sql.push_str(&format!(" AND type IN ({})", placeholders.join(", ")));
        }
    }

    params.push(Value::from(limit as i64));
    sql.push_str(&format!(
        " ORDER BY updated_at DESC LIMIT ?{}",
        params.len()
    ));

    let mut stmt = conn.prepare(&sql)?;
    let titles = stmt
        .query_map(rusqlite::params_from_iter(params), |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(titles)
}

/// Rowids present in the FTS index.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn all_indexed_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT rowid FROM items_fts ORDER BY rowid")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    fn seed_item(conn: &Connection, title: &str, content: &str) -> i64 {
        conn.execute(
            "INSERT INTO items (type, title, content, status_id, created_at, updated_at)
             VALUES ('issues', ?1, ?2, 1, 0, 0)",
            [title, content],
        )
        .unwrap();
        let id = conn.last_insert_rowid();
        index_item(conn, id, title, None, Some(content), &[]).unwrap();
        id
    }

    #[test]
    fn test_index_and_match() {
        let storage = SqliteStorage::open_memory().unwrap();
        let id = seed_item(storage.conn(), "Login broken", "POST /login returns 500");

        let expr = build_match_expr(&["login".to_string()], &[]).unwrap();
        assert_eq!(search_ids(storage.conn(), &expr).unwrap(), vec![id]);
    }

    #[test]
    fn test_porter_stemming_matches_variants() {
        let storage = SqliteStorage::open_memory().unwrap();
        let id = seed_item(storage.conn(), "Caching layer", "responses are cached aggressively");

        let expr = build_match_expr(&["cache".to_string()], &[]).unwrap();
        assert_eq!(search_ids(storage.conn(), &expr).unwrap(), vec![id]);
    }

    #[test]
    fn test_terms_are_anded() {
        let storage = SqliteStorage::open_memory().unwrap();
        let a = seed_item(storage.conn(), "Login broken", "auth flow");
        seed_item(storage.conn(), "Login docs", "how to sign in");

        let expr =
            build_match_expr(&["login".to_string(), "auth".to_string()], &[]).unwrap();
        assert_eq!(search_ids(storage.conn(), &expr).unwrap(), vec![a]);
    }

    #[test]
    fn test_scoped_term_restricts_column() {
        let storage = SqliteStorage::open_memory().unwrap();
        let a = seed_item(storage.conn(), "Login broken", "details");
        seed_item(storage.conn(), "Other", "login mentioned in body");

        let expr =
            build_match_expr(&[], &[(ScopeField::Title, "login".to_string())]).unwrap();
        assert_eq!(search_ids(storage.conn(), &expr).unwrap(), vec![a]);
    }

    #[test]
    fn test_deindex_removes_matches() {
        let storage = SqliteStorage::open_memory().unwrap();
        let id = seed_item(storage.conn(), "Ephemeral", "short lived");
        deindex_item(storage.conn(), id).unwrap();

        let expr = build_match_expr(&["ephemeral".to_string()], &[]).unwrap();
        assert!(search_ids(storage.conn(), &expr).unwrap().is_empty());
    }

    #[test]
    fn test_sanitize_defuses_fts_syntax() {
        assert_eq!(sanitize_term("a\"b OR c*"), "a b OR c");
        assert_eq!(build_match_expr(&["***".to_string()], &[]), None);

        // A hostile term must not produce a syntax error
        let storage = SqliteStorage::open_memory().unwrap();
        seed_item(storage.conn(), "Safe", "content");
        let expr = build_match_expr(&["x\" OR rowid:1".to_string()], &[]).unwrap();
        assert!(search_ids(storage.conn(), &expr).is_ok());
    }

    #[test]
    fn test_suggest_prefix_and_types() {
        let storage = SqliteStorage::open_memory().unwrap();
        seed_item(storage.conn(), "API guide", "docs");
        seed_item(storage.conn(), "API errors", "list");
        seed_item(storage.conn(), "Unrelated", "x");

        let titles = suggest(storage.conn(), "api", None, 10).unwrap();
        assert_eq!(titles.len(), 2);

        let titles = suggest(
            storage.conn(),
            "api",
            Some(&["docs".to_string()]),
            10,
        )
        .unwrap();
        assert!(titles.is_empty());
    }
}
