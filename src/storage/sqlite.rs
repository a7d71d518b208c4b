//! SQLite connection management and transaction discipline.
//!
//! Every public engine operation that writes runs inside one IMMEDIATE
//! transaction via [`SqliteStorage::mutate`], so an item and its side
//! rows (tags, keywords, concepts, relations, FTS entries) commit
//! atomically and roll back together on error or cancellation.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, Transaction};
use tracing::debug;

use crate::error::Result;
use crate::storage::schema::apply_schema;

/// Default busy timeout for cross-process writers.
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed storage.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema and pending migrations
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// schema fails to apply.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an explicit busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// schema fails to apply.
    pub fn open_with_timeout(path: &Path, timeout: Option<Duration>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(timeout.unwrap_or(DEFAULT_BUSY_TIMEOUT))?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// The underlying connection, for read operations.
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation under one IMMEDIATE transaction.
    ///
    /// The closure gets the open transaction; returning `Err` rolls
    /// everything back, returning `Ok` commits.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or a database error from
    /// begin/commit.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        debug!(op, "begin mutation");
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let result = f(&tx)?;
        tx.commit()?;
        debug!(op, "committed");

        Ok(result)
    }
}
