use rusqlite::Connection;
use std::cell::RefCell;
use std::time::Duration;

use crate::errors::CompsError;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// Thread-local connection slot, tagged with the path it was opened for.
thread_local! {
    static DB_CONN: RefCell<Option<(String, Connection)>> = RefCell::new(None);
}

#[derive(Clone, Debug)]
pub struct Database {
    path: String,
}

impl Database {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Provides this thread's connection to the closure, opening it on first use.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, CompsError>
    where
        F: FnOnce(&mut Connection) -> Result<T, CompsError>,
    {
        DB_CONN
            .try_with(|cell| {
                let mut slot = cell.borrow_mut();
                let reuse = matches!(slot.as_ref(), Some((path, _)) if *path == self.path);
                if !reuse {
                    *slot = Some((self.path.clone(), open_connection(&self.path)?));
                }
                match slot.as_mut() {
                    Some((_, conn)) => f(conn),
                    None => Err(CompsError::DbError("connection slot empty".to_string())),
                }
            })
            .map_err(|_| CompsError::DbError("thread-local connection unavailable".to_string()))?
    }
}

fn open_connection(path: &str) -> Result<Connection, CompsError> {
    let conn = Connection::open(path)
        .map_err(|e| CompsError::DbError(format!("Open DB failed: {e}")))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // Readers keep seeing the previous snapshot while a replace is in flight.
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// Apply the embedded schema.
pub fn init_db(db: &Database) -> Result<(), CompsError> {
    db.with_conn(|conn| {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| CompsError::DbError(format!("Failed to apply schema: {e}")))?;
        Ok(())
    })?;

    tracing::info!(path = db.path(), "Database initialized");
    Ok(())
}
