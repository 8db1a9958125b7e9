use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use inkpost_common::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use tracing::info;

pub use rusqlite::types::Value;

/// Statement-level access to the database.
///
/// Each call runs on its own; implementations are not required to provide
/// transactions spanning several calls.
pub trait Store {
    /// Run a single statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize>;

    /// Run one or more parameterless statements.
    fn execute_batch(&self, sql: &str) -> Result<()>;

    /// First column of the first row, or `None` when the query yields no rows.
    fn query_scalar(&self, sql: &str, params: &[Value]) -> Result<Option<Value>>;

    fn query_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>>;

    fn table_exists(&self, table: &str) -> Result<bool> {
        let count = self.query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            &[Value::Text(table.to_string())],
        )?;
        Ok(count.as_ref().and_then(as_i64).unwrap_or(0) > 0)
    }

    fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let count = self.query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
            &[Value::Text(table.to_string()), Value::Text(column.to_string())],
        )?;
        Ok(count.as_ref().and_then(as_i64).unwrap_or(0) > 0)
    }
}

pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(n) => Some(*n),
        _ => None,
    }
}

pub fn as_text(value: &Value) -> Option<&str> {
    match value {
        Value::Text(s) => Some(s.as_str()),
        _ => None,
    }
}

/// SQLite-backed [`Store`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening database at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("store lock poisoned".into()))
    }
}

impl Store for SqliteStore {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        let conn = self.connection()?;
        conn.execute(sql, params_from_iter(params.iter()))
            .map_err(|e| Error::Database(format!("statement failed: {e}")))
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(sql)
            .map_err(|e| Error::Database(format!("batch failed: {e}")))
    }

    fn query_scalar(&self, sql: &str, params: &[Value]) -> Result<Option<Value>> {
        let conn = self.connection()?;
        conn.query_row(sql, params_from_iter(params.iter()), |row| {
            row.get::<_, Value>(0)
        })
        .optional()
        .map_err(|e| Error::Database(format!("query failed: {e}")))
    }

    fn query_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;
        let columns = stmt.column_count();

        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..columns)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(|e| Error::Database(format!("query failed: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(format!("failed to read row: {e}")))
    }
}
