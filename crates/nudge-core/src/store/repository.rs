//! Key-value repository implementation

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Trait for snapshot storage keyed by name
pub trait KeyValueRepository {
    /// Read the raw JSON stored under `key`
    fn get_raw(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key` in a single statement
    fn put_raw(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`, returning whether it existed
    fn remove(&self, key: &str) -> Result<bool>;

    /// Read and decode the JSON stored under `key`
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get_raw(key)?
            .map(|raw| serde_json::from_str::<T>(&raw).map_err(Error::from))
            .transpose()
    }

    /// Encode `value` as JSON and replace `key` with it
    fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.put_raw(key, &raw)
    }
}

/// `SQLite` implementation of `KeyValueRepository`
pub struct SqliteKeyValueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteKeyValueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl KeyValueRepository for SqliteKeyValueRepository<'_> {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?", params![key])?;
        Ok(rows > 0)
    }
}
