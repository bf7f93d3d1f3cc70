//! SQLite snapshot store

use super::traits::{AdapterState, OpenStore, StateError, StateResult, StateStore};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// SQLite-backed snapshot store
///
/// One row per snapshot key, holding the snapshot as JSON and the time it
/// was saved. Thread-safe via internal mutex on the connection.
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    fn init_schema(conn: &Connection) -> StateResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                key TEXT PRIMARY KEY,
                payload_json TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );

            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// When the snapshot under `key` was last saved
    pub fn saved_at(&self, key: &str) -> StateResult<Option<DateTime<Utc>>> {
        let conn = self.conn();
        let raw: Option<String> = conn
            .query_row(
                "SELECT saved_at FROM snapshots WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|text| {
            DateTime::parse_from_rfc3339(&text)
                .map(|parsed| parsed.with_timezone(&Utc))
                .map_err(|e| StateError::DateParse(e.to_string()))
        })
        .transpose()
    }
}

impl OpenStore for SqliteStateStore {
    fn open(path: impl AsRef<Path>) -> StateResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StateResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl StateStore for SqliteStateStore {
    fn save(&self, key: &str, state: &AdapterState) -> StateResult<()> {
        let payload_json = serde_json::to_string(state)?;
        let saved_at = Utc::now().to_rfc3339();
        self.conn().execute(
            r#"
            INSERT INTO snapshots (key, payload_json, saved_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                payload_json = excluded.payload_json,
                saved_at = excluded.saved_at
            "#,
            params![key, payload_json, saved_at],
        )?;
        debug!(key, pages = state.page_count, "saved snapshot");
        Ok(())
    }

    fn load(&self, key: &str) -> StateResult<Option<AdapterState>> {
        let conn = self.conn();
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload_json FROM snapshots WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> StateResult<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM snapshots WHERE key = ?1", params![key])?;
        Ok(deleted > 0)
    }

    fn keys(&self) -> StateResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key FROM snapshots ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}
