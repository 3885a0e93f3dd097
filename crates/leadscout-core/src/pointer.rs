//! Durable storage for the deepening pointer.

use crate::Result;
use leadscout_types::DeepeningPointer;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Key under which the active deepening search is recorded.
pub const DEEPENING_KEY: &str = "discovery.deepening";

/// Storage that outlives the UI surface.
pub trait PointerStore: Send + Sync {
    fn load(&self) -> Result<Option<DeepeningPointer>>;

    fn save(&self, pointer: &DeepeningPointer) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

/// SQLite-backed key-value store for client state.
pub struct SqlitePointerStore {
    conn: Mutex<Connection>,
}

impl SqlitePointerStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Private in-memory database, gone when dropped.
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS client_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM client_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn put_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            r#"
            INSERT INTO client_state (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn delete_value(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM client_state WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl PointerStore for SqlitePointerStore {
    fn load(&self) -> Result<Option<DeepeningPointer>> {
        match self.get_value(DEEPENING_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, pointer: &DeepeningPointer) -> Result<()> {
        debug!(target: "leadscout::pointer", "Persisting deepening pointer for search {}", pointer.search_id);
        self.put_value(DEEPENING_KEY, &serde_json::to_string(pointer)?)
    }

    fn clear(&self) -> Result<()> {
        debug!(target: "leadscout::pointer", "Clearing deepening pointer");
        self.delete_value(DEEPENING_KEY)
    }
}

/// Process-local pointer store.
#[derive(Default)]
pub struct MemoryPointerStore {
    pointer: Mutex<Option<DeepeningPointer>>,
}

impl MemoryPointerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<DeepeningPointer>> {
        self.pointer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PointerStore for MemoryPointerStore {
    fn load(&self) -> Result<Option<DeepeningPointer>> {
        Ok(self.slot().clone())
    }

    fn save(&self, pointer: &DeepeningPointer) -> Result<()> {
        *self.slot() = Some(pointer.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}
