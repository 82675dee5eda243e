//! Typed key-value persistence for client-side state.
//!
//! Chat history, API keys, the preferred calendar view and onboarding progress
//! all go through a [`KeyValueStore`] handed to whoever needs it, so tests can
//! swap in [`MemoryKvStore`].

use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::Path;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A named slot holding a value of type `T`, stored as JSON.
#[derive(Debug)]
pub struct StoreKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StoreKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for StoreKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StoreKey<T> {}

/// Calendar view persisted between sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Day,
    #[default]
    Week,
    Month,
}

/// Keys shared across crates. Crate-specific keys live next to their types.
pub mod keys {
    use super::{StoreKey, ViewMode};
    use crate::family::Family;
    use crate::onboarding::OnboardingState;

    pub const GEMINI_API_KEY: StoreKey<String> = StoreKey::new("gemini_api_key");
    pub const AZURE_OPENAI_API_KEY: StoreKey<String> = StoreKey::new("azure_openai_api_key");
    pub const CALENDAR_VIEW_MODE: StoreKey<ViewMode> = StoreKey::new("calendarViewMode");
    pub const ONBOARDING_STATE: StoreKey<OnboardingState> = StoreKey::new("onboarding_state");
    pub const FAMILY: StoreKey<Family> = StoreKey::new("family");
    /// Follow-up suggestions offered with the last assistant reply
    pub const EVENT_SUGGESTIONS: StoreKey<Vec<String>> = StoreKey::new("event_suggestions");
}

/// Raw string storage. Implementations must be usable from several threads.
pub trait KeyValueStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>>;
    fn set_raw(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Typed access on top of any [`KeyValueStore`].
pub trait KeyValueStoreExt: KeyValueStore {
    /// Read a value. A stored value that no longer deserializes is treated as absent.
    fn get<T: DeserializeOwned>(&self, key: StoreKey<T>) -> Result<Option<T>> {
        let Some(raw) = self.get_raw(key.name())? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!("Discarding unreadable value for '{}': {}", key.name(), e);
                Ok(None)
            }
        }
    }

    fn set<T: Serialize>(&self, key: StoreKey<T>, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize '{}'", key.name()))?;
        self.set_raw(key.name(), &raw)
    }

    fn clear<T>(&self, key: StoreKey<T>) -> Result<()> {
        self.remove(key.name())
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

/// SQLite-backed key-value store.
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueStore for SqliteKvStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .lock()
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Volatile store for tests and previews.
#[derive(Default)]
pub struct MemoryKvStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}
