//! SQLite event store.
//!
//! Events are kept as JSON payloads next to the indexed columns needed for
//! range queries and source partitioning.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::backend::EventBackend;
use crate::error::{CalendarError, CalendarResult};
use crate::types::{CalendarEvent, EventSource};

pub struct SqliteEventStore {
    conn: Connection,
}

impl SqliteEventStore {
    /// Open (or create) the store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                start_ms INTEGER NOT NULL,
                end_ms INTEGER NOT NULL,
                recurring INTEGER NOT NULL,
                recurring_event_id TEXT,
                payload TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_range ON events(start_ms, end_ms);
            CREATE INDEX IF NOT EXISTS idx_events_source ON events(source);
            CREATE INDEX IF NOT EXISTS idx_events_series ON events(recurring_event_id);
            "#,
        )?;
        Ok(())
    }

    pub fn count(&self) -> anyhow::Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn write(conn: &Connection, event: &CalendarEvent) -> CalendarResult<()> {
        let payload = serde_json::to_string(event)
            .map_err(|e| CalendarError::storage(format!("Failed to encode event: {}", e)))?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO events
            (id, source, start_ms, end_ms, recurring, recurring_event_id, payload, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                event.id,
                event.source.as_str(),
                event.start.timestamp_millis(),
                event.end.timestamp_millis(),
                event.is_recurring() as i32,
                event.recurring_event_id,
                payload,
                Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn decode(id: &str, payload: &str) -> Option<CalendarEvent> {
        match serde_json::from_str(payload) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(event_id = %id, error = %e, "Skipping unreadable event row");
                None
            }
        }
    }
}

impl EventBackend for SqliteEventStore {
    fn get(&self, id: &str) -> CalendarResult<Option<CalendarEvent>> {
        let payload: Option<String> = self
            .conn
            .query_row("SELECT payload FROM events WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(payload.and_then(|p| Self::decode(id, &p)))
    }

    fn list_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, payload FROM events
            WHERE (start_ms < ?2 AND end_ms > ?1) OR (recurring = 1 AND start_ms < ?2)
            ORDER BY start_ms, id
            "#,
        )?;
        let rows = stmt.query_map(
            params![start.timestamp_millis(), end.timestamp_millis()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?;

        let mut events = Vec::new();
        for row in rows {
            let (id, payload) = row?;
            events.extend(Self::decode(&id, &payload));
        }
        Ok(events)
    }

    fn upsert(&self, event: &CalendarEvent) -> CalendarResult<()> {
        Self::write(&self.conn, event)
    }

    fn delete(&self, id: &str) -> CalendarResult<bool> {
        let rows = self.conn.execute("DELETE FROM events WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    fn delete_series(&self, base_id: &str) -> CalendarResult<usize> {
        let rows = self.conn.execute(
            "DELETE FROM events WHERE id = ?1 OR recurring_event_id = ?1",
            [base_id],
        )?;
        debug!(base_id = %base_id, rows, "Deleted recurring series");
        Ok(rows)
    }

    fn replace_source_range(
        &self,
        source: EventSource,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        events: &[CalendarEvent],
    ) -> CalendarResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM events WHERE source = ?1 AND start_ms < ?3 AND end_ms > ?2",
            params![
                source.as_str(),
                start.timestamp_millis(),
                end.timestamp_millis()
            ],
        )?;
        for event in events {
            Self::write(&tx, event)?;
        }
        tx.commit()?;
        Ok(())
    }
}
