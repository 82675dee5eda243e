//! SQLite task store.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::backend::TaskBackend;
use crate::error::{TaskError, TaskResult};
use crate::types::Task;

pub struct SqliteTaskStore {
    conn: Connection,
}

impl SqliteTaskStore {
    /// Open (or create) the store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                completed INTEGER NOT NULL DEFAULT 0,
                payload TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_open ON tasks(completed, created_at);
            "#,
        )?;
        Ok(())
    }

    fn encode(task: &Task) -> TaskResult<String> {
        serde_json::to_string(task)
            .map_err(|e| TaskError::storage(format!("Failed to encode task: {}", e)))
    }

    fn decode(id: &str, payload: &str) -> Option<Task> {
        match serde_json::from_str(payload) {
            Ok(task) => Some(task),
            Err(e) => {
                warn!(task_id = %id, error = %e, "Skipping unreadable task row");
                None
            }
        }
    }

    fn query(&self, sql: &str) -> TaskResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut tasks = Vec::new();
        for row in rows {
            let (id, payload) = row?;
            tasks.extend(Self::decode(&id, &payload));
        }
        Ok(tasks)
    }
}

impl TaskBackend for SqliteTaskStore {
    fn get(&self, id: &str) -> TaskResult<Option<Task>> {
        let payload: Option<String> = self
            .conn
            .query_row("SELECT payload FROM tasks WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(payload.and_then(|p| Self::decode(id, &p)))
    }

    fn list_open(&self) -> TaskResult<Vec<Task>> {
        self.query("SELECT id, payload FROM tasks WHERE completed = 0 ORDER BY created_at, id")
    }

    fn list_all(&self) -> TaskResult<Vec<Task>> {
        self.query("SELECT id, payload FROM tasks ORDER BY created_at, id")
    }

    fn insert(&self, task: &Task) -> TaskResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO tasks (id, completed, payload, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                task.id,
                task.completed as i32,
                Self::encode(task)?,
                task.created_at.timestamp_millis(),
                task.updated_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn update(&self, task: &Task) -> TaskResult<()> {
        let rows = self.conn.execute(
            "UPDATE tasks SET completed = ?2, payload = ?3, updated_at = ?4 WHERE id = ?1",
            params![
                task.id,
                task.completed as i32,
                Self::encode(task)?,
                task.updated_at.timestamp_millis(),
            ],
        )?;
        if rows == 0 {
            return Err(TaskError::not_found(&task.id));
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> TaskResult<bool> {
        let rows = self.conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::types::{NewTask, Subtask};
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn create_test_store() -> SqliteTaskStore {
        SqliteTaskStore::in_memory().expect("Failed to create test store")
    }

    fn task(id: &str, age_minutes: i64) -> Task {
        NewTask::new(format!("Task {}", id))
            .into_task(id.to_string(), Utc::now() - Duration::minutes(age_minutes))
    }

    #[test]
    fn test_insert_and_get() {
        let store = create_test_store();
        let t = task("t1", 0);
        store.insert(&t).unwrap();
        assert_eq!(store.get("t1").unwrap(), Some(t));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_list_open_excludes_completed() {
        let store = create_test_store();
        store.insert(&task("old", 10)).unwrap();
        let mut done = task("done", 5);
        done.completed = true;
        store.insert(&done).unwrap();
        store.insert(&task("new", 1)).unwrap();

        let ids: Vec<String> = store.list_open().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["old", "new"]);
        assert_eq!(store.list_all().unwrap().len(), 3);
    }

    #[test]
    fn test_update_missing_task() {
        let store = create_test_store();
        assert!(matches!(
            store.update(&task("ghost", 0)),
            Err(TaskError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_subtasks_and_link() {
        let store = create_test_store();
        store.insert(&task("t1", 0)).unwrap();

        let sub = Subtask {
            id: "s1".into(),
            title: "Call the school".into(),
            completed: false,
        };
        store.add_subtask("t1", sub).unwrap();
        let toggled = store.toggle_subtask("t1", "s1").unwrap();
        assert_eq!(toggled.progress(), (1, 1));

        assert!(matches!(
            store.toggle_subtask("t1", "nope"),
            Err(TaskError::SubtaskNotFound(_))
        ));

        store.link_scheduled_event("t1", "evt-9").unwrap();
        assert_eq!(
            store.get("t1").unwrap().unwrap().scheduled_event_id.as_deref(),
            Some("evt-9")
        );
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.db");
        {
            let store = SqliteTaskStore::new(&path).unwrap();
            store.insert(&task("t1", 0)).unwrap();
        }
        let store = SqliteTaskStore::new(&path).unwrap();
        assert!(store.delete("t1").unwrap());
        assert!(!store.delete("t1").unwrap());
    }
}
