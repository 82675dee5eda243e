//! Task storage backend trait.

use chrono::Utc;

use crate::error::{TaskError, TaskResult};
use crate::types::{Subtask, Task};

/// Persistence for tasks.
///
/// Implementations don't need to be Sync - `TaskService` serializes access
/// through a mutex.
pub trait TaskBackend: Send {
    fn get(&self, id: &str) -> TaskResult<Option<Task>>;

    /// Tasks not yet completed, oldest first.
    fn list_open(&self) -> TaskResult<Vec<Task>>;

    fn list_all(&self) -> TaskResult<Vec<Task>>;

    fn insert(&self, task: &Task) -> TaskResult<()>;

    /// Replace a stored task. Fails with `TaskNotFound` when absent.
    fn update(&self, task: &Task) -> TaskResult<()>;

    /// Returns whether a row was removed.
    fn delete(&self, id: &str) -> TaskResult<bool>;

    fn get_required(&self, id: &str) -> TaskResult<Task> {
        self.get(id)?.ok_or_else(|| TaskError::not_found(id))
    }

    fn add_subtask(&self, task_id: &str, subtask: Subtask) -> TaskResult<Task> {
        let mut task = self.get_required(task_id)?;
        task.subtasks.push(subtask);
        task.updated_at = Utc::now();
        self.update(&task)?;
        Ok(task)
    }

    fn toggle_subtask(&self, task_id: &str, subtask_id: &str) -> TaskResult<Task> {
        let mut task = self.get_required(task_id)?;
        let subtask = task
            .subtasks
            .iter_mut()
            .find(|s| s.id == subtask_id)
            .ok_or_else(|| TaskError::SubtaskNotFound(subtask_id.to_string()))?;
        subtask.completed = !subtask.completed;
        task.updated_at = Utc::now();
        self.update(&task)?;
        Ok(task)
    }

    /// Record the calendar event a task was scheduled into.
    fn link_scheduled_event(&self, task_id: &str, event_id: &str) -> TaskResult<Task> {
        let mut task = self.get_required(task_id)?;
        task.scheduled_event_id = Some(event_id.to_string());
        task.updated_at = Utc::now();
        self.update(&task)?;
        Ok(task)
    }
}
