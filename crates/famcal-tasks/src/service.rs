//! Async task service over a blocking storage backend.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{info, instrument};

use crate::backend::TaskBackend;
use crate::error::{TaskError, TaskResult};
use crate::types::{NewTask, Subtask, Task, TaskPatch};

#[derive(Clone)]
pub struct TaskService {
    backend: Arc<Mutex<Box<dyn TaskBackend>>>,
}

impl TaskService {
    pub fn new(backend: impl TaskBackend + 'static) -> Self {
        Self {
            backend: Arc::new(Mutex::new(Box::new(backend))),
        }
    }

    async fn blocking<T, F>(&self, f: F) -> TaskResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn TaskBackend) -> TaskResult<T> + Send + 'static,
    {
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || {
            let guard = backend.lock();
            f(&**guard)
        })
        .await
        .map_err(|e| TaskError::Other(anyhow::anyhow!("Storage task failed: {}", e)))?
    }

    #[instrument(skip(self, new_task), fields(title = %new_task.title), level = "info")]
    pub async fn create_task(&self, new_task: NewTask) -> TaskResult<Task> {
        let task = new_task.into_task(uuid::Uuid::new_v4().to_string(), Utc::now());
        task.validate()?;

        let stored = task.clone();
        self.blocking(move |b| b.insert(&stored)).await?;
        info!(task_id = %task.id, "Created task");
        Ok(task)
    }

    pub async fn get_task(&self, id: &str) -> TaskResult<Task> {
        let id = id.to_string();
        self.blocking(move |b| b.get_required(&id)).await
    }

    pub async fn list_open(&self) -> TaskResult<Vec<Task>> {
        self.blocking(|b| b.list_open()).await
    }

    pub async fn list_all(&self) -> TaskResult<Vec<Task>> {
        self.blocking(|b| b.list_all()).await
    }

    #[instrument(skip(self, patch), level = "info")]
    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> TaskResult<Task> {
        let id = id.to_string();
        self.blocking(move |b| {
            let mut task = b.get_required(&id)?;
            patch.apply(&mut task);
            task.validate()?;
            task.updated_at = Utc::now();
            b.update(&task)?;
            Ok(task)
        })
        .await
    }

    pub async fn complete_task(&self, id: &str) -> TaskResult<Task> {
        self.update_task(
            id,
            TaskPatch {
                completed: Some(true),
                ..Default::default()
            },
        )
        .await
    }

    #[instrument(skip(self), level = "info")]
    pub async fn delete_task(&self, id: &str) -> TaskResult<()> {
        let target = id.to_string();
        if self.blocking(move |b| b.delete(&target)).await? {
            Ok(())
        } else {
            Err(TaskError::not_found(id))
        }
    }

    pub async fn add_subtask(&self, task_id: &str, title: &str) -> TaskResult<Task> {
        let title = title.trim();
        if title.is_empty() {
            return Err(famcal_core::ValidationError::MissingField("title").into());
        }
        let subtask = Subtask {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            completed: false,
        };
        let task_id = task_id.to_string();
        self.blocking(move |b| b.add_subtask(&task_id, subtask)).await
    }

    pub async fn toggle_subtask(&self, task_id: &str, subtask_id: &str) -> TaskResult<Task> {
        let (task_id, subtask_id) = (task_id.to_string(), subtask_id.to_string());
        self.blocking(move |b| b.toggle_subtask(&task_id, &subtask_id))
            .await
    }

    pub async fn link_scheduled_event(&self, task_id: &str, event_id: &str) -> TaskResult<Task> {
        let (task_id, event_id) = (task_id.to_string(), event_id.to_string());
        self.blocking(move |b| b.link_scheduled_event(&task_id, &event_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::store::SqliteTaskStore;
    use crate::types::Timeframe;

    fn service() -> TaskService {
        TaskService::new(SqliteTaskStore::in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_create_and_complete() {
        let svc = service();
        let task = svc.create_task(NewTask::new("Renew passport")).await.unwrap();
        assert_eq!(svc.list_open().await.unwrap().len(), 1);

        svc.complete_task(&task.id).await.unwrap();
        assert!(svc.list_open().await.unwrap().is_empty());
        assert!(svc.get_task(&task.id).await.unwrap().completed);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_title() {
        let svc = service();
        let err = svc.create_task(NewTask::new("  ")).await.unwrap_err();
        assert!(matches!(err, TaskError::Validation(_)));
        assert!(svc.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_validates() {
        let svc = service();
        let task = svc.create_task(NewTask::new("Pack lunch")).await.unwrap();
        let err = svc
            .update_task(
                &task.id,
                TaskPatch {
                    urgency: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Validation(_)));

        let updated = svc
            .update_task(
                &task.id,
                TaskPatch {
                    timeframe: Some(Timeframe::Today),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.timeframe, Timeframe::Today);
        assert_eq!(svc.get_task(&task.id).await.unwrap().urgency, 3);
    }

    #[tokio::test]
    async fn test_subtasks() {
        let svc = service();
        let task = svc.create_task(NewTask::new("Birthday party")).await.unwrap();
        let with_sub = svc.add_subtask(&task.id, "Order cake").await.unwrap();
        let sub_id = with_sub.subtasks[0].id.clone();

        let toggled = svc.toggle_subtask(&task.id, &sub_id).await.unwrap();
        assert!(toggled.subtasks[0].completed);
        assert!(svc.add_subtask(&task.id, "").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let svc = service();
        assert!(matches!(
            svc.delete_task("nope").await,
            Err(TaskError::TaskNotFound(_))
        ));
    }
}
