//! Task error types.

use famcal_core::{DatabaseError, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Subtask not found: {0}")]
    SubtaskNotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::TaskNotFound(id.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::TaskNotFound(_) => "Task not found".to_string(),
            Self::SubtaskNotFound(_) => "Subtask not found".to_string(),
            Self::Validation(e) => e.user_message().to_string(),
            Self::Storage(_) => "Could not save the task. Please try again.".to_string(),
            Self::Database(e) => e.user_message().to_string(),
            Self::Other(_) => "Something went wrong with your tasks.".to_string(),
        }
    }
}

impl From<rusqlite::Error> for TaskError {
    fn from(e: rusqlite::Error) -> Self {
        use famcal_core::RusqliteErrorExt;
        Self::Database(e.into_database_error())
    }
}

pub type TaskResult<T> = Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(TaskError::not_found("t1").user_message(), "Task not found");
        assert!(TaskError::from(ValidationError::MissingField("title"))
            .user_message()
            .contains("required"));
    }
}
