//! Calendar-specific error types.

use famcal_core::{DatabaseError, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CalendarError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::EventNotFound(id.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::EventNotFound(_) => "Event not found".to_string(),
            Self::Validation(e) => e.user_message().to_string(),
            Self::Storage(_) => "Could not save the event. Please try again.".to_string(),
            Self::Database(e) => e.user_message().to_string(),
            Self::Other(_) => "Something went wrong with the calendar.".to_string(),
        }
    }

    /// Whether the caller may retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Database(DatabaseError::QueryFailed(_)))
    }
}

impl From<rusqlite::Error> for CalendarError {
    fn from(e: rusqlite::Error) -> Self {
        use famcal_core::RusqliteErrorExt;
        Self::Database(e.into_database_error())
    }
}

pub type CalendarResult<T> = Result<T, CalendarError>;
