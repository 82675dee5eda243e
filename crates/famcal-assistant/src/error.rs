//! Assistant error types.

use famcal_calendar::CalendarError;
use famcal_core::{LlmError, NetworkError, ReqwestErrorExt};
use famcal_tasks::TaskError;
use thiserror::Error;

use crate::tools::ToolCallError;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Assistant is still answering the previous message")]
    Busy,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    ToolCall(#[from] ToolCallError),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for AssistantError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.into_network_error())
    }
}

impl AssistantError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Busy => "Please wait for the current answer.".to_string(),
            Self::Llm(e) => e.user_message().to_string(),
            Self::Network(e) => e.user_message().to_string(),
            Self::ToolCall(e) => e.to_string(),
            Self::Calendar(e) => e.user_message(),
            Self::Task(e) => e.user_message(),
            Self::Other(_) => "The assistant ran into a problem.".to_string(),
        }
    }
}

pub type AssistantResult<T> = std::result::Result<T, AssistantError>;
