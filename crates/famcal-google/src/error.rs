//! Google Calendar error types.

use famcal_calendar::CalendarError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GoogleError {
    #[error("Authentication required")]
    AuthRequired,

    #[error("Token expired")]
    TokenExpired,

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Calendar {0} is not linked to a family member")]
    NotMapped(String),

    #[error("Event {0} did not come from Google Calendar")]
    NotGoogleEvent(String),

    #[error("Conflict: event was modified")]
    Conflict,

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GoogleError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthRequired => "Please connect your Google account".to_string(),
            Self::TokenExpired => "Your Google session has expired. Please reconnect.".to_string(),
            Self::RateLimited(secs) => format!("Too many requests. Please wait {} seconds.", secs),
            Self::EventNotFound(_) => "Event not found in Google Calendar".to_string(),
            Self::NotMapped(_) => "Choose a family member for this calendar first".to_string(),
            Self::NotGoogleEvent(_) => "This event is not from Google Calendar".to_string(),
            Self::Conflict => "The event was modified elsewhere. Please refresh.".to_string(),
            Self::ApiError(msg) => format!("Google Calendar error: {}", msg),
            Self::NetworkError(_) => "Network error. Check your connection.".to_string(),
            Self::Calendar(e) => e.user_message(),
            Self::Other(_) => "Google Calendar sync failed".to_string(),
        }
    }

    /// Whether this error should trigger a token refresh.
    pub fn should_refresh_token(&self) -> bool {
        matches!(self, Self::TokenExpired | Self::AuthRequired)
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::NetworkError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_user_messages() {
        assert!(GoogleError::AuthRequired.user_message().contains("connect"));
        assert!(GoogleError::RateLimited(30).user_message().contains("30"));
        assert!(GoogleError::Conflict.user_message().contains("modified"));
    }

    #[test]
    fn test_should_refresh_token() {
        assert!(GoogleError::TokenExpired.should_refresh_token());
        assert!(GoogleError::AuthRequired.should_refresh_token());
        assert!(!GoogleError::EventNotFound("x".into()).should_refresh_token());
    }

    #[test]
    fn test_is_retryable() {
        assert!(GoogleError::RateLimited(10).is_retryable());
        assert!(!GoogleError::NotMapped("cal".into()).is_retryable());
        assert!(!GoogleError::Conflict.is_retryable());
    }
}
