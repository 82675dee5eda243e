pub mod config;
pub mod error;
pub mod family;
pub mod invite;
pub mod kv;
pub mod onboarding;
pub mod retry;

pub use config::{
    AssistantConfig, CalendarConfig, Config, GoogleConfig, Language, LlmProvider, RetrySettings,
    ValidationResult,
};
pub use error::{
    AppError, ConfigError, DatabaseError, LlmError, NetworkError, ReqwestErrorExt,
    RusqliteErrorExt, ValidationError,
};
pub use family::{Family, FamilyMember, MemberRole};
pub use invite::InviteLink;
pub use kv::{
    keys, KeyValueStore, KeyValueStoreExt, MemoryKvStore, SqliteKvStore, StoreKey, ViewMode,
};
pub use onboarding::{OnboardingState, OnboardingStep};
pub use retry::{with_retry, RetryConfig, RetryDecision};

use anyhow::Result;

/// Initialize logging for the famcal process.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("famcal core initialized");
    Ok(())
}
