use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::retry::RetryConfig;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the SQLite databases
    pub data_dir: PathBuf,

    /// Calendar grid and recurrence settings
    pub calendar: CalendarConfig,

    /// Google Calendar sync settings
    #[serde(default)]
    pub google: GoogleConfig,

    /// AI assistant settings
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Backoff for outgoing HTTP calls
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Quick-entry and prompt language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    He,
    #[default]
    En,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Pixel height of one hour in the time grid
    pub hour_height_px: f64,

    /// Drag/resize snapping granularity
    pub snap_minutes: u32,

    /// Shortest duration a resize may produce
    pub min_duration_minutes: u32,

    /// Days added on both sides of the visible window before expanding recurrences
    pub recurrence_buffer_days: u32,

    pub language: Language,

    /// IANA timezone name used for day boundaries
    pub timezone: String,

    /// Working hours used by weekly planning
    #[serde(default = "default_work_day_start")]
    pub work_day_start_hour: u32,
    #[serde(default = "default_work_day_end")]
    pub work_day_end_hour: u32,
}

fn default_work_day_start() -> u32 {
    9
}

fn default_work_day_end() -> u32 {
    18
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            hour_height_px: 60.0,
            snap_minutes: 15,
            min_duration_minutes: 15,
            recurrence_buffer_days: 7,
            language: Language::En,
            timezone: "UTC".to_string(),
            work_day_start_hour: default_work_day_start(),
            work_day_end_hour: default_work_day_end(),
        }
    }
}

impl CalendarConfig {
    /// Parsed timezone, falling back to UTC for unknown names.
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// Calendar API base URL
    pub api_base_url: String,

    /// Days before today included in a pull
    pub sync_past_days: u32,

    /// Days after today included in a pull
    pub sync_future_days: u32,

    /// OAuth access token (read from GOOGLE_ACCESS_TOKEN, never written to disk)
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            sync_past_days: 7,
            sync_future_days: 90,
            access_token: std::env::var("GOOGLE_ACCESS_TOKEN").ok(),
        }
    }
}

/// Which hosted model backs the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[default]
    Gemini,
    AzureOpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub provider: LlmProvider,

    /// Model name (Gemini) or deployment name (Azure OpenAI)
    pub model: String,

    /// API endpoint; for Azure this is the resource URL
    pub endpoint: String,

    #[serde(default = "default_azure_api_version")]
    pub azure_api_version: String,

    /// Seconds before an in-flight model request is abandoned
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Chat history retention: newest messages kept
    #[serde(default = "default_max_history")]
    pub max_history_messages: usize,

    /// Chat history retention: messages older than this are dropped
    #[serde(default = "default_history_age")]
    pub history_max_age_days: u32,
}

fn default_azure_api_version() -> String {
    "2024-06-01".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_history() -> usize {
    100
}

fn default_history_age() -> u32 {
    30
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Gemini,
            model: "gemini-2.0-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            azure_api_version: default_azure_api_version(),
            request_timeout_secs: default_request_timeout(),
            max_history_messages: default_max_history(),
            history_max_age_days: default_history_age(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: crate::retry::DEFAULT_MAX_RETRIES,
            initial_delay_ms: crate::retry::DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: crate::retry::DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_retries, self.initial_delay_ms, self.max_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("famcal");

        Self {
            data_dir,
            calendar: CalendarConfig::default(),
            google: GoogleConfig::default(),
            assistant: AssistantConfig::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, creating default if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let mut config: Config =
            toml::from_str(&contents).context("Failed to parse config file")?;
        config.google.access_token = std::env::var("GOOGLE_ACCESS_TOKEN").ok();

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.calendar.hour_height_px <= 0.0 {
            result.add_error(
                "calendar.hour_height_px",
                "Hour height must be greater than 0",
            );
        }

        if self.calendar.snap_minutes == 0 || 60 % self.calendar.snap_minutes != 0 {
            result.add_error(
                "calendar.snap_minutes",
                "Snap interval must be a non-zero divisor of 60",
            );
        }

        if self.calendar.min_duration_minutes == 0 {
            result.add_error(
                "calendar.min_duration_minutes",
                "Minimum duration must be greater than 0",
            );
        }

        if self.calendar.timezone.parse::<chrono_tz::Tz>().is_err() {
            result.add_error(
                "calendar.timezone",
                format!("Unknown timezone: {}", self.calendar.timezone),
            );
        }

        if self.calendar.work_day_start_hour >= self.calendar.work_day_end_hour
            || self.calendar.work_day_end_hour > 24
        {
            result.add_error(
                "calendar.work_day_start_hour",
                "Working hours must satisfy start < end <= 24",
            );
        }

        if self.calendar.recurrence_buffer_days > 62 {
            result.add_warning(
                "calendar.recurrence_buffer_days",
                "Recurrence buffer is unusually large (>62 days)",
            );
        }

        self.validate_url(&self.google.api_base_url, "google.api_base_url", &mut result);
        self.validate_url(&self.assistant.endpoint, "assistant.endpoint", &mut result);

        if self.google.sync_future_days == 0 {
            result.add_warning("google.sync_future_days", "Google sync window is empty");
        }

        if self.google.access_token.is_none() {
            result.add_warning(
                "google.access_token",
                "GOOGLE_ACCESS_TOKEN not set - Google sync will be unavailable",
            );
        }

        if self.assistant.model.trim().is_empty() {
            result.add_error("assistant.model", "Model name cannot be empty");
        }

        if self.assistant.request_timeout_secs == 0 {
            result.add_error(
                "assistant.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }

        if self.assistant.max_history_messages == 0 {
            result.add_warning(
                "assistant.max_history_messages",
                "Chat history retention disabled (0 messages)",
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Path of the SQLite database holding events, tasks and local state
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("famcal.db")
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("famcal");

        Ok(config_dir.join("config.toml"))
    }
}
