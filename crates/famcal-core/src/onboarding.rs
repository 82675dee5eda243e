//! Onboarding wizard progress.
//!
//! Steps run in a fixed order; calendar connection is the only optional step.
//! Progress is persisted so the wizard resumes where the user left off.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::kv::{keys, KeyValueStore, KeyValueStoreExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    #[default]
    Welcome,
    FamilyName,
    Members,
    CalendarConnect,
    Preferences,
    Complete,
}

impl OnboardingStep {
    fn next(self) -> Self {
        match self {
            OnboardingStep::Welcome => OnboardingStep::FamilyName,
            OnboardingStep::FamilyName => OnboardingStep::Members,
            OnboardingStep::Members => OnboardingStep::CalendarConnect,
            OnboardingStep::CalendarConnect => OnboardingStep::Preferences,
            OnboardingStep::Preferences | OnboardingStep::Complete => OnboardingStep::Complete,
        }
    }

    fn previous(self) -> Self {
        match self {
            OnboardingStep::Welcome | OnboardingStep::FamilyName => OnboardingStep::Welcome,
            OnboardingStep::Members => OnboardingStep::FamilyName,
            OnboardingStep::CalendarConnect => OnboardingStep::Members,
            OnboardingStep::Preferences => OnboardingStep::CalendarConnect,
            OnboardingStep::Complete => OnboardingStep::Complete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingState {
    pub step: OnboardingStep,
    pub family_name: Option<String>,
    pub member_count: usize,
    pub calendar_connected: bool,
    pub calendar_skipped: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OnboardingState {
    pub fn is_complete(&self) -> bool {
        self.step == OnboardingStep::Complete
    }

    /// True when the current step has what it needs to move on.
    pub fn can_advance(&self) -> bool {
        match self.step {
            OnboardingStep::FamilyName => self
                .family_name
                .as_deref()
                .is_some_and(|n| !n.trim().is_empty()),
            OnboardingStep::Members => self.member_count > 0,
            OnboardingStep::CalendarConnect => self.calendar_connected || self.calendar_skipped,
            OnboardingStep::Complete => false,
            OnboardingStep::Welcome | OnboardingStep::Preferences => true,
        }
    }

    /// Move to the next step, rejecting incomplete steps.
    pub fn advance(mut self) -> Result<Self, ValidationError> {
        if !self.can_advance() {
            return Err(match self.step {
                OnboardingStep::FamilyName => ValidationError::MissingField("family_name"),
                OnboardingStep::Members => ValidationError::MissingField("members"),
                OnboardingStep::CalendarConnect => ValidationError::MissingField("calendar"),
                _ => ValidationError::InvalidValue {
                    field: "step",
                    message: "onboarding already complete".to_string(),
                },
            });
        }
        self.step = self.step.next();
        if self.step == OnboardingStep::Complete {
            self.completed_at = Some(Utc::now());
        }
        Ok(self)
    }

    pub fn back(mut self) -> Self {
        self.step = self.step.previous();
        self
    }

    /// Skip calendar connection. Only valid on that step.
    pub fn skip_calendar(mut self) -> Result<Self, ValidationError> {
        if self.step != OnboardingStep::CalendarConnect {
            return Err(ValidationError::InvalidValue {
                field: "step",
                message: "calendar connection can only be skipped on its own step".to_string(),
            });
        }
        self.calendar_skipped = true;
        self.advance()
    }

    pub fn load(store: &dyn KeyValueStore) -> anyhow::Result<Self> {
        Ok(store.get(keys::ONBOARDING_STATE)?.unwrap_or_default())
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> anyhow::Result<()> {
        store.set(keys::ONBOARDING_STATE, self)
    }
}
