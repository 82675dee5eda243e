//! Task domain types.

use chrono::{DateTime, Utc};
use famcal_calendar::Category;
use famcal_core::ValidationError;
use serde::{Deserialize, Serialize};

/// When the task should be done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Today,
    ThisWeek,
    ThisMonth,
    #[default]
    Someday,
}

impl Timeframe {
    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::Today => "today",
            Timeframe::ThisWeek => "this_week",
            Timeframe::ThisMonth => "this_month",
            Timeframe::Someday => "someday",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "today" => Some(Timeframe::Today),
            "this_week" | "week" => Some(Timeframe::ThisWeek),
            "this_month" | "month" => Some(Timeframe::ThisMonth),
            "someday" | "later" => Some(Timeframe::Someday),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Category,
    /// 1 (can wait) to 5 (due now)
    pub urgency: u8,
    /// 1 (trivial) to 5 (critical)
    pub importance: u8,
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default)]
    pub estimated_minutes: Option<u32>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub scheduled_event_id: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Minutes assumed for a task without an estimate.
pub const DEFAULT_TASK_MINUTES: u32 = 60;

impl Task {
    pub fn duration_minutes(&self) -> u32 {
        self.estimated_minutes
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_TASK_MINUTES)
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled_event_id.is_some()
    }

    /// Completed / total subtasks.
    pub fn progress(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|s| s.completed).count();
        (done, self.subtasks.len())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        validate_scale("urgency", self.urgency)?;
        validate_scale("importance", self.importance)?;
        Ok(())
    }
}

fn validate_scale(field: &'static str, value: u8) -> Result<(), ValidationError> {
    if (1..=5).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field,
            message: format!("{} is outside 1-5", value),
        })
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Category,
    #[serde(default = "default_scale")]
    pub urgency: u8,
    #[serde(default = "default_scale")]
    pub importance: u8,
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default)]
    pub estimated_minutes: Option<u32>,
}

fn default_scale() -> u8 {
    3
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            category: Category::Other,
            urgency: default_scale(),
            importance: default_scale(),
            timeframe: Timeframe::Someday,
            estimated_minutes: None,
        }
    }

    pub fn into_task(self, id: String, now: DateTime<Utc>) -> Task {
        Task {
            id,
            title: self.title.trim().to_string(),
            description: self.description.filter(|d| !d.trim().is_empty()),
            category: self.category,
            urgency: self.urgency,
            importance: self.importance,
            timeframe: self.timeframe,
            estimated_minutes: self.estimated_minutes,
            subtasks: Vec::new(),
            scheduled_event_id: None,
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a task. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub urgency: Option<u8>,
    pub importance: Option<u8>,
    pub timeframe: Option<Timeframe>,
    pub estimated_minutes: Option<u32>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            task.description = Some(description);
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(urgency) = self.urgency {
            task.urgency = urgency;
        }
        if let Some(importance) = self.importance {
            task.importance = importance;
        }
        if let Some(timeframe) = self.timeframe {
            task.timeframe = timeframe;
        }
        if let Some(minutes) = self.estimated_minutes {
            task.estimated_minutes = Some(minutes);
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
    }
}
