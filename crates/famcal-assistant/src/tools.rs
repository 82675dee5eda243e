//! Typed tool calls requested by the model.
//!
//! The wire shape is `{"tool": "<name>", "parameters": {...}}`. Parameter
//! keys are camelCase and matched exactly; anything else is rejected here,
//! before a call reaches the calendar or task services.

use chrono::{DateTime, NaiveDate, Utc};
use famcal_calendar::{Category, EventPatch, NewEvent, Priority, RecurrenceRule};
use famcal_tasks::{NewTask, Timeframe};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid parameters for {tool}: {message}")]
    InvalidParameters { tool: String, message: String },

    #[error("Malformed tool call: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateMeetingParams {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub member_id: String,
    #[serde(default)]
    pub member_ids: Option<Vec<String>>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_all_day: Option<bool>,
    #[serde(default)]
    pub recurrence: Option<RecurrenceRule>,
    #[serde(default)]
    pub ai_tip: Option<String>,
}

impl CreateMeetingParams {
    pub fn into_new_event(self) -> NewEvent {
        let mut event = NewEvent::new(self.title, self.start_time, self.end_time, self.member_id);
        event.member_ids = self.member_ids;
        event.category = self.category.unwrap_or_default();
        event.priority = self.priority.unwrap_or_default();
        event.emoji = self.emoji;
        event.description = self.description;
        event.location = self.location;
        event.is_all_day = self.is_all_day.unwrap_or(false);
        event.recurrence = self.recurrence;
        event.ai_tip = self.ai_tip;
        event
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MoveMeetingParams {
    pub event_id: String,
    pub new_start_time: DateTime<Utc>,
    /// Keeps the current duration when absent
    #[serde(default)]
    pub new_end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EditMeetingParams {
    pub event_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub member_ids: Option<Vec<String>>,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_all_day: Option<bool>,
    #[serde(default)]
    pub recurrence: Option<RecurrenceRule>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub ai_tip: Option<String>,
}

impl EditMeetingParams {
    pub fn into_patch(self) -> (String, EventPatch) {
        let patch = EventPatch {
            title: self.title,
            start: self.start_time,
            end: self.end_time,
            category: self.category,
            priority: self.priority,
            member_id: self.member_id,
            member_ids: self.member_ids,
            emoji: self.emoji,
            description: self.description,
            location: self.location,
            is_all_day: self.is_all_day,
            recurrence: self.recurrence,
            color: self.color,
            ai_tip: self.ai_tip,
        };
        (self.event_id, patch)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeleteMeetingParams {
    pub event_id: String,
    #[serde(default)]
    pub delete_series: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScheduleTaskParams {
    /// Existing task; when absent `title` names a task to find or create
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Minutes
    #[serde(default)]
    pub duration: Option<u32>,
    pub member_id: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddTaskParams {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub urgency: Option<u8>,
    #[serde(default)]
    pub importance: Option<u8>,
    #[serde(default)]
    pub timeframe: Option<Timeframe>,
    #[serde(default)]
    pub estimated_minutes: Option<u32>,
    #[serde(default)]
    pub subtasks: Vec<String>,
}

impl AddTaskParams {
    pub fn into_new_task(self) -> (NewTask, Vec<String>) {
        let mut task = NewTask::new(self.title);
        task.description = self.description;
        task.category = self.category.unwrap_or_default();
        if let Some(urgency) = self.urgency {
            task.urgency = urgency;
        }
        if let Some(importance) = self.importance {
            task.importance = importance;
        }
        task.timeframe = self.timeframe.unwrap_or_default();
        task.estimated_minutes = self.estimated_minutes;
        (task, self.subtasks)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddSubtaskParams {
    pub task_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AnalyzeTaskPriorityParams {
    /// All open tasks when absent
    #[serde(default)]
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateWeeklyPlanParams {
    /// Today when absent
    #[serde(default)]
    pub week_start: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "parameters", rename_all = "snake_case")]
pub enum ToolCall {
    CreateMeeting(CreateMeetingParams),
    MoveMeeting(MoveMeetingParams),
    EditMeeting(EditMeetingParams),
    DeleteMeeting(DeleteMeetingParams),
    ScheduleTask(ScheduleTaskParams),
    AddTask(AddTaskParams),
    AddSubtask(AddSubtaskParams),
    AnalyzeTaskPriority(AnalyzeTaskPriorityParams),
    CreateWeeklyPlan(CreateWeeklyPlanParams),
}

/// Names accepted in the `tool` field.
pub const TOOL_NAMES: [&str; 9] = [
    "create_meeting",
    "move_meeting",
    "edit_meeting",
    "delete_meeting",
    "schedule_task",
    "add_task",
    "add_subtask",
    "analyze_task_priority",
    "create_weekly_plan",
];

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::CreateMeeting(_) => "create_meeting",
            ToolCall::MoveMeeting(_) => "move_meeting",
            ToolCall::EditMeeting(_) => "edit_meeting",
            ToolCall::DeleteMeeting(_) => "delete_meeting",
            ToolCall::ScheduleTask(_) => "schedule_task",
            ToolCall::AddTask(_) => "add_task",
            ToolCall::AddSubtask(_) => "add_subtask",
            ToolCall::AnalyzeTaskPriority(_) => "analyze_task_priority",
            ToolCall::CreateWeeklyPlan(_) => "create_weekly_plan",
        }
    }

    /// Validate a JSON object from the model into a typed call.
    ///
    /// Keys other than `tool` and `parameters` are ignored; a missing
    /// `parameters` is treated as `{}`.
    pub fn from_value(value: &Value) -> Result<Self, ToolCallError> {
        let object = value
            .as_object()
            .ok_or_else(|| ToolCallError::Malformed("expected a JSON object".to_string()))?;
        let name = object
            .get("tool")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolCallError::Malformed("missing \"tool\" name".to_string()))?;
        if !TOOL_NAMES.contains(&name) {
            return Err(ToolCallError::UnknownTool(name.to_string()));
        }

        let parameters = match object.get("parameters") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(p @ Value::Object(_)) => p.clone(),
            Some(_) => {
                return Err(ToolCallError::InvalidParameters {
                    tool: name.to_string(),
                    message: "parameters must be an object".to_string(),
                })
            }
        };

        let mut normalized = Map::new();
        normalized.insert("tool".to_string(), Value::String(name.to_string()));
        normalized.insert("parameters".to_string(), parameters);

        serde_json::from_value(Value::Object(normalized)).map_err(|e| {
            ToolCallError::InvalidParameters {
                tool: name.to_string(),
                message: e.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_create_meeting() {
        let value = json!({
            "tool": "create_meeting",
            "parameters": {
                "title": "Team Standup",
                "startTime": "2025-10-09T09:00:00.000Z",
                "endTime": "2025-10-09T09:30:00.000Z",
                "memberId": "1",
                "category": "work",
                "priority": "medium",
                "emoji": "💼"
            }
        });
        let ToolCall::CreateMeeting(params) = ToolCall::from_value(&value).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(params.start_time, Utc.with_ymd_and_hms(2025, 10, 9, 9, 0, 0).unwrap());
        let event = params.into_new_event();
        assert_eq!(event.category, Category::Work);
        assert_eq!(event.priority, Priority::Medium);
        assert_eq!(event.emoji.as_deref(), Some("💼"));
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let value = json!({
            "tool": "move_meeting",
            "parameters": { "event_id": "e1", "newStartTime": "2025-10-09T09:00:00Z" }
        });
        match ToolCall::from_value(&value) {
            Err(ToolCallError::InvalidParameters { tool, .. }) => assert_eq!(tool, "move_meeting"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_tool() {
        let err = ToolCall::from_value(&json!({ "tool": "book_flight" })).unwrap_err();
        assert_eq!(err, ToolCallError::UnknownTool("book_flight".into()));
    }

    #[test]
    fn test_missing_parameters_default() {
        let call = ToolCall::from_value(&json!({ "tool": "analyze_task_priority" })).unwrap();
        assert_eq!(call, ToolCall::AnalyzeTaskPriority(AnalyzeTaskPriorityParams::default()));

        let call = ToolCall::from_value(&json!({ "tool": "create_weekly_plan", "reasoning": "x" }))
            .unwrap();
        assert_eq!(call.name(), "create_weekly_plan");
    }

    #[test]
    fn test_missing_required_field() {
        let err = ToolCall::from_value(&json!({
            "tool": "add_subtask",
            "parameters": { "taskId": "t1" }
        }))
        .unwrap_err();
        assert!(matches!(err, ToolCallError::InvalidParameters { .. }));
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            ToolCall::from_value(&json!(["create_meeting"])),
            Err(ToolCallError::Malformed(_))
        ));
        assert!(matches!(
            ToolCall::from_value(&json!({ "parameters": {} })),
            Err(ToolCallError::Malformed(_))
        ));
    }

    #[test]
    fn test_bad_category_rejected() {
        let err = ToolCall::from_value(&json!({
            "tool": "add_task",
            "parameters": { "title": "Dentist", "category": "spaceflight" }
        }))
        .unwrap_err();
        assert!(matches!(err, ToolCallError::InvalidParameters { .. }));
    }

    #[test]
    fn test_edit_meeting_patch() {
        let call = ToolCall::from_value(&json!({
            "tool": "edit_meeting",
            "parameters": { "eventId": "e1", "location": "Gym", "priority": "high" }
        }))
        .unwrap();
        let ToolCall::EditMeeting(params) = call else {
            panic!("wrong variant");
        };
        let (id, patch) = params.into_patch();
        assert_eq!(id, "e1");
        assert_eq!(patch.location.as_deref(), Some("Gym"));
        assert_eq!(patch.priority, Some(Priority::High));
        assert!(patch.title.is_none());
    }

    #[test]
    fn test_add_task_defaults() {
        let call = ToolCall::from_value(&json!({
            "tool": "add_task",
            "parameters": { "title": "Buy gift", "timeframe": "this_week", "subtasks": ["Pick", "Wrap"] }
        }))
        .unwrap();
        let ToolCall::AddTask(params) = call else {
            panic!("wrong variant");
        };
        let (task, subtasks) = params.into_new_task();
        assert_eq!(task.timeframe, Timeframe::ThisWeek);
        assert_eq!(task.urgency, 3);
        assert_eq!(subtasks, vec!["Pick", "Wrap"]);
    }
}
