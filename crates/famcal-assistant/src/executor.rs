//! Apply typed tool calls to the calendar and task services.

use chrono::{Duration, NaiveDate, Utc};
use famcal_calendar::{day_bounds, CalendarError, CalendarEvent, EventService, NewEvent};
use famcal_core::ValidationError;
use famcal_tasks::{
    analyze_priority, plan_week, rank_tasks, NewTask, Task, TaskError, TaskService, WeeklyPlan,
    WorkingHours,
};
use tracing::{debug, info, instrument};

use crate::error::AssistantResult;
use crate::history::ChatFragment;
use crate::tools::{ScheduleTaskParams, ToolCall};

/// What a single tool call did.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    /// One-line summary for the transcript
    pub summary: String,
    pub fragment: Option<ChatFragment>,
}

impl ToolOutcome {
    fn new(summary: impl Into<String>, fragment: Option<ChatFragment>) -> Self {
        Self {
            summary: summary.into(),
            fragment,
        }
    }
}

#[derive(Clone)]
pub struct ToolExecutor {
    events: EventService,
    tasks: TaskService,
    hours: WorkingHours,
}

impl ToolExecutor {
    pub fn new(events: EventService, tasks: TaskService, hours: WorkingHours) -> Self {
        Self {
            events,
            tasks,
            hours,
        }
    }

    fn when(&self, event: &CalendarEvent) -> String {
        event
            .start
            .with_timezone(&self.events.timezone())
            .format("%a %d %b %H:%M")
            .to_string()
    }

    fn event_card(event: CalendarEvent) -> Option<ChatFragment> {
        Some(ChatFragment::EventCard { event })
    }

    #[instrument(skip(self, call), fields(tool = call.name()))]
    pub async fn execute(&self, call: ToolCall) -> AssistantResult<ToolOutcome> {
        match call {
            ToolCall::CreateMeeting(params) => {
                let event = self.events.create_event(params.into_new_event()).await?;
                let summary = format!("Created \"{}\" on {}", event.title, self.when(&event));
                Ok(ToolOutcome::new(summary, Self::event_card(event)))
            }
            ToolCall::MoveMeeting(params) => {
                let current = self.events.get_event(&params.event_id).await?;
                let end = params
                    .new_end_time
                    .unwrap_or(params.new_start_time + current.duration());
                let event = self
                    .events
                    .move_event(&params.event_id, params.new_start_time, end)
                    .await?;
                let summary = format!("Moved \"{}\" to {}", event.title, self.when(&event));
                Ok(ToolOutcome::new(summary, Self::event_card(event)))
            }
            ToolCall::EditMeeting(params) => {
                let (id, patch) = params.into_patch();
                if patch.is_empty() {
                    return Err(CalendarError::from(ValidationError::MissingField("changes")).into());
                }
                let event = self.events.update_event(&id, patch).await?;
                let summary = format!("Updated \"{}\"", event.title);
                Ok(ToolOutcome::new(summary, Self::event_card(event)))
            }
            ToolCall::DeleteMeeting(params) => {
                let event = self.events.get_event(&params.event_id).await?;
                if params.delete_series && (event.is_recurring() || event.is_occurrence()) {
                    let base_id = event.recurring_event_id.clone().unwrap_or_else(|| event.id.clone());
                    self.events.delete_series(&base_id).await?;
                    Ok(ToolOutcome::new(
                        format!("Deleted every \"{}\"", event.title),
                        None,
                    ))
                } else {
                    self.events.delete_event(&params.event_id).await?;
                    Ok(ToolOutcome::new(format!("Deleted \"{}\"", event.title), None))
                }
            }
            ToolCall::ScheduleTask(params) => self.schedule_task(params).await,
            ToolCall::AddTask(params) => {
                let (new_task, subtasks) = params.into_new_task();
                let mut task = self.tasks.create_task(new_task).await?;
                for title in subtasks.iter().filter(|t| !t.trim().is_empty()) {
                    task = self.tasks.add_subtask(&task.id, title).await?;
                }
                let summary = format!("Added task \"{}\"", task.title);
                Ok(ToolOutcome::new(
                    summary,
                    Some(ChatFragment::TaskList { tasks: vec![task] }),
                ))
            }
            ToolCall::AddSubtask(params) => {
                let task = self.tasks.add_subtask(&params.task_id, &params.title).await?;
                let summary = format!("Added \"{}\" to \"{}\"", params.title.trim(), task.title);
                Ok(ToolOutcome::new(
                    summary,
                    Some(ChatFragment::TaskList { tasks: vec![task] }),
                ))
            }
            ToolCall::AnalyzeTaskPriority(params) => {
                let analyses = match params.task_id {
                    Some(id) => vec![analyze_priority(&self.tasks.get_task(&id).await?)],
                    None => rank_tasks(&self.tasks.list_open().await?),
                };
                let summary = match analyses.as_slice() {
                    [] => "No open tasks to analyze".to_string(),
                    [one] => format!("\"{}\": {}", one.title, one.quadrant.label()),
                    many => format!("Ranked {} tasks", many.len()),
                };
                Ok(ToolOutcome::new(
                    summary,
                    Some(ChatFragment::PriorityAnalysis { analyses }),
                ))
            }
            ToolCall::CreateWeeklyPlan(params) => {
                let tz = self.events.timezone();
                let week_start = params
                    .week_start
                    .unwrap_or_else(|| Utc::now().with_timezone(&tz).date_naive());
                let plan = self.weekly_plan(week_start).await?;
                let summary = format!(
                    "Planned {} task(s) for the week of {}",
                    plan.slots.len(),
                    week_start.format("%d %b")
                );
                Ok(ToolOutcome::new(summary, Some(ChatFragment::WeeklyPlan { plan })))
            }
        }
    }

    async fn weekly_plan(&self, week_start: NaiveDate) -> AssistantResult<WeeklyPlan> {
        let tz = self.events.timezone();
        let (start, _) = day_bounds(week_start, &tz)
            .ok_or_else(|| anyhow::anyhow!("No local midnight for {week_start}"))?;
        let end = start + Duration::days(7);
        self.events.load_events(start, end).await?;
        let busy = self.events.events_between(start, end);
        let tasks = self.tasks.list_open().await?;
        Ok(plan_week(&tasks, &busy, week_start, self.hours, tz))
    }

    async fn find_or_create_task(&self, params: &ScheduleTaskParams) -> AssistantResult<Task> {
        if let Some(id) = &params.task_id {
            return Ok(self.tasks.get_task(id).await?);
        }
        let title = params
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(TaskError::Validation(ValidationError::MissingField("taskId")))?;

        let open = self.tasks.list_open().await?;
        if let Some(task) = open.into_iter().find(|t| t.title.eq_ignore_ascii_case(title)) {
            return Ok(task);
        }
        debug!(title, "Creating task to schedule");
        let mut new_task = NewTask::new(title);
        new_task.category = params.category.unwrap_or_default();
        Ok(self.tasks.create_task(new_task).await?)
    }

    async fn schedule_task(&self, params: ScheduleTaskParams) -> AssistantResult<ToolOutcome> {
        let task = self.find_or_create_task(&params).await?;
        let end = params.end_time.unwrap_or_else(|| {
            let minutes = params.duration.unwrap_or_else(|| task.duration_minutes());
            params.start_time + Duration::minutes(i64::from(minutes))
        });

        let mut new_event = NewEvent::new(task.title.clone(), params.start_time, end, params.member_id);
        new_event.category = params.category.unwrap_or(task.category);
        new_event.priority = params.priority.unwrap_or_default();
        new_event.description = task.description.clone();
        let event = self.events.create_event(new_event).await?;
        self.tasks.link_scheduled_event(&task.id, &event.id).await?;

        info!(task_id = %task.id, event_id = %event.id, "Scheduled task");
        let summary = format!("Scheduled \"{}\" on {}", task.title, self.when(&event));
        Ok(ToolOutcome::new(summary, Self::event_card(event)))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use chrono::{DateTime, TimeZone};
    use famcal_calendar::{Frequency, RecurrenceRule, SqliteEventStore};
    use famcal_core::CalendarConfig;
    use famcal_tasks::SqliteTaskStore;
    use serde_json::json;

    fn executor() -> ToolExecutor {
        let mut config = CalendarConfig::default();
        config.timezone = "UTC".to_string();
        let events = EventService::new(SqliteEventStore::in_memory().unwrap(), &config);
        let tasks = TaskService::new(SqliteTaskStore::in_memory().unwrap());
        ToolExecutor::new(events, tasks, WorkingHours::from_config(&config))
    }

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, d, h, m, 0).unwrap()
    }

    fn call(value: serde_json::Value) -> ToolCall {
        ToolCall::from_value(&value).unwrap()
    }

    #[tokio::test]
    async fn test_move_keeps_duration() {
        let exec = executor();
        let created = exec
            .execute(call(json!({
                "tool": "create_meeting",
                "parameters": {
                    "title": "Dentist",
                    "startTime": "2025-10-09T09:00:00Z",
                    "endTime": "2025-10-09T09:45:00Z",
                    "memberId": "1"
                }
            })))
            .await
            .unwrap();
        let Some(ChatFragment::EventCard { event }) = created.fragment else {
            panic!("expected event card");
        };

        let moved = exec
            .execute(call(json!({
                "tool": "move_meeting",
                "parameters": { "eventId": event.id, "newStartTime": "2025-10-10T14:00:00Z" }
            })))
            .await
            .unwrap();
        assert!(moved.summary.starts_with("Moved \"Dentist\""));
        let stored = exec.events.get_event(&event.id).await.unwrap();
        assert_eq!(stored.start, at(10, 14, 0));
        assert_eq!(stored.end, at(10, 14, 45));
    }

    #[tokio::test]
    async fn test_edit_without_changes_fails() {
        let exec = executor();
        let err = exec
            .execute(call(json!({ "tool": "edit_meeting", "parameters": { "eventId": "x" } })))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::AssistantError::Calendar(CalendarError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_series_from_occurrence() {
        let exec = executor();
        let mut weekly = NewEvent::new("Swim", at(6, 16, 0), at(6, 17, 0), "2");
        weekly.recurrence = Some(RecurrenceRule::new(Frequency::Weekly));
        let base = exec.events.create_event(weekly).await.unwrap();
        let occurrences = exec.events.load_events(at(6, 0, 0), at(27, 0, 0)).await.unwrap();
        let second = occurrences.iter().find(|e| e.start == at(13, 16, 0)).unwrap();

        let outcome = exec
            .execute(call(json!({
                "tool": "delete_meeting",
                "parameters": { "eventId": second.id, "deleteSeries": true }
            })))
            .await
            .unwrap();
        assert_eq!(outcome.summary, "Deleted every \"Swim\"");
        assert!(exec.events.get_event(&base.id).await.is_err());
    }

    #[tokio::test]
    async fn test_schedule_task_by_title_links_event() {
        let exec = executor();
        let outcome = exec
            .execute(call(json!({
                "tool": "schedule_task",
                "parameters": {
                    "title": "Renew passport",
                    "startTime": "2025-10-09T10:00:00Z",
                    "duration": 30,
                    "memberId": "1"
                }
            })))
            .await
            .unwrap();
        let Some(ChatFragment::EventCard { event }) = outcome.fragment else {
            panic!("expected event card");
        };
        assert_eq!(event.end, at(9, 10, 30));

        let tasks = exec.tasks.list_open().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].scheduled_event_id.as_deref(), Some(event.id.as_str()));
    }

    #[tokio::test]
    async fn test_schedule_task_needs_id_or_title() {
        let exec = executor();
        let result = exec
            .execute(call(json!({
                "tool": "schedule_task",
                "parameters": { "startTime": "2025-10-09T10:00:00Z", "memberId": "1" }
            })))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_add_task_with_subtasks_and_analyze() {
        let exec = executor();
        let outcome = exec
            .execute(call(json!({
                "tool": "add_task",
                "parameters": {
                    "title": "Birthday party",
                    "urgency": 5,
                    "importance": 5,
                    "subtasks": ["Cake", "Invites"]
                }
            })))
            .await
            .unwrap();
        let Some(ChatFragment::TaskList { tasks }) = outcome.fragment else {
            panic!("expected task list");
        };
        assert_eq!(tasks[0].subtasks.len(), 2);

        let analysis = exec
            .execute(call(json!({ "tool": "analyze_task_priority" })))
            .await
            .unwrap();
        assert_eq!(analysis.summary, "\"Birthday party\": Do first");
    }

    #[tokio::test]
    async fn test_weekly_plan_avoids_events() {
        let exec = executor();
        let mut task = NewTask::new("Taxes");
        task.estimated_minutes = Some(60);
        exec.tasks.create_task(task).await.unwrap();
        exec.events
            .create_event(NewEvent::new("Standup", at(6, 9, 0), at(6, 10, 0), "1"))
            .await
            .unwrap();

        let outcome = exec
            .execute(call(json!({
                "tool": "create_weekly_plan",
                "parameters": { "weekStart": "2025-10-06" }
            })))
            .await
            .unwrap();
        let Some(ChatFragment::WeeklyPlan { plan }) = outcome.fragment else {
            panic!("expected weekly plan");
        };
        assert_eq!(plan.slots.len(), 1);
        assert_eq!(plan.slots[0].start, at(6, 10, 0));
    }
}
