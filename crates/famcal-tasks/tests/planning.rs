//! Tasks flow from quick entry through storage into a weekly plan.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::{NaiveDate, TimeZone, Utc};
use famcal_calendar::NewEvent;
use famcal_core::Language;
use famcal_tasks::{
    plan_week, rank_tasks, NewTask, QuickEntry, Quadrant, SqliteTaskStore, TaskService, Timeframe,
    WorkingHours,
};
use tempfile::TempDir;

#[tokio::test]
async fn quick_entry_task_is_planned_around_events() {
    let dir = TempDir::new().unwrap();
    let svc = TaskService::new(SqliteTaskStore::new(dir.path().join("tasks.db")).unwrap());
    let monday = NaiveDate::from_ymd_opt(2025, 10, 6).unwrap();

    let entry = QuickEntry::from_text("Fix bike P1 today", Language::En, monday);
    assert_eq!(entry.title, "Fix bike");

    let mut new = NewTask::new(entry.title);
    new.urgency = 5;
    new.importance = 5;
    new.timeframe = Timeframe::Today;
    new.estimated_minutes = Some(45);
    let urgent = svc.create_task(new).await.unwrap();
    svc.create_task(NewTask::new("Sort photos")).await.unwrap();

    let tasks = svc.list_open().await.unwrap();
    let ranked = rank_tasks(&tasks);
    assert_eq!(ranked[0].task_id, urgent.id);
    assert_eq!(ranked[0].quadrant, Quadrant::DoFirst);

    let school_run = NewEvent::new(
        "School run",
        Utc.with_ymd_and_hms(2025, 10, 6, 9, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 10, 6, 10, 0, 0).unwrap(),
        "1",
    )
    .into_event("e1".into());
    let hours = WorkingHours {
        start_hour: 9,
        end_hour: 17,
    };
    let plan = plan_week(&tasks, &[school_run], monday, hours, chrono_tz::UTC);

    assert_eq!(plan.slots.len(), 2);
    assert_eq!(plan.slots[0].task_id, urgent.id);
    assert_eq!(
        plan.slots[0].start,
        Utc.with_ymd_and_hms(2025, 10, 6, 10, 0, 0).unwrap()
    );
    assert!(plan.unscheduled.is_empty());
}
