//! System prompt assembly.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use famcal_calendar::{CalendarEvent, Category};
use famcal_core::{Family, Language};
use famcal_tasks::Task;

/// Upcoming events listed in the prompt at most.
const MAX_PROMPT_EVENTS: usize = 50;
const MAX_PROMPT_TASKS: usize = 50;

/// Live state the model needs to pick ids and times.
pub struct PromptContext<'a> {
    pub now: DateTime<Utc>,
    pub tz: Tz,
    pub language: Language,
    pub family: Option<&'a Family>,
    pub events: &'a [CalendarEvent],
    pub tasks: &'a [Task],
}

const TOOL_REFERENCE: &str = r#"TOOLS
Reply with JSON objects of the form {"tool": "<name>", "parameters": {...}} inside a ```json block.
Several calls may be sent as {"tool_calls": [...]}. Parameter names are case-sensitive camelCase.
Times are ISO 8601 with an offset, e.g. 2025-10-09T09:00:00.000Z.

- create_meeting: title, startTime, endTime, memberId (required); memberIds, category, priority (low|medium|high), emoji, description, location, isAllDay, recurrence {frequency (daily|weekly|monthly|yearly), interval, daysOfWeek (0=Sunday), endDate, count}, aiTip
- move_meeting: eventId, newStartTime (required); newEndTime (keeps the duration when omitted)
- edit_meeting: eventId (required); any of title, startTime, endTime, category, priority, memberId, memberIds, emoji, description, location, isAllDay, recurrence, color, aiTip
- delete_meeting: eventId (required); deleteSeries (true removes every occurrence)
- schedule_task: startTime, memberId (required); taskId or title; endTime or duration (minutes); category, priority
- add_task: title (required); description, category, urgency (1-5), importance (1-5), timeframe (today|this_week|this_month|someday), estimatedMinutes, subtasks (list of titles)
- add_subtask: taskId, title (required)
- analyze_task_priority: taskId (all open tasks when omitted)
- create_weekly_plan: weekStart (YYYY-MM-DD, today when omitted)

Optionally end with {"followup_buttons": ["...", "..."]} offering up to three short next steps."#;

fn fmt_local(t: DateTime<Utc>, tz: Tz) -> String {
    t.with_timezone(&tz).format("%a %Y-%m-%d %H:%M").to_string()
}

/// Build the system instruction sent with every request.
pub fn build_system_prompt(ctx: &PromptContext<'_>) -> String {
    let mut out = String::new();

    out.push_str(
        "You are the family calendar assistant. You create and change events and tasks \
         for the family by calling tools. Only use ids listed below; never invent them.\n",
    );
    match ctx.language {
        Language::He => out.push_str("Answer in Hebrew.\n"),
        Language::En => out.push_str("Answer in English.\n"),
    }
    let _ = writeln!(
        out,
        "Current time: {} ({})",
        ctx.now.with_timezone(&ctx.tz).format("%A %Y-%m-%d %H:%M %:z"),
        ctx.tz.name()
    );

    out.push('\n');
    out.push_str(TOOL_REFERENCE);
    out.push_str("\n\nCATEGORIES\n");
    let categories: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    out.push_str(&categories.join(", "));
    out.push('\n');

    out.push_str("\nFAMILY\n");
    match ctx.family {
        Some(family) if !family.members.is_empty() => {
            let _ = writeln!(out, "{}", family.name);
            for m in &family.members {
                let you = if m.is_you == Some(true) { " (the user)" } else { "" };
                let _ = writeln!(out, "- id {}: {} [{}]{}", m.id, m.name, m.role.as_str(), you);
            }
        }
        _ => out.push_str("No family members yet; use memberId \"1\".\n"),
    }

    out.push_str("\nUPCOMING EVENTS\n");
    if ctx.events.is_empty() {
        out.push_str("None.\n");
    }
    for e in ctx.events.iter().filter(|e| e.end > ctx.now).take(MAX_PROMPT_EVENTS) {
        let _ = write!(
            out,
            "- id {}: {} {} | {} -> {} | member {} | {}",
            e.id,
            e.emoji,
            e.title,
            fmt_local(e.start, ctx.tz),
            fmt_local(e.end, ctx.tz),
            e.member_id,
            e.category.as_str()
        );
        if e.is_recurring() {
            out.push_str(" | recurring");
        }
        out.push('\n');
    }

    out.push_str("\nOPEN TASKS\n");
    let open: Vec<&Task> = ctx.tasks.iter().filter(|t| !t.completed).collect();
    if open.is_empty() {
        out.push_str("None.\n");
    }
    for t in open.into_iter().take(MAX_PROMPT_TASKS) {
        let (done, total) = t.progress();
        let _ = write!(
            out,
            "- id {}: {} | urgency {} importance {} | {}",
            t.id,
            t.title,
            t.urgency,
            t.importance,
            t.timeframe.as_str()
        );
        if total > 0 {
            let _ = write!(out, " | subtasks {done}/{total}");
        }
        if t.is_scheduled() {
            out.push_str(" | scheduled");
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use chrono::TimeZone;
    use famcal_calendar::NewEvent;
    use famcal_core::{FamilyMember, MemberRole};
    use famcal_tasks::NewTask;

    #[test]
    fn test_prompt_lists_context() {
        let now = Utc.with_ymd_and_hms(2025, 10, 8, 12, 0, 0).unwrap();
        let mut family = Family::new("Cohen");
        family.upsert_member(FamilyMember {
            id: "1".into(),
            name: "Dana".into(),
            role: MemberRole::Parent,
            color: "#F00".into(),
            avatar: None,
            age: None,
            is_mobile: None,
            is_you: Some(true),
        });
        let events = vec![
            NewEvent::new(
                "Piano",
                Utc.with_ymd_and_hms(2025, 10, 9, 14, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 10, 9, 15, 0, 0).unwrap(),
                "1",
            )
            .into_event("e1".into()),
            NewEvent::new(
                "Yesterday",
                Utc.with_ymd_and_hms(2025, 10, 7, 14, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 10, 7, 15, 0, 0).unwrap(),
                "1",
            )
            .into_event("e0".into()),
        ];
        let tasks = vec![NewTask::new("Taxes").into_task("t1".into(), now)];

        let prompt = build_system_prompt(&PromptContext {
            now,
            tz: chrono_tz::Asia::Jerusalem,
            language: Language::He,
            family: Some(&family),
            events: &events,
            tasks: &tasks,
        });

        assert!(prompt.contains("Answer in Hebrew."));
        assert!(prompt.contains("Asia/Jerusalem"));
        assert!(prompt.contains("id 1: Dana [parent] (the user)"));
        // local time, UTC+3
        assert!(prompt.contains("id e1: ") && prompt.contains("2025-10-09 17:00"));
        assert!(!prompt.contains("Yesterday"));
        assert!(prompt.contains("id t1: Taxes"));
        assert!(prompt.contains("create_weekly_plan"));
        assert!(prompt.contains("birthday"));
    }

    #[test]
    fn test_prompt_without_family() {
        let prompt = build_system_prompt(&PromptContext {
            now: Utc::now(),
            tz: chrono_tz::UTC,
            language: Language::En,
            family: None,
            events: &[],
            tasks: &[],
        });
        assert!(prompt.contains("use memberId \"1\""));
        assert!(prompt.contains("UPCOMING EVENTS\nNone."));
    }
}
