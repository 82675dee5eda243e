//! Weekly planning: fit open tasks into free working time.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use famcal_calendar::CalendarEvent;
use famcal_core::CalendarConfig;
use serde::{Deserialize, Serialize};

use crate::priority::priority_score;
use crate::types::{Task, Timeframe};

const SLOT_ALIGN_MINUTES: i64 = 15;
const DAYS_PER_WEEK: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl WorkingHours {
    pub fn from_config(config: &CalendarConfig) -> Self {
        Self {
            start_hour: config.work_day_start_hour,
            end_hour: config.work_day_end_hour,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedSlot {
    pub task_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyPlan {
    pub week_start: NaiveDate,
    pub slots: Vec<PlannedSlot>,
    /// Tasks that did not fit
    pub unscheduled: Vec<String>,
}

type Interval = (DateTime<Utc>, DateTime<Utc>);

fn local_hour(date: NaiveDate, hour: u32, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = if hour >= 24 {
        date.succ_opt()?.and_hms_opt(0, 0, 0)?
    } else {
        date.and_hms_opt(hour, 0, 0)?
    };
    Some(tz.from_local_datetime(&naive).earliest()?.with_timezone(&Utc))
}

fn align_up(t: DateTime<Utc>) -> DateTime<Utc> {
    let step = SLOT_ALIGN_MINUTES * 60;
    let secs = t.timestamp();
    let rem = secs.rem_euclid(step);
    if rem == 0 && t.timestamp_subsec_nanos() == 0 {
        t
    } else {
        DateTime::from_timestamp(secs - rem + step, 0).unwrap_or(t)
    }
}

/// Working-hours windows of one day minus busy time.
fn free_intervals(day: Interval, busy: &[Interval]) -> Vec<Interval> {
    let mut free = Vec::new();
    let mut cursor = day.0;
    for &(start, end) in busy {
        if end <= cursor || start >= day.1 {
            continue;
        }
        if start > cursor {
            free.push((cursor, start.min(day.1)));
        }
        cursor = cursor.max(end);
        if cursor >= day.1 {
            break;
        }
    }
    if cursor < day.1 {
        free.push((cursor, day.1));
    }
    free
}

/// Propose slots for open, unscheduled tasks in the week starting `week_start`.
///
/// Tasks are placed highest priority first into the earliest free slot that
/// fits. `Today` tasks only go on the first day. All-day events do not block time.
pub fn plan_week(
    tasks: &[Task],
    busy: &[CalendarEvent],
    week_start: NaiveDate,
    hours: WorkingHours,
    tz: Tz,
) -> WeeklyPlan {
    let mut busy_times: Vec<Interval> = busy
        .iter()
        .filter(|e| !e.is_all_day)
        .map(|e| (e.start, e.end))
        .collect();
    busy_times.sort();

    let mut days: Vec<Vec<Interval>> = (0..DAYS_PER_WEEK)
        .map(|offset| {
            let date = week_start + Duration::days(offset);
            match (
                local_hour(date, hours.start_hour, tz),
                local_hour(date, hours.end_hour, tz),
            ) {
                (Some(start), Some(end)) if start < end => free_intervals((start, end), &busy_times),
                _ => Vec::new(),
            }
        })
        .collect();

    let mut candidates: Vec<&Task> = tasks
        .iter()
        .filter(|t| !t.completed && !t.is_scheduled())
        .collect();
    candidates.sort_by(|a, b| {
        priority_score(b)
            .cmp(&priority_score(a))
            .then_with(|| a.title.cmp(&b.title))
    });

    let mut plan = WeeklyPlan {
        week_start,
        slots: Vec::new(),
        unscheduled: Vec::new(),
    };

    for task in candidates {
        let duration = Duration::minutes(i64::from(task.duration_minutes()));
        let last_day = if task.timeframe == Timeframe::Today { 1 } else { days.len() };

        let placed = days.iter_mut().take(last_day).find_map(|free| {
            free.iter().position(|&(start, end)| align_up(start) + duration <= end).map(|i| {
                let (start, end) = free[i];
                let slot_start = align_up(start);
                let slot_end = slot_start + duration;
                free.remove(i);
                if slot_end < end {
                    free.insert(i, (slot_end, end));
                }
                if start < slot_start {
                    free.insert(i, (start, slot_start));
                }
                (slot_start, slot_end)
            })
        });

        match placed {
            Some((start, end)) => plan.slots.push(PlannedSlot {
                task_id: task.id.clone(),
                title: task.title.clone(),
                start,
                end,
            }),
            None => {
                tracing::debug!(task_id = %task.id, "No free slot for task this week");
                plan.unscheduled.push(task.id.clone());
            }
        }
    }

    plan.slots.sort_by(|a, b| a.start.cmp(&b.start));
    plan
}
