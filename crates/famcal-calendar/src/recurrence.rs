//! Recurrence expansion.
//!
//! A recurring event is stored once with its rule. Concrete instances are
//! materialized only for the window being displayed and are never persisted,
//! except when a single occurrence is edited and saved as an override.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;
use tracing::warn;

use crate::types::{day_bounds, CalendarEvent, Frequency, RecurrenceRule};

const WEEKDAYS: [&str; 7] = ["SU", "MO", "TU", "WE", "TH", "FR", "SA"];

/// Build an iCalendar-format DTSTART/RRULE pair for the rrule parser.
fn build_rrule_string(base: &CalendarEvent, rule: &RecurrenceRule, tz: Tz) -> String {
    let dtstart = if tz == Tz::UTC {
        format!("DTSTART:{}", base.start.format("%Y%m%dT%H%M%SZ"))
    } else {
        format!(
            "DTSTART;TZID={}:{}",
            tz.name(),
            base.start.with_timezone(&tz).format("%Y%m%dT%H%M%S")
        )
    };

    let freq = match rule.frequency {
        Frequency::Daily => "DAILY",
        Frequency::Weekly => "WEEKLY",
        Frequency::Monthly => "MONTHLY",
        Frequency::Yearly => "YEARLY",
    };
    let mut parts = vec![format!("FREQ={}", freq), format!("INTERVAL={}", rule.interval)];

    if rule.frequency == Frequency::Weekly {
        if let Some(days) = &rule.days_of_week {
            let mut days: Vec<u8> = days.clone();
            days.sort_unstable();
            days.dedup();
            let byday: Vec<&str> = days
                .iter()
                .filter_map(|d| WEEKDAYS.get(usize::from(*d)).copied())
                .collect();
            parts.push(format!("BYDAY={}", byday.join(",")));
        }
    }

    // COUNT and UNTIL are mutually exclusive; end_date is applied after expansion
    // when both are present.
    if let Some(count) = rule.count {
        parts.push(format!("COUNT={}", count));
    } else if let Some(until) = rule
        .end_date
        .and_then(|d| day_bounds(d, &tz))
        .map(|(_, next_day)| next_day - Duration::seconds(1))
    {
        parts.push(format!("UNTIL={}", until.format("%Y%m%dT%H%M%SZ")));
    }

    format!("{}\nRRULE:{}", dtstart, parts.join(";"))
}

/// Expand a recurring event into instances intersecting `[window_start, window_end)`,
/// computed in UTC.
pub fn expand_occurrences(
    base: &CalendarEvent,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<CalendarEvent> {
    expand_occurrences_in(base, window_start, window_end, Tz::UTC)
}

/// Expand a recurring event with weekdays and wall-clock times taken in `tz`,
/// so a 09:00 event stays at 09:00 across DST changes.
///
/// Malformed rules produce no instances. Instances are returned in ascending
/// start order; the occurrence index counts from the first instance of the
/// series, not from the window.
pub fn expand_occurrences_in(
    base: &CalendarEvent,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    tz: Tz,
) -> Vec<CalendarEvent> {
    let Some(rule) = &base.recurrence else {
        return Vec::new();
    };
    if window_start >= window_end {
        return Vec::new();
    }
    if let Err(e) = rule.validate() {
        warn!(event_id = %base.id, error = %e, "Skipping malformed recurrence rule");
        return Vec::new();
    }

    let rrule_str = build_rrule_string(base, rule, tz);
    let rrule_set: RRuleSet = match rrule_str.parse() {
        Ok(set) => set,
        Err(e) => {
            warn!(event_id = %base.id, error = %e, "Failed to parse recurrence rule");
            return Vec::new();
        }
    };

    let duration = base.duration();
    let series_end = rule
        .end_date
        .and_then(|d| day_bounds(d, &tz))
        .map(|(_, next_day)| next_day);
    let earliest_start = window_start - duration;

    // Indices count from the first instance; iteration ends at the window end.
    rrule_set
        .into_iter()
        .map(|dt| dt.with_timezone(&Utc))
        .enumerate()
        .take_while(|(_, start)| {
            *start < window_end && series_end.map_or(true, |limit| *start < limit)
        })
        .filter(|(_, start)| *start > earliest_start)
        // Exceptions are filtered after enumeration so occurrence ids stay stable.
        .filter(|(_, start)| !rule.exceptions.contains(start))
        .map(|(index, start)| occurrence(base, index, start, duration))
        .collect()
}

fn occurrence(
    base: &CalendarEvent,
    index: usize,
    start: DateTime<Utc>,
    duration: Duration,
) -> CalendarEvent {
    let mut instance = base.clone();
    instance.id = occurrence_id(&base.id, index, start);
    instance.start = start;
    instance.end = start + duration;
    instance.recurrence = None;
    instance.recurring_event_id = Some(base.id.clone());
    instance
}

/// `{baseId}_occurrence_{index}_{startMillis}`
pub fn occurrence_id(base_id: &str, index: usize, start: DateTime<Utc>) -> String {
    format!("{}_occurrence_{}_{}", base_id, index, start.timestamp_millis())
}

/// Parts of an occurrence id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceRef<'a> {
    pub base_id: &'a str,
    pub index: usize,
    pub start: DateTime<Utc>,
}

pub fn parse_occurrence_id(id: &str) -> Option<OccurrenceRef<'_>> {
    let (base_id, rest) = id.rsplit_once("_occurrence_")?;
    let (index, millis) = rest.split_once('_')?;
    Some(OccurrenceRef {
        base_id,
        index: index.parse().ok()?,
        start: DateTime::from_timestamp_millis(millis.parse().ok()?)?,
    })
}

/// Base event id encoded in an occurrence id, if `id` is one.
pub fn base_id_of(id: &str) -> Option<&str> {
    parse_occurrence_id(id).map(|r| r.base_id)
}

/// Rebuild the generated instance `id` of `base` without expanding the series.
pub fn materialize_occurrence(base: &CalendarEvent, id: &str) -> Option<CalendarEvent> {
    let parts = parse_occurrence_id(id)?;
    if parts.base_id != base.id || !base.is_recurring() {
        return None;
    }
    Some(occurrence(base, parts.index, parts.start, base.duration()))
}

/// Widen a visible window so instances starting just outside it are ready
/// when the user scrolls.
pub fn buffered_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    buffer_days: u32,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let buffer = Duration::days(i64::from(buffer_days));
    (start - buffer, end + buffer)
}

/// Expand every recurring event in `events` for the window and pass the rest
/// through. Stored occurrence overrides replace the generated instance with the
/// same id. Output is sorted by start, then id.
pub fn expand_all(
    events: &[CalendarEvent],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    tz: Tz,
) -> Vec<CalendarEvent> {
    let overrides: HashSet<&str> = events
        .iter()
        .filter(|e| e.is_occurrence())
        .map(|e| e.id.as_str())
        .collect();

    let mut out = Vec::with_capacity(events.len());
    for event in events {
        if event.is_recurring() {
            out.extend(
                expand_occurrences_in(event, window_start, window_end, tz)
                    .into_iter()
                    .filter(|instance| !overrides.contains(instance.id.as_str())),
            );
        } else {
            out.push(event.clone());
        }
    }
    out.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
    out
}
