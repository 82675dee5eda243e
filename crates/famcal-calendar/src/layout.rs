//! Side-by-side layout for overlapping events in a day column.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::types::CalendarEvent;

/// Horizontal placement in percent of the day column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EventLayout {
    pub left: f64,
    pub width: f64,
    pub column: usize,
    pub columns: usize,
}

impl EventLayout {
    pub const FULL: EventLayout = EventLayout {
        left: 0.0,
        width: 100.0,
        column: 0,
        columns: 1,
    };

    pub fn right(&self) -> f64 {
        self.left + self.width
    }
}

fn layout_order(a: &CalendarEvent, b: &CalendarEvent) -> Ordering {
    a.start
        .cmp(&b.start)
        .then_with(|| b.duration().cmp(&a.duration()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Assign columns to the timed events of `date` (local to `tz`).
///
/// Events are partitioned greedily: each goes to the first column whose last
/// event has ended, and a cluster of transitively overlapping events shares
/// `100 / columns` percent per column. All-day events are not laid out.
pub fn calculate_event_layouts(
    events: &[CalendarEvent],
    date: NaiveDate,
    tz: Tz,
) -> HashMap<String, EventLayout> {
    let mut day: Vec<&CalendarEvent> = events
        .iter()
        .filter(|e| !e.is_all_day && e.occurs_on(date, &tz))
        .collect();
    day.sort_by(|a, b| layout_order(a, b));

    let mut layouts = HashMap::with_capacity(day.len());
    let mut cluster: Vec<(&CalendarEvent, usize)> = Vec::new();
    let mut column_ends: Vec<DateTime<Utc>> = Vec::new();
    let mut cluster_end: Option<DateTime<Utc>> = None;

    for event in day {
        if cluster_end.is_some_and(|end| event.start >= end) {
            flush_cluster(&mut cluster, column_ends.len(), &mut layouts);
            column_ends.clear();
            cluster_end = None;
        }

        let column = match column_ends.iter().position(|end| *end <= event.start) {
            Some(free) => {
                column_ends[free] = event.end;
                free
            }
            None => {
                column_ends.push(event.end);
                column_ends.len() - 1
            }
        };
        cluster.push((event, column));
        cluster_end = Some(cluster_end.map_or(event.end, |end| end.max(event.end)));
    }
    flush_cluster(&mut cluster, column_ends.len(), &mut layouts);

    layouts
}

fn flush_cluster(
    cluster: &mut Vec<(&CalendarEvent, usize)>,
    columns: usize,
    layouts: &mut HashMap<String, EventLayout>,
) {
    if cluster.is_empty() {
        return;
    }
    let width = 100.0 / columns.max(1) as f64;
    for (event, column) in cluster.drain(..) {
        let layout = if columns <= 1 {
            EventLayout::FULL
        } else {
            EventLayout {
                left: column as f64 * width,
                width,
                column,
                columns,
            }
        };
        layouts.insert(event.id.clone(), layout);
    }
}
