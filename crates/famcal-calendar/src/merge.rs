//! Merging the local and Google event streams.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::recurrence::expand_all;
use crate::types::CalendarEvent;

/// Combine both streams. Local events override Google events with the same id;
/// output is sorted by start, then id.
pub fn merge_event_streams(local: &[CalendarEvent], google: &[CalendarEvent]) -> Vec<CalendarEvent> {
    let local_ids: HashSet<&str> = local.iter().map(|e| e.id.as_str()).collect();
    let mut merged: Vec<CalendarEvent> = local
        .iter()
        .chain(google.iter().filter(|e| !local_ids.contains(e.id.as_str())))
        .cloned()
        .collect();
    merged.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
    merged
}

#[derive(Default)]
struct FeedInputs {
    local: Vec<CalendarEvent>,
    google: Vec<CalendarEvent>,
}

pub type EventSnapshot = Arc<Vec<CalendarEvent>>;

/// Latest merged event list, published to any number of subscribers.
///
/// Each input replaces its previous snapshot; every publish recomputes the
/// merge from the latest value of both inputs.
#[derive(Clone)]
pub struct EventFeed {
    inputs: Arc<Mutex<FeedInputs>>,
    tx: Arc<watch::Sender<EventSnapshot>>,
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFeed {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Vec::new()));
        Self {
            inputs: Arc::new(Mutex::new(FeedInputs::default())),
            tx: Arc::new(tx),
        }
    }

    pub fn publish_local(&self, events: Vec<CalendarEvent>) {
        let mut inputs = self.inputs.lock();
        inputs.local = events;
        self.tx
            .send_replace(Arc::new(merge_event_streams(&inputs.local, &inputs.google)));
    }

    pub fn publish_google(&self, events: Vec<CalendarEvent>) {
        let mut inputs = self.inputs.lock();
        inputs.google = events;
        self.tx
            .send_replace(Arc::new(merge_event_streams(&inputs.local, &inputs.google)));
    }

    pub fn snapshot(&self) -> EventSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EventSnapshot> {
        self.tx.subscribe()
    }
}

/// A window onto the feed. Recurring events are expanded for the window on
/// every read. Dropping the subscription unsubscribes.
pub struct EventSubscription {
    rx: watch::Receiver<EventSnapshot>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tz: Tz,
}

impl EventSubscription {
    pub fn new(feed: &EventFeed, start: DateTime<Utc>, end: DateTime<Utc>, tz: Tz) -> Self {
        Self {
            rx: feed.subscribe(),
            start,
            end,
            tz,
        }
    }

    /// Visible events as of now.
    pub fn current(&self) -> Vec<CalendarEvent> {
        let snapshot = self.rx.borrow().clone();
        visible_events(&snapshot, self.start, self.end, self.tz)
    }

    /// Wait for the next publish. Returns `None` once the feed is gone.
    pub async fn changed(&mut self) -> Option<Vec<CalendarEvent>> {
        self.rx.changed().await.ok()?;
        Some(self.current())
    }
}

/// Expand and clip a stored event list to `[start, end)`.
pub fn visible_events(
    events: &[CalendarEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tz: Tz,
) -> Vec<CalendarEvent> {
    expand_all(events, start, end, tz)
        .into_iter()
        .filter(|e| e.intersects(start, end))
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::types::{EventSource, NewEvent};
    use chrono::{Duration, TimeZone};

    fn ev(id: &str, hour: u32, source: EventSource) -> CalendarEvent {
        let start = Utc.with_ymd_and_hms(2025, 10, 9, hour, 0, 0).unwrap();
        let mut e = NewEvent::new(id, start, start + Duration::hours(1), "1").into_event(id.to_string());
        e.source = source;
        e
    }

    #[test]
    fn test_local_overrides_google_on_id_collision() {
        let mut local = ev("shared", 9, EventSource::CalAi);
        local.title = "Edited here".to_string();
        let google = vec![ev("shared", 9, EventSource::Google), ev("g", 8, EventSource::Google)];

        let merged = merge_event_streams(&[local], &google);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, "g");
        assert_eq!(merged[1].title, "Edited here");
    }

    #[test]
    fn test_merge_orders_by_start_then_id() {
        let merged = merge_event_streams(
            &[ev("b", 9, EventSource::CalAi)],
            &[ev("a", 9, EventSource::Google), ev("c", 7, EventSource::Google)],
        );
        let ids: Vec<&str> = merged.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_feed_keeps_latest_of_each_input() {
        let feed = EventFeed::new();
        feed.publish_google(vec![ev("g1", 8, EventSource::Google)]);
        feed.publish_local(vec![ev("l1", 9, EventSource::CalAi)]);
        feed.publish_google(vec![ev("g2", 10, EventSource::Google)]);

        let ids: Vec<String> = feed.snapshot().iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids, vec!["l1", "g2"]);
    }

    #[tokio::test]
    async fn test_subscription_sees_updates() {
        let feed = EventFeed::new();
        let day = Utc.with_ymd_and_hms(2025, 10, 9, 0, 0, 0).unwrap();
        let mut sub = EventSubscription::new(&feed, day, day + Duration::days(1), Tz::UTC);
        assert!(sub.current().is_empty());

        let publisher = feed.clone();
        tokio::spawn(async move {
            publisher.publish_local(vec![ev("l1", 9, EventSource::CalAi)]);
        });

        let events = sub.changed().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "l1");
    }

    #[test]
    fn test_visible_events_clips_to_window() {
        let day = Utc.with_ymd_and_hms(2025, 10, 9, 0, 0, 0).unwrap();
        let events = vec![ev("in", 9, EventSource::CalAi)];
        assert_eq!(visible_events(&events, day, day + Duration::days(1), Tz::UTC).len(), 1);
        assert!(visible_events(&events, day + Duration::days(1), day + Duration::days(2), Tz::UTC)
            .is_empty());
    }
}
