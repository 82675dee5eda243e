//! Event service: optimistic local state in front of a storage backend.
//!
//! Every mutation is applied to the in-memory state and published to the feed
//! before the backend write. If the write fails, the pre-mutation snapshot is
//! restored and republished before the error is returned.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use famcal_core::CalendarConfig;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::backend::EventBackend;
use crate::error::{CalendarError, CalendarResult};
use crate::merge::{visible_events, EventFeed, EventSubscription};
use crate::recurrence::{buffered_window, materialize_occurrence, parse_occurrence_id};
use crate::types::{CalendarEvent, EventPatch, EventSource, NewEvent};

type SharedBackend = Arc<Mutex<Box<dyn EventBackend>>>;

/// Events known to this client, keyed by id.
#[derive(Default)]
struct EventState {
    events: HashMap<String, CalendarEvent>,
}

impl EventState {
    fn partition(&self, source: EventSource) -> Vec<CalendarEvent> {
        let mut out: Vec<CalendarEvent> = self
            .events
            .values()
            .filter(|e| e.source == source)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        out
    }
}

/// Previous value of one id, for rollback.
struct Snapshot {
    id: String,
    previous: Option<CalendarEvent>,
}

#[derive(Clone)]
pub struct EventService {
    backend: SharedBackend,
    state: Arc<Mutex<EventState>>,
    feed: EventFeed,
    tz: Tz,
    buffer_days: u32,
}

impl EventService {
    pub fn new(backend: impl EventBackend + 'static, config: &CalendarConfig) -> Self {
        Self {
            backend: Arc::new(Mutex::new(Box::new(backend))),
            state: Arc::new(Mutex::new(EventState::default())),
            feed: EventFeed::new(),
            tz: config.tz(),
            buffer_days: config.recurrence_buffer_days,
        }
    }

    pub fn feed(&self) -> &EventFeed {
        &self.feed
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    async fn blocking<T, F>(&self, f: F) -> CalendarResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn EventBackend) -> CalendarResult<T> + Send + 'static,
    {
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || {
            let guard = backend.lock();
            f(&**guard)
        })
        .await
        .map_err(|e| CalendarError::Other(anyhow::anyhow!("Storage task failed: {}", e)))?
    }

    fn publish(&self) {
        let state = self.state.lock();
        self.feed.publish_local(state.partition(EventSource::CalAi));
        self.feed.publish_google(state.partition(EventSource::Google));
    }

    /// Apply new values and publish; returns what they replaced.
    fn apply(&self, changes: Vec<(String, Option<CalendarEvent>)>) -> Vec<Snapshot> {
        let snapshots = {
            let mut state = self.state.lock();
            changes
                .into_iter()
                .map(|(id, value)| {
                    let previous = match value {
                        Some(event) => state.events.insert(id.clone(), event),
                        None => state.events.remove(&id),
                    };
                    Snapshot { id, previous }
                })
                .collect()
        };
        self.publish();
        snapshots
    }

    fn rollback(&self, snapshots: Vec<Snapshot>) {
        {
            let mut state = self.state.lock();
            for snapshot in snapshots.into_iter().rev() {
                match snapshot.previous {
                    Some(event) => {
                        state.events.insert(snapshot.id, event);
                    }
                    None => {
                        state.events.remove(&snapshot.id);
                    }
                }
            }
        }
        self.publish();
    }

    /// Run a backend write after an optimistic change, undoing the change on failure.
    async fn commit<T, F>(&self, snapshots: Vec<Snapshot>, write: F) -> CalendarResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn EventBackend) -> CalendarResult<T> + Send + 'static,
    {
        match self.blocking(write).await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(error = %e, "Event write failed, restoring previous state");
                self.rollback(snapshots);
                Err(e)
            }
        }
    }

    /// Resolve an id to a stored event, or a generated occurrence of a stored series.
    async fn resolve(&self, id: &str) -> CalendarResult<CalendarEvent> {
        let cached = self.state.lock().events.get(id).cloned();
        if let Some(event) = cached {
            return Ok(event);
        }
        let lookup = id.to_string();
        if let Some(event) = self.blocking(move |b| b.get(&lookup)).await? {
            return Ok(event);
        }
        if let Some(parts) = parse_occurrence_id(id) {
            let base = self.base_event(parts.base_id).await?;
            if let Some(instance) = materialize_occurrence(&base, id) {
                return Ok(instance);
            }
        }
        Err(CalendarError::not_found(id))
    }

    async fn base_event(&self, base_id: &str) -> CalendarResult<CalendarEvent> {
        let cached = self.state.lock().events.get(base_id).cloned();
        if let Some(event) = cached {
            return Ok(event);
        }
        let lookup = base_id.to_string();
        self.blocking(move |b| b.get(&lookup))
            .await?
            .ok_or_else(|| CalendarError::not_found(base_id))
    }

    pub async fn get_event(&self, id: &str) -> CalendarResult<CalendarEvent> {
        self.resolve(id).await
    }

    /// Load stored events for a window, refresh local state and return the
    /// concrete events intersecting `[start, end)`.
    #[instrument(skip(self), level = "info")]
    pub async fn load_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        let (from, to) = buffered_window(start, end, self.buffer_days);
        let stored = self.blocking(move |b| b.list_range(from, to)).await?;
        info!(count = stored.len(), "Loaded events");

        {
            let mut state = self.state.lock();
            state
                .events
                .retain(|_, e| !(e.intersects(from, to) || (e.is_recurring() && e.start < to)));
            for event in &stored {
                state.events.insert(event.id.clone(), event.clone());
            }
        }
        self.publish();

        Ok(visible_events(&stored, start, end, self.tz))
    }

    /// Watch the merged feed for a window.
    pub fn subscribe_to_events(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> EventSubscription {
        EventSubscription::new(&self.feed, start, end, self.tz)
    }

    #[instrument(skip(self, new_event), fields(title = %new_event.title), level = "info")]
    pub async fn create_event(&self, new_event: NewEvent) -> CalendarResult<CalendarEvent> {
        let event = new_event.into_event(uuid::Uuid::new_v4().to_string());
        event.validate()?;

        let snapshots = self.apply(vec![(event.id.clone(), Some(event.clone()))]);
        let stored = event.clone();
        self.commit(snapshots, move |b| b.upsert(&stored)).await?;

        info!(event_id = %event.id, "Created event");
        Ok(event)
    }

    #[instrument(skip(self, patch), level = "info")]
    pub async fn update_event(&self, id: &str, patch: EventPatch) -> CalendarResult<CalendarEvent> {
        let mut event = self.resolve(id).await?;
        patch.apply(&mut event);
        event.validate()?;

        let occurrence = parse_occurrence_id(id).filter(|_| event.recurring_event_id.is_some());
        let Some(parts) = occurrence else {
            let snapshots = self.apply(vec![(event.id.clone(), Some(event.clone()))]);
            let stored = event.clone();
            self.commit(snapshots, move |b| b.upsert(&stored)).await?;

            debug!(event_id = %event.id, "Updated event");
            return Ok(event);
        };

        // Exclude the original slot so it stays hidden wherever the override lands.
        let mut base = self.base_event(parts.base_id).await?;
        if let Some(rule) = base.recurrence.as_mut() {
            if !rule.exceptions.contains(&parts.start) {
                rule.exceptions.push(parts.start);
            }
        }

        let snapshots = self.apply(vec![
            (base.id.clone(), Some(base.clone())),
            (event.id.clone(), Some(event.clone())),
        ]);
        let stored = event.clone();
        self.commit(snapshots, move |b| {
            b.upsert(&base)?;
            b.upsert(&stored)
        })
        .await?;

        debug!(event_id = %event.id, "Updated occurrence override");
        Ok(event)
    }

    /// Move an event to a new time range. Moving a generated occurrence stores
    /// it as an override and excludes the original slot from its series.
    pub async fn move_event(
        &self,
        id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CalendarResult<CalendarEvent> {
        self.update_event(id, EventPatch::times(start, end)).await
    }

    /// Delete one event. For an occurrence of a series, the occurrence is
    /// excluded from the series and any stored override is removed.
    #[instrument(skip(self), level = "info")]
    pub async fn delete_event(&self, id: &str) -> CalendarResult<()> {
        let event = self.resolve(id).await?;

        let Some(base_id) = event.recurring_event_id.clone() else {
            let snapshots = self.apply(vec![(id.to_string(), None)]);
            let target = id.to_string();
            self.commit(snapshots, move |b| b.delete(&target).map(|_| ()))
                .await?;
            info!(event_id = %id, "Deleted event");
            return Ok(());
        };

        let mut base = self.base_event(&base_id).await?;
        let original_start = parse_occurrence_id(id)
            .map(|parts| parts.start)
            .unwrap_or(event.start);
        if let Some(rule) = base.recurrence.as_mut() {
            if !rule.exceptions.contains(&original_start) {
                rule.exceptions.push(original_start);
            }
        }

        let snapshots = self.apply(vec![
            (base.id.clone(), Some(base.clone())),
            (id.to_string(), None),
        ]);
        let target = id.to_string();
        self.commit(snapshots, move |b| {
            b.upsert(&base)?;
            b.delete(&target).map(|_| ())
        })
        .await?;
        info!(event_id = %id, base_id = %base_id, "Deleted occurrence");
        Ok(())
    }

    /// Delete a recurring series with all of its stored overrides.
    #[instrument(skip(self), level = "info")]
    pub async fn delete_series(&self, base_id: &str) -> CalendarResult<usize> {
        let ids: Vec<String> = {
            let state = self.state.lock();
            state
                .events
                .values()
                .filter(|e| e.id == base_id || e.recurring_event_id.as_deref() == Some(base_id))
                .map(|e| e.id.clone())
                .collect()
        };
        let snapshots = self.apply(ids.into_iter().map(|id| (id, None)).collect());

        let target = base_id.to_string();
        let removed = self
            .commit(snapshots, move |b| b.delete_series(&target))
            .await?;
        if removed == 0 {
            return Err(CalendarError::not_found(base_id));
        }
        info!(base_id = %base_id, removed, "Deleted series");
        Ok(removed)
    }

    /// Replace the Google partition for a window with freshly fetched events.
    #[instrument(skip(self, events), fields(count = events.len()), level = "info")]
    pub async fn ingest_google(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        events: Vec<CalendarEvent>,
    ) -> CalendarResult<()> {
        let events: Vec<CalendarEvent> = events
            .into_iter()
            .map(|mut e| {
                e.source = EventSource::Google;
                e
            })
            .collect();

        let stored = events.clone();
        self.blocking(move |b| b.replace_source_range(EventSource::Google, start, end, &stored))
            .await?;

        {
            let mut state = self.state.lock();
            state
                .events
                .retain(|_, e| !(e.source == EventSource::Google && e.intersects(start, end)));
            for event in events {
                state.events.insert(event.id.clone(), event);
            }
        }
        self.publish();
        Ok(())
    }

    /// Concrete events in a window from the current local state.
    pub fn events_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<CalendarEvent> {
        visible_events(&self.feed.snapshot(), start, end, self.tz)
    }
}
