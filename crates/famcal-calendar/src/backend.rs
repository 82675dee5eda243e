//! Event storage backend trait.

use chrono::{DateTime, Utc};

use crate::error::CalendarResult;
use crate::types::{CalendarEvent, EventSource};

/// Persistence for calendar events.
///
/// Implementations don't need to be Sync; `EventService` serializes access
/// through a mutex and runs calls on the blocking pool.
pub trait EventBackend: Send {
    /// Get an event by ID. Returns `None` if it doesn't exist.
    fn get(&self, id: &str) -> CalendarResult<Option<CalendarEvent>>;

    /// Events intersecting `[start, end)`, plus every recurring base event
    /// that starts before `end` (its instances may fall in the window).
    fn list_range(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> CalendarResult<Vec<CalendarEvent>>;

    /// Insert or replace an event.
    fn upsert(&self, event: &CalendarEvent) -> CalendarResult<()>;

    /// Delete an event. Returns whether a row was removed.
    fn delete(&self, id: &str) -> CalendarResult<bool>;

    /// Delete a recurring base event and every stored override of it.
    fn delete_series(&self, base_id: &str) -> CalendarResult<usize>;

    /// Atomically replace the events of `source` intersecting the window.
    fn replace_source_range(
        &self,
        source: EventSource,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        events: &[CalendarEvent],
    ) -> CalendarResult<()>;
}
