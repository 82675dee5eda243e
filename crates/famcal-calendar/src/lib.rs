//! Family calendar: events, recurrence, day layout, gestures and storage.

pub mod backend;
pub mod error;
pub mod interaction;
pub mod layout;
pub mod merge;
pub mod recurrence;
pub mod service;
pub mod store;
pub mod types;

pub use backend::EventBackend;
pub use error::{CalendarError, CalendarResult};
pub use interaction::{
    EventMove, GestureKind, GestureOutcome, GestureTracker, GridGeometry, PointerKind,
    PointerSample,
};
pub use layout::{calculate_event_layouts, EventLayout};
pub use merge::{merge_event_streams, EventFeed, EventSubscription};
pub use recurrence::{buffered_window, expand_all, expand_occurrences, expand_occurrences_in};
pub use service::EventService;
pub use store::SqliteEventStore;
pub use types::{
    day_bounds, Attachment, CalendarEvent, Category, EventPatch, EventSource, Frequency,
    NewEvent, Priority, RecurrenceRule, Reminder,
};
