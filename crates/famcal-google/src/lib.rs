//! Google Calendar integration: API client, calendar-to-member mapping and sync.

pub mod client;
pub mod error;
pub mod mapping;
pub mod sync;
pub mod types;

pub use client::{EventWrite, GoogleCalendarClient};
pub use error::GoogleError;
pub use mapping::{CalendarMemberMapping, MappedCalendar, CALENDAR_MAPPING};
pub use sync::{GoogleSync, SyncReport};
pub use types::{google_event_id, AccessRole, GoogleCalendar, GOOGLE_ID_PREFIX};
