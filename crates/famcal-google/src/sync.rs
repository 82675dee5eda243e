//! Pull Google Calendar events into the family calendar and push local edits back.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use famcal_calendar::{CalendarEvent, EventService, EventSource};
use famcal_core::{GoogleConfig, KeyValueStore};
use tracing::{info, instrument, warn};

use crate::client::{EventWrite, GoogleCalendarClient};
use crate::error::GoogleError;
use crate::mapping::CalendarMemberMapping;
use crate::types::google_event_id;

/// Outcome of one pull.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub calendars: usize,
    pub events: usize,
}

pub struct GoogleSync {
    client: GoogleCalendarClient,
    kv: Arc<dyn KeyValueStore>,
    events: EventService,
    past_days: u32,
    future_days: u32,
}

impl GoogleSync {
    pub fn new(
        client: GoogleCalendarClient,
        kv: Arc<dyn KeyValueStore>,
        events: EventService,
        config: &GoogleConfig,
    ) -> Self {
        Self {
            client,
            kv,
            events,
            past_days: config.sync_past_days,
            future_days: config.sync_future_days,
        }
    }

    pub fn mapping(&self) -> Result<CalendarMemberMapping, GoogleError> {
        Ok(CalendarMemberMapping::load(self.kv.as_ref())?)
    }

    pub fn save_mapping(&self, mapping: &CalendarMemberMapping) -> Result<(), GoogleError> {
        Ok(mapping.save(self.kv.as_ref())?)
    }

    /// Sync window around now.
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            now - Duration::days(i64::from(self.past_days)),
            now + Duration::days(i64::from(self.future_days)),
        )
    }

    /// Pull every enabled mapped calendar for the default window.
    pub async fn pull(&self) -> Result<SyncReport, GoogleError> {
        let (start, end) = self.window(Utc::now());
        self.pull_window(start, end).await
    }

    /// Pull a window. Nothing is stored unless every calendar was fetched.
    #[instrument(skip(self), level = "info")]
    pub async fn pull_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SyncReport, GoogleError> {
        let mapping = self.mapping()?;
        let tz = self.events.timezone();

        let mut report = SyncReport::default();
        let mut pulled = Vec::new();
        for calendar in mapping.enabled() {
            let items = self
                .client
                .list_all_events(&calendar.calendar_id, start, end)
                .await?;
            let fetched = items.len();
            pulled.extend(
                items
                    .into_iter()
                    .filter_map(|item| item.into_calendar_event(calendar, tz)),
            );
            tracing::debug!(calendar_id = %calendar.calendar_id, fetched, "Fetched Google events");
            report.calendars += 1;
        }

        if report.calendars == 0 {
            warn!("No Google calendars are linked to family members");
        }

        report.events = pulled.len();
        self.events.ingest_google(start, end, pulled).await?;
        info!(calendars = report.calendars, events = report.events, "Google pull complete");
        Ok(report)
    }

    fn target<'a>(&self, event: &'a CalendarEvent) -> Result<(&'a str, &'a str), GoogleError> {
        let not_google = || GoogleError::NotGoogleEvent(event.id.clone());
        if event.source != EventSource::Google {
            return Err(not_google());
        }
        let event_id = google_event_id(&event.id).ok_or_else(not_google)?;
        let calendar_id = event
            .source_calendar_email
            .as_deref()
            .ok_or_else(|| GoogleError::NotMapped(event.id.clone()))?;
        Ok((calendar_id, event_id))
    }

    /// Write a moved or edited Google event back to its calendar.
    #[instrument(skip(self, event), fields(event_id = %event.id), level = "info")]
    pub async fn push_move(&self, event: &CalendarEvent) -> Result<(), GoogleError> {
        let (calendar_id, event_id) = self.target(event)?;
        let changes = EventWrite {
            summary: Some(&event.title),
            start: Some(event.start),
            end: Some(event.end),
            description: event.description.as_deref(),
            location: event.location.as_deref(),
        };
        self.client
            .update_event(calendar_id, event_id, &changes)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, event), fields(event_id = %event.id), level = "info")]
    pub async fn push_delete(&self, event: &CalendarEvent) -> Result<(), GoogleError> {
        let (calendar_id, event_id) = self.target(event)?;
        self.client.delete_event(calendar_id, event_id).await
    }
}
