//! Google Calendar API types and conversion into family calendar events.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use famcal_calendar::{CalendarEvent, Category, EventSource, Priority};
use serde::{Deserialize, Serialize};

use crate::mapping::MappedCalendar;

/// Prefix of local ids for events pulled from Google.
pub const GOOGLE_ID_PREFIX: &str = "google_";

const GOOGLE_EMOJI: &str = "📅";

/// Calendar metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoogleCalendar {
    pub id: String,
    pub summary: String,
    pub time_zone: Option<String>,
    pub background_color: Option<String>,
    pub is_primary: bool,
    pub access_role: AccessRole,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AccessRole {
    Owner,
    Writer,
    #[default]
    Reader,
    FreeBusyReader,
}

impl AccessRole {
    fn parse(s: Option<&str>) -> Self {
        match s {
            Some("owner") => Self::Owner,
            Some("writer") => Self::Writer,
            Some("freeBusyReader") => Self::FreeBusyReader,
            _ => Self::Reader,
        }
    }

    pub fn can_write(self) -> bool {
        matches!(self, Self::Owner | Self::Writer)
    }
}

// API Response Types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    pub id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<ApiEventTime>,
    pub end: Option<ApiEventTime>,
    pub status: Option<String>,
    pub color_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEventTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListResponse {
    #[serde(default)]
    pub items: Vec<ApiEvent>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListResponse {
    #[serde(default)]
    pub items: Vec<ApiCalendar>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCalendar {
    pub id: String,
    pub summary: Option<String>,
    pub time_zone: Option<String>,
    pub background_color: Option<String>,
    #[serde(default)]
    pub primary: bool,
    pub access_role: Option<String>,
}

impl From<ApiCalendar> for GoogleCalendar {
    fn from(api: ApiCalendar) -> Self {
        Self {
            summary: api.summary.unwrap_or_else(|| api.id.clone()),
            id: api.id,
            time_zone: api.time_zone,
            background_color: api.background_color,
            is_primary: api.primary,
            access_role: AccessRole::parse(api.access_role.as_deref()),
        }
    }
}

/// Parsed start or end. All-day dates resolve to local midnight in `tz`.
fn parse_event_time(time: &ApiEventTime, tz: Tz) -> Option<(DateTime<Utc>, bool)> {
    if let Some(dt) = &time.date_time {
        let parsed = DateTime::parse_from_rfc3339(dt).ok()?;
        return Some((parsed.with_timezone(&Utc), false));
    }
    let date = NaiveDate::parse_from_str(time.date.as_deref()?, "%Y-%m-%d").ok()?;
    let midnight = tz
        .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .earliest()?
        .with_timezone(&Utc);
    Some((midnight, true))
}

impl ApiEvent {
    /// Convert to a family calendar event owned by the calendar's member.
    ///
    /// Cancelled events and events without usable times are dropped.
    pub fn into_calendar_event(self, calendar: &MappedCalendar, tz: Tz) -> Option<CalendarEvent> {
        if self.status.as_deref() == Some("cancelled") {
            return None;
        }
        let (start, all_day) = parse_event_time(self.start.as_ref()?, tz)?;
        let (end, _) = parse_event_time(self.end.as_ref()?, tz)?;
        if end <= start {
            tracing::debug!(event_id = %self.id, "Skipping Google event with empty time range");
            return None;
        }

        Some(CalendarEvent {
            id: format!("{}{}", GOOGLE_ID_PREFIX, self.id),
            title: self
                .summary
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "(No title)".to_string()),
            start,
            end,
            category: Category::Other,
            priority: Priority::Medium,
            member_id: calendar.member_id.clone(),
            member_ids: None,
            emoji: GOOGLE_EMOJI.to_string(),
            description: self.description,
            location: self.location,
            is_all_day: all_day,
            recurrence: None,
            recurring_event_id: None,
            color: None,
            attachments: Vec::new(),
            reminders: Vec::new(),
            ai_tip: None,
            source: EventSource::Google,
            source_calendar_email: Some(calendar.calendar_id.clone()),
        })
    }
}

/// Google event id behind a local id.
pub fn google_event_id(local_id: &str) -> Option<&str> {
    local_id.strip_prefix(GOOGLE_ID_PREFIX)
}
