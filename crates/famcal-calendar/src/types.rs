//! Calendar event types and data structures.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use famcal_core::ValidationError;
use serde::{Deserialize, Serialize};

/// Closed set of event categories understood by the UI and the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Work,
    Personal,
    Family,
    Health,
    Fitness,
    Education,
    School,
    Social,
    Travel,
    Meal,
    Shopping,
    Chores,
    Errands,
    Appointment,
    Medical,
    Sports,
    Hobby,
    Entertainment,
    Birthday,
    Holiday,
    Religious,
    Finance,
    Meeting,
    Kids,
    Pets,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 26] = [
        Category::Work,
        Category::Personal,
        Category::Family,
        Category::Health,
        Category::Fitness,
        Category::Education,
        Category::School,
        Category::Social,
        Category::Travel,
        Category::Meal,
        Category::Shopping,
        Category::Chores,
        Category::Errands,
        Category::Appointment,
        Category::Medical,
        Category::Sports,
        Category::Hobby,
        Category::Entertainment,
        Category::Birthday,
        Category::Holiday,
        Category::Religious,
        Category::Finance,
        Category::Meeting,
        Category::Kids,
        Category::Pets,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Personal => "personal",
            Category::Family => "family",
            Category::Health => "health",
            Category::Fitness => "fitness",
            Category::Education => "education",
            Category::School => "school",
            Category::Social => "social",
            Category::Travel => "travel",
            Category::Meal => "meal",
            Category::Shopping => "shopping",
            Category::Chores => "chores",
            Category::Errands => "errands",
            Category::Appointment => "appointment",
            Category::Medical => "medical",
            Category::Sports => "sports",
            Category::Hobby => "hobby",
            Category::Entertainment => "entertainment",
            Category::Birthday => "birthday",
            Category::Holiday => "holiday",
            Category::Religious => "religious",
            Category::Finance => "finance",
            Category::Meeting => "meeting",
            Category::Kids => "kids",
            Category::Pets => "pets",
            Category::Other => "other",
        }
    }

    /// Lenient lookup used for model output and imported data.
    pub fn parse(s: &str) -> Option<Self> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == needle)
    }

    pub fn default_emoji(self) -> &'static str {
        match self {
            Category::Work | Category::Meeting => "💼",
            Category::Family | Category::Kids => "👨‍👩‍👧",
            Category::Health | Category::Medical | Category::Appointment => "🩺",
            Category::Fitness | Category::Sports => "🏃",
            Category::Education | Category::School => "📚",
            Category::Social | Category::Entertainment => "🎉",
            Category::Travel => "✈️",
            Category::Meal => "🍽️",
            Category::Shopping | Category::Errands => "🛒",
            Category::Chores => "🧹",
            Category::Hobby => "🎨",
            Category::Birthday => "🎂",
            Category::Holiday | Category::Religious => "🕯️",
            Category::Finance => "💰",
            Category::Pets => "🐾",
            Category::Personal | Category::Other => "📌",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

/// Where an event originated. Google events are refreshed by sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EventSource {
    #[default]
    #[serde(rename = "cal_ai")]
    CalAi,
    #[serde(rename = "google")]
    Google,
}

impl EventSource {
    pub fn as_str(self) -> &'static str {
        match self {
            EventSource::CalAi => "cal_ai",
            EventSource::Google => "google",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "google" => EventSource::Google,
            _ => EventSource::CalAi,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// Repetition attached to a base event. Never persisted per occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: i32,
    /// 0 = Sunday … 6 = Saturday
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
    /// Last day (inclusive) on which an occurrence may start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Original starts of deleted occurrences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<DateTime<Utc>>,
}

fn default_interval() -> i32 {
    1
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            days_of_week: None,
            end_date: None,
            count: None,
            exceptions: Vec::new(),
        }
    }

    /// Rejects rules that cannot produce occurrences.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval <= 0 {
            return Err(ValidationError::InvalidRecurrence(format!(
                "interval must be positive, got {}",
                self.interval
            )));
        }
        if let Some(days) = &self.days_of_week {
            if days.iter().any(|d| *d > 6) {
                return Err(ValidationError::InvalidRecurrence(
                    "days of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
                ));
            }
            if self.frequency == Frequency::Weekly && days.is_empty() {
                return Err(ValidationError::InvalidRecurrence(
                    "weekly rule needs at least one day".to_string(),
                ));
            }
        }
        if self.count == Some(0) {
            return Err(ValidationError::InvalidRecurrence(
                "count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub minutes_before: u32,
}

/// Calendar event as stored and rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub priority: Priority,
    pub member_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_ids: Option<Vec<String>>,
    #[serde(default)]
    pub emoji: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrenceRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reminders: Vec<Reminder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_tip: Option<String>,
    #[serde(default)]
    pub source: EventSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_calendar_email: Option<String>,
}

impl CalendarEvent {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// True for an expanded instance of a recurring series.
    pub fn is_occurrence(&self) -> bool {
        self.recurring_event_id.is_some()
    }

    /// Half-open interval intersection.
    pub fn overlaps(&self, other: &CalendarEvent) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }

    /// All members attending, primary member first, without duplicates.
    pub fn attendees(&self) -> Vec<&str> {
        let mut out = vec![self.member_id.as_str()];
        for id in self.member_ids.iter().flatten() {
            if !out.contains(&id.as_str()) {
                out.push(id.as_str());
            }
        }
        out
    }

    /// True if any part of the event falls on `date` in `tz`.
    pub fn occurs_on<Tz: TimeZone>(&self, date: NaiveDate, tz: &Tz) -> bool {
        match day_bounds(date, tz) {
            Some((day_start, day_end)) => self.intersects(day_start, day_end),
            None => false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        if self.member_id.trim().is_empty() {
            return Err(ValidationError::MissingField("memberId"));
        }
        if self.start >= self.end {
            return Err(ValidationError::InvalidTimeRange(format!(
                "start {} is not before end {}",
                self.start.to_rfc3339(),
                self.end.to_rfc3339()
            )));
        }
        if let Some(rule) = &self.recurrence {
            rule.validate()?;
        }
        Ok(())
    }
}

/// UTC bounds of a local calendar day. `None` only for impossible local times.
pub fn day_bounds<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = tz
        .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .earliest()?
        .with_timezone(&Utc);
    let next = date.succ_opt()?;
    let end = tz
        .from_local_datetime(&next.and_hms_opt(0, 0, 0)?)
        .earliest()?
        .with_timezone(&Utc);
    Some((start, end))
}

/// Input for creating an event; id and source are assigned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub priority: Priority,
    pub member_id: String,
    #[serde(default)]
    pub member_ids: Option<Vec<String>>,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub recurrence: Option<RecurrenceRule>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub ai_tip: Option<String>,
}

impl NewEvent {
    pub fn new(
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        member_id: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            start,
            end,
            category: Category::Other,
            priority: Priority::Medium,
            member_id: member_id.into(),
            member_ids: None,
            emoji: None,
            description: None,
            location: None,
            is_all_day: false,
            recurrence: None,
            reminders: Vec::new(),
            ai_tip: None,
        }
    }

    pub fn into_event(self, id: String) -> CalendarEvent {
        let emoji = self
            .emoji
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| self.category.default_emoji().to_string());
        CalendarEvent {
            id,
            title: self.title.trim().to_string(),
            start: self.start,
            end: self.end,
            category: self.category,
            priority: self.priority,
            member_id: self.member_id,
            member_ids: self.member_ids,
            emoji,
            description: self.description,
            location: self.location,
            is_all_day: self.is_all_day,
            recurrence: self.recurrence,
            recurring_event_id: None,
            color: None,
            attachments: Vec::new(),
            reminders: self.reminders,
            ai_tip: self.ai_tip,
            source: EventSource::CalAi,
            source_calendar_email: None,
        }
    }
}

/// Partial update; only `Some` fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    pub title: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub member_id: Option<String>,
    pub member_ids: Option<Vec<String>>,
    pub emoji: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub is_all_day: Option<bool>,
    pub recurrence: Option<RecurrenceRule>,
    pub color: Option<String>,
    pub ai_tip: Option<String>,
}

impl EventPatch {
    pub fn times(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, event: &mut CalendarEvent) {
        if let Some(v) = &self.title {
            event.title = v.trim().to_string();
        }
        if let Some(v) = self.start {
            event.start = v;
        }
        if let Some(v) = self.end {
            event.end = v;
        }
        if let Some(v) = self.category {
            event.category = v;
        }
        if let Some(v) = self.priority {
            event.priority = v;
        }
        if let Some(v) = &self.member_id {
            event.member_id = v.clone();
        }
        if let Some(v) = &self.member_ids {
            event.member_ids = Some(v.clone());
        }
        if let Some(v) = &self.emoji {
            event.emoji = v.clone();
        }
        if let Some(v) = &self.description {
            event.description = Some(v.clone());
        }
        if let Some(v) = &self.location {
            event.location = Some(v.clone());
        }
        if let Some(v) = self.is_all_day {
            event.is_all_day = v;
        }
        if let Some(v) = &self.recurrence {
            event.recurrence = Some(v.clone());
        }
        if let Some(v) = &self.color {
            event.color = Some(v.clone());
        }
        if let Some(v) = &self.ai_tip {
            event.ai_tip = Some(v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 9, h, m, 0).unwrap()
    }

    fn event(start: DateTime<Utc>, end: DateTime<Utc>) -> CalendarEvent {
        NewEvent::new("Standup", start, end, "1").into_event("e1".to_string())
    }

    #[test]
    fn test_event_json_shape() {
        let json = r#"{
            "id": "abc",
            "title": "Team Standup",
            "start": "2025-10-09T09:00:00.000Z",
            "end": "2025-10-09T09:30:00.000Z",
            "category": "work",
            "priority": "medium",
            "memberId": "1",
            "emoji": "💼",
            "source": "cal_ai"
        }"#;
        let parsed: CalendarEvent = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.category, Category::Work);
        assert_eq!(parsed.duration(), Duration::minutes(30));
        assert!(!parsed.is_all_day);

        let out = serde_json::to_string(&parsed).unwrap();
        assert!(out.contains("\"memberId\":\"1\""));
        assert!(!out.contains("recurringEventId"));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let e = event(at(10, 0), at(9, 0));
        assert!(matches!(e.validate(), Err(ValidationError::InvalidTimeRange(_))));
        let e = event(at(9, 0), at(9, 0));
        assert!(e.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_title() {
        let mut e = event(at(9, 0), at(10, 0));
        e.title = "  ".to_string();
        assert!(matches!(e.validate(), Err(ValidationError::MissingField("title"))));
    }

    #[test]
    fn test_recurrence_validation() {
        let mut rule = RecurrenceRule::new(Frequency::Weekly);
        rule.days_of_week = Some(vec![]);
        assert!(rule.validate().is_err());
        rule.days_of_week = Some(vec![1, 3]);
        assert!(rule.validate().is_ok());
        rule.interval = 0;
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_overlap_is_half_open() {
        let a = event(at(9, 0), at(10, 0));
        let b = event(at(10, 0), at(11, 0));
        let c = event(at(9, 30), at(10, 30));
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_new_event_defaults_emoji_from_category() {
        let mut draft = NewEvent::new("Dentist", at(9, 0), at(10, 0), "2");
        draft.category = Category::Medical;
        let e = draft.into_event("x".to_string());
        assert_eq!(e.emoji, "🩺");
        assert_eq!(e.source, EventSource::CalAi);
    }

    #[test]
    fn test_patch_applies_only_some_fields() {
        let mut e = event(at(9, 0), at(10, 0));
        let patch = EventPatch {
            title: Some("Retro".to_string()),
            ..Default::default()
        };
        patch.apply(&mut e);
        assert_eq!(e.title, "Retro");
        assert_eq!(e.start, at(9, 0));
        assert!(EventPatch::default().is_empty());
    }

    #[test]
    fn test_attendees_deduplicated() {
        let mut e = event(at(9, 0), at(10, 0));
        e.member_ids = Some(vec!["1".into(), "2".into(), "2".into()]);
        assert_eq!(e.attendees(), vec!["1", "2"]);
    }

    #[test]
    fn test_category_parse_is_lenient() {
        assert_eq!(Category::parse(" Work "), Some(Category::Work));
        assert_eq!(Category::parse("unknown"), None);
        assert_eq!(Category::ALL.len(), 26);
    }

    #[test]
    fn test_occurs_on_respects_timezone() {
        // 22:30 UTC on Oct 9 is Oct 10 in Jerusalem (UTC+3)
        let e = event(at(22, 30), at(23, 0));
        let tz = chrono_tz::Asia::Jerusalem;
        let oct9 = NaiveDate::from_ymd_opt(2025, 10, 9).unwrap();
        let oct10 = NaiveDate::from_ymd_opt(2025, 10, 10).unwrap();
        assert!(!e.occurs_on(oct9, &tz));
        assert!(e.occurs_on(oct10, &tz));
    }
}
