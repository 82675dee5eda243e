//! Which Google calendar belongs to which family member.

use famcal_core::{KeyValueStore, KeyValueStoreExt, StoreKey};
use serde::{Deserialize, Serialize};

pub const CALENDAR_MAPPING: StoreKey<CalendarMemberMapping> =
    StoreKey::new("google_calendar_mapping");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedCalendar {
    pub calendar_id: String,
    pub member_id: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

impl MappedCalendar {
    pub fn new(calendar_id: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            member_id: member_id.into(),
            enabled: true,
        }
    }
}

/// Calendar id → member id, persisted in the key-value store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarMemberMapping {
    calendars: Vec<MappedCalendar>,
}

impl CalendarMemberMapping {
    pub fn load(store: &dyn KeyValueStore) -> anyhow::Result<Self> {
        Ok(store.get(CALENDAR_MAPPING)?.unwrap_or_default())
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> anyhow::Result<()> {
        store.set(CALENDAR_MAPPING, self)
    }

    /// Link a calendar to a member, replacing any previous link.
    pub fn assign(&mut self, calendar_id: &str, member_id: &str) {
        match self.calendars.iter_mut().find(|c| c.calendar_id == calendar_id) {
            Some(existing) => {
                existing.member_id = member_id.to_string();
                existing.enabled = true;
            }
            None => self
                .calendars
                .push(MappedCalendar::new(calendar_id, member_id)),
        }
    }

    pub fn unassign(&mut self, calendar_id: &str) -> bool {
        let before = self.calendars.len();
        self.calendars.retain(|c| c.calendar_id != calendar_id);
        self.calendars.len() != before
    }

    pub fn set_enabled(&mut self, calendar_id: &str, enabled: bool) -> bool {
        match self.calendars.iter_mut().find(|c| c.calendar_id == calendar_id) {
            Some(c) => {
                c.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, calendar_id: &str) -> Option<&MappedCalendar> {
        self.calendars.iter().find(|c| c.calendar_id == calendar_id)
    }

    pub fn member_for(&self, calendar_id: &str) -> Option<&str> {
        self.get(calendar_id).map(|c| c.member_id.as_str())
    }

    /// Calendars included in a pull.
    pub fn enabled(&self) -> impl Iterator<Item = &MappedCalendar> {
        self.calendars.iter().filter(|c| c.enabled)
    }

    /// Drop links to a member that left the family.
    pub fn remove_member(&mut self, member_id: &str) {
        self.calendars.retain(|c| c.member_id != member_id);
    }

    pub fn is_empty(&self) -> bool {
        self.calendars.is_empty()
    }
}
