//! Chat transcript with bounded retention, persisted after each change.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use famcal_calendar::CalendarEvent;
use famcal_core::{KeyValueStore, KeyValueStoreExt, StoreKey};
use famcal_tasks::{PriorityAnalysis, Task, WeeklyPlan};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const CHAT_HISTORY: StoreKey<Vec<ChatMessage>> = StoreKey::new("ai_chat_history");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Rich content rendered inline under an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatFragment {
    EventCard { event: CalendarEvent },
    TaskList { tasks: Vec<Task> },
    PriorityAnalysis { analyses: Vec<PriorityAnalysis> },
    WeeklyPlan { plan: WeeklyPlan },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fragments: Vec<ChatFragment>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp,
            fragments: Vec::new(),
        }
    }
}

pub struct ChatHistory {
    kv: Arc<dyn KeyValueStore>,
    messages: Vec<ChatMessage>,
    max_messages: usize,
    max_age: Duration,
}

impl ChatHistory {
    /// Load the stored transcript, dropping anything outside retention.
    pub fn load(kv: Arc<dyn KeyValueStore>, max_messages: usize, max_age_days: u32) -> Self {
        let messages = match kv.get(CHAT_HISTORY) {
            Ok(messages) => messages.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to load chat history: {}", e);
                Vec::new()
            }
        };
        let mut history = Self {
            kv,
            messages,
            max_messages,
            max_age: Duration::days(i64::from(max_age_days)),
        };
        history.prune(Utc::now());
        history
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push(&mut self, message: ChatMessage) {
        let now = message.timestamp.max(Utc::now());
        self.messages.push(message);
        self.prune(now);
        self.save();
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        if let Err(e) = self.kv.clear(CHAT_HISTORY) {
            warn!("Failed to clear chat history: {}", e);
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.max_age;
        self.messages.retain(|m| m.timestamp >= cutoff);
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }

    /// Persistence failures are logged; the in-memory transcript stays usable.
    fn save(&self) {
        if let Err(e) = self.kv.set(CHAT_HISTORY, &self.messages) {
            warn!("Failed to save chat history: {}", e);
        }
    }
}
