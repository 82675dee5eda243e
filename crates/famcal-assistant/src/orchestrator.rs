//! Chat turn handling: prompt, model call, tool execution, transcript.

use std::sync::Arc;

use chrono::{Duration, Utc};
use famcal_calendar::{CalendarEvent, EventService};
use famcal_core::{keys, Config, KeyValueStore, KeyValueStoreExt, Language};
use famcal_tasks::{Task, TaskService, WorkingHours};
use parking_lot::Mutex;
use tracing::{info, instrument, warn};

use crate::error::{AssistantError, AssistantResult};
use crate::executor::ToolExecutor;
use crate::history::{ChatFragment, ChatHistory, ChatMessage, ChatRole};
use crate::llm::ModelClient;
use crate::prompt::{build_system_prompt, PromptContext};
use crate::response::parse_model_response;

/// Days of upcoming events included in the prompt.
const CONTEXT_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantState {
    Idle,
    AwaitingResponse,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantReply {
    pub content: String,
    /// `✓ …` or `✗ Error: …`, one per tool call
    pub results: Vec<String>,
    pub followup_buttons: Vec<String>,
    pub fragments: Vec<ChatFragment>,
}

/// Resets the state to idle however the turn ends.
struct PendingTurn<'a>(&'a Mutex<AssistantState>);

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        *self.0.lock() = AssistantState::Idle;
    }
}

pub struct Assistant {
    model: ModelClient,
    executor: ToolExecutor,
    events: EventService,
    tasks: TaskService,
    kv: Arc<dyn KeyValueStore>,
    history: Mutex<ChatHistory>,
    state: Mutex<AssistantState>,
    language: Language,
}

impl Assistant {
    pub fn new(
        model: ModelClient,
        events: EventService,
        tasks: TaskService,
        kv: Arc<dyn KeyValueStore>,
        config: &Config,
    ) -> Self {
        let history = ChatHistory::load(
            kv.clone(),
            config.assistant.max_history_messages,
            config.assistant.history_max_age_days,
        );
        Self {
            model,
            executor: ToolExecutor::new(
                events.clone(),
                tasks.clone(),
                WorkingHours::from_config(&config.calendar),
            ),
            events,
            tasks,
            kv,
            history: Mutex::new(history),
            state: Mutex::new(AssistantState::Idle),
            language: config.calendar.language,
        }
    }

    /// Build the model client from config and stored API keys.
    pub fn from_config(
        config: &Config,
        events: EventService,
        tasks: TaskService,
        kv: Arc<dyn KeyValueStore>,
    ) -> AssistantResult<Self> {
        let model = ModelClient::from_config(
            &config.assistant,
            kv.as_ref(),
            config.retry.to_retry_config(),
        )?;
        Ok(Self::new(model, events, tasks, kv, config))
    }

    pub fn state(&self) -> AssistantState {
        *self.state.lock()
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().messages().to_vec()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    fn begin_turn(&self) -> AssistantResult<PendingTurn<'_>> {
        let mut state = self.state.lock();
        if *state == AssistantState::AwaitingResponse {
            return Err(AssistantError::Busy);
        }
        *state = AssistantState::AwaitingResponse;
        Ok(PendingTurn(&self.state))
    }

    async fn context_events(&self) -> Vec<CalendarEvent> {
        let start = Utc::now() - Duration::hours(1);
        let end = start + Duration::days(CONTEXT_DAYS);
        if let Err(e) = self.events.load_events(start, end).await {
            warn!("Using cached events for the prompt: {}", e);
        }
        self.events.events_between(start, end)
    }

    async fn context_tasks(&self) -> Vec<Task> {
        self.tasks.list_open().await.unwrap_or_else(|e| {
            warn!("Prompt built without tasks: {}", e);
            Vec::new()
        })
    }

    /// Send one user message and apply whatever the model asks for.
    ///
    /// Tool calls run one by one; a failing call is reported in `results`
    /// and does not stop the others. Returns [`AssistantError::Busy`] while
    /// a previous message is still in flight.
    #[instrument(skip_all, fields(chars = text.len()))]
    pub async fn send(&self, text: &str) -> AssistantResult<AssistantReply> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AssistantError::Other(anyhow::anyhow!("Message is empty")));
        }
        let _turn = self.begin_turn()?;

        let now = Utc::now();
        let transcript = {
            let mut history = self.history.lock();
            history.push(ChatMessage::new(ChatRole::User, text, now));
            history.messages().to_vec()
        };

        let events = self.context_events().await;
        let tasks = self.context_tasks().await;
        let family = self.kv.get(keys::FAMILY).unwrap_or_else(|e| {
            warn!("Failed to read family: {}", e);
            None
        });
        let system = build_system_prompt(&PromptContext {
            now,
            tz: self.events.timezone(),
            language: self.language,
            family: family.as_ref(),
            events: &events,
            tasks: &tasks,
        });

        let raw = self.model.generate(&system, &transcript).await?;
        let parsed = parse_model_response(&raw);
        info!(
            tool_calls = parsed.tool_calls.len(),
            rejected = parsed.rejected.len(),
            "Model replied"
        );

        let mut reply = AssistantReply {
            content: parsed.content,
            followup_buttons: parsed.followup_buttons,
            ..Default::default()
        };
        for rejected in &parsed.rejected {
            reply.results.push(format!("✗ Error: {rejected}"));
        }
        for call in parsed.tool_calls {
            let name = call.name();
            match self.executor.execute(call).await {
                Ok(outcome) => {
                    reply.results.push(format!("✓ {}", outcome.summary));
                    reply.fragments.extend(outcome.fragment);
                }
                Err(e) => {
                    warn!(tool = name, "Tool call failed: {}", e);
                    reply.results.push(format!("✗ Error: {}", e.user_message()));
                }
            }
        }

        if !reply.followup_buttons.is_empty() {
            if let Err(e) = self.kv.set(keys::EVENT_SUGGESTIONS, &reply.followup_buttons) {
                warn!("Failed to save follow-up suggestions: {}", e);
            }
        }

        let mut message = ChatMessage::new(ChatRole::Assistant, transcript_text(&reply), Utc::now());
        message.fragments = reply.fragments.clone();
        self.history.lock().push(message);

        Ok(reply)
    }
}

fn transcript_text(reply: &AssistantReply) -> String {
    let mut text = reply.content.clone();
    if !reply.results.is_empty() {
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(&reply.results.join("\n"));
    }
    text
}
