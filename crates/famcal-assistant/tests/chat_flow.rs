//! Full chat turns against a mocked Gemini endpoint.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use famcal_assistant::{
    Assistant, AssistantError, AssistantState, ChatFragment, ChatRole, GeminiClient, ModelClient,
};
use famcal_calendar::{EventService, SqliteEventStore};
use famcal_core::{keys, Config, KeyValueStore, KeyValueStoreExt, MemoryKvStore, RetryConfig};
use famcal_tasks::{SqliteTaskStore, TaskService};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

struct Harness {
    assistant: Assistant,
    events: EventService,
    tasks: TaskService,
    kv: Arc<dyn KeyValueStore>,
}

fn harness(server: &MockServer) -> Harness {
    let mut config = Config::default();
    config.calendar.timezone = "UTC".to_string();
    config.assistant.endpoint = server.uri();
    config.assistant.model = "gemini-2.0-flash".to_string();

    let events = EventService::new(SqliteEventStore::in_memory().unwrap(), &config.calendar);
    let tasks = TaskService::new(SqliteTaskStore::in_memory().unwrap());
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKvStore::new());
    let model = ModelClient::Gemini(
        GeminiClient::new(&config.assistant, "test-key", RetryConfig::none()).unwrap(),
    );
    let assistant = Assistant::new(model, events.clone(), tasks.clone(), kv.clone(), &config);
    Harness {
        assistant,
        events,
        tasks,
        kv,
    }
}

fn gemini_text(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    }))
}

#[tokio::test]
async fn create_meeting_persists_one_event_and_renders_card() {
    let server = MockServer::start().await;
    let answer = r#"Added your standup.
```json
{"tool": "create_meeting", "parameters": {"title": "Team Standup", "startTime": "2025-10-09T09:00:00.000Z", "endTime": "2025-10-09T09:30:00.000Z", "memberId": "1", "category": "work", "priority": "medium", "emoji": "💼"}}
```
{"followup_buttons": ["Make it weekly", "Add a reminder"]}"#;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(gemini_text(answer))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server);
    let reply = h.assistant.send("Add team standup tomorrow at 9").await.unwrap();

    assert_eq!(reply.content, "Added your standup.");
    assert_eq!(reply.results.len(), 1);
    assert!(reply.results[0].starts_with("✓ Created \"Team Standup\""));
    assert_eq!(reply.followup_buttons, vec!["Make it weekly", "Add a reminder"]);

    let day_start = Utc.with_ymd_and_hms(2025, 10, 9, 0, 0, 0).unwrap();
    let day_end = Utc.with_ymd_and_hms(2025, 10, 10, 0, 0, 0).unwrap();
    let stored = h.events.load_events(day_start, day_end).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Team Standup");
    assert_eq!(stored[0].emoji, "💼");

    let history = h.assistant.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, ChatRole::User);
    let cards: Vec<_> = history[1]
        .fragments
        .iter()
        .filter_map(|f| match f {
            ChatFragment::EventCard { event } => Some(event),
            _ => None,
        })
        .collect();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].title, "Team Standup");
    assert_eq!(cards[0].emoji, "💼");

    assert_eq!(
        h.kv.get(keys::EVENT_SUGGESTIONS).unwrap(),
        Some(vec!["Make it weekly".to_string(), "Add a reminder".to_string()])
    );
    assert_eq!(h.assistant.state(), AssistantState::Idle);
}

#[tokio::test]
async fn failing_tool_call_does_not_stop_the_rest() {
    let server = MockServer::start().await;
    let answer = r#"{"tool_calls": [
  {"tool": "move_meeting", "parameters": {"eventId": "missing", "newStartTime": "2025-10-09T10:00:00Z"}},
  {"tool": "add_task", "parameters": {"title": "Buy milk"}},
  {"tool": "launch_rocket", "parameters": {}}
]}"#;
    Mock::given(method("POST"))
        .respond_with(gemini_text(answer))
        .mount(&server)
        .await;

    let h = harness(&server);
    let reply = h.assistant.send("Do things").await.unwrap();

    assert_eq!(reply.results.len(), 3);
    assert!(reply.results.iter().any(|r| r == "✗ Error: Unknown tool: launch_rocket"));
    assert!(reply.results.iter().any(|r| r == "✗ Error: Event not found"));
    assert!(reply.results.iter().any(|r| r == "✓ Added task \"Buy milk\""));
    assert_eq!(h.tasks.list_open().await.unwrap().len(), 1);
}

#[tokio::test]
async fn second_message_while_waiting_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(gemini_text("Hello!").set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let h = harness(&server);
    let (first, second) = tokio::join!(h.assistant.send("hi"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.assistant.send("are you there?").await
    });

    assert_eq!(first.unwrap().content, "Hello!");
    assert!(matches!(second, Err(AssistantError::Busy)));
    assert_eq!(h.assistant.state(), AssistantState::Idle);
}

#[tokio::test]
async fn model_failure_keeps_user_message_and_resets_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let h = harness(&server);
    let err = h.assistant.send("hello").await.unwrap_err();
    assert!(err.user_message().contains("AI service"));
    assert_eq!(h.assistant.state(), AssistantState::Idle);

    let history = h.assistant.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "hello");
}
