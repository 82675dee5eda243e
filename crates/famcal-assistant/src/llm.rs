//! Hosted model clients (Gemini and Azure OpenAI).

use std::time::Duration;

use famcal_core::{
    keys, with_retry, AssistantConfig, KeyValueStore, KeyValueStoreExt, LlmError, LlmProvider,
    RetryConfig, StoreKey,
};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::error::AssistantResult;
use crate::history::{ChatMessage, ChatRole};

const DEFAULT_TEMPERATURE: f32 = 0.4;
/// Error bodies longer than this are cut before logging.
const MAX_ERROR_BODY: usize = 500;

fn build_http_client(config: &AssistantConfig) -> AssistantResult<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?)
}

/// Map a non-success response into a model error.
async fn handle_error_status(response: Response) -> LlmError {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return LlmError::RateLimited;
    }
    let mut message = response.text().await.unwrap_or_default();
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    LlmError::RequestFailed {
        status: status.as_u16(),
        message,
    }
}

// Gemini wire types

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    retry: RetryConfig,
}

impl GeminiClient {
    pub fn new(
        config: &AssistantConfig,
        api_key: impl Into<String>,
        retry: RetryConfig,
    ) -> AssistantResult<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            api_key: api_key.into(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            retry,
        })
    }

    #[instrument(skip_all, fields(model = %self.model, messages = history.len()))]
    pub async fn generate(&self, system: &str, history: &[ChatMessage]) -> AssistantResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );
        let body = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: system }],
            },
            contents: history
                .iter()
                .map(|m| GeminiContent {
                    role: Some(match m.role {
                        ChatRole::User => "user",
                        ChatRole::Assistant => "model",
                    }),
                    parts: vec![GeminiPart { text: &m.content }],
                })
                .collect(),
            generation_config: json!({ "temperature": DEFAULT_TEMPERATURE }),
        };

        let response = with_retry(&self.retry, || {
            self.client
                .post(&url)
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
                .send()
        })
        .await?;

        if !response.status().is_success() {
            return Err(handle_error_status(response).await.into());
        }

        let parsed: GeminiResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }
        debug!(chars = text.len(), "Gemini answered");
        Ok(text)
    }
}

// Azure OpenAI wire types

#[derive(Debug, Serialize)]
struct AzureMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AzureRequest<'a> {
    messages: Vec<AzureMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct AzureResponse {
    #[serde(default)]
    choices: Vec<AzureChoice>,
}

#[derive(Debug, Deserialize)]
struct AzureChoice {
    message: AzureResponseMessage,
}

#[derive(Debug, Deserialize)]
struct AzureResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct AzureOpenAiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    deployment: String,
    api_version: String,
    retry: RetryConfig,
}

impl AzureOpenAiClient {
    pub fn new(
        config: &AssistantConfig,
        api_key: impl Into<String>,
        retry: RetryConfig,
    ) -> AssistantResult<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            api_key: api_key.into(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            deployment: config.model.clone(),
            api_version: config.azure_api_version.clone(),
            retry,
        })
    }

    #[instrument(skip_all, fields(deployment = %self.deployment, messages = history.len()))]
    pub async fn generate(&self, system: &str, history: &[ChatMessage]) -> AssistantResult<String> {
        let url = format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint, self.deployment
        );
        let mut messages = vec![AzureMessage {
            role: "system",
            content: system,
        }];
        messages.extend(history.iter().map(|m| AzureMessage {
            role: match m.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            },
            content: &m.content,
        }));
        let body = AzureRequest {
            messages,
            temperature: DEFAULT_TEMPERATURE,
        };

        let response = with_retry(&self.retry, || {
            self.client
                .post(&url)
                .query(&[("api-version", self.api_version.as_str())])
                .header("api-key", &self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        if !response.status().is_success() {
            return Err(handle_error_status(response).await.into());
        }

        let parsed: AzureResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }
        debug!(chars = text.len(), "Azure OpenAI answered");
        Ok(text)
    }
}

/// The configured model backend.
pub enum ModelClient {
    Gemini(GeminiClient),
    AzureOpenAi(AzureOpenAiClient),
}

const GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";
const AZURE_KEY_ENV: &str = "AZURE_OPENAI_API_KEY";

/// Stored key first, then the environment.
fn resolve_api_key(kv: &dyn KeyValueStore, key: StoreKey<String>, env_var: &str) -> Option<String> {
    let stored = match kv.get(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", key.name(), e);
            None
        }
    };
    let non_blank = |k: String| {
        let k = k.trim().to_string();
        (!k.is_empty()).then_some(k)
    };
    stored
        .and_then(non_blank)
        .or_else(|| std::env::var(env_var).ok().and_then(non_blank))
}

impl ModelClient {
    pub fn from_config(
        config: &AssistantConfig,
        kv: &dyn KeyValueStore,
        retry: RetryConfig,
    ) -> AssistantResult<Self> {
        let client = match config.provider {
            LlmProvider::Gemini => {
                let key = resolve_api_key(kv, keys::GEMINI_API_KEY, GEMINI_KEY_ENV)
                    .ok_or(LlmError::MissingApiKey("Gemini"))?;
                ModelClient::Gemini(GeminiClient::new(config, key, retry)?)
            }
            LlmProvider::AzureOpenAi => {
                let key = resolve_api_key(kv, keys::AZURE_OPENAI_API_KEY, AZURE_KEY_ENV)
                    .ok_or(LlmError::MissingApiKey("Azure OpenAI"))?;
                ModelClient::AzureOpenAi(AzureOpenAiClient::new(config, key, retry)?)
            }
        };
        info!(provider = ?config.provider, model = %config.model, "Model client ready");
        Ok(client)
    }

    pub async fn generate(&self, system: &str, history: &[ChatMessage]) -> AssistantResult<String> {
        match self {
            ModelClient::Gemini(c) => c.generate(system, history).await,
            ModelClient::AzureOpenAi(c) => c.generate(system, history).await,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::error::AssistantError;
    use chrono::Utc;
    use famcal_core::MemoryKvStore;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(provider: LlmProvider, endpoint: &str, model: &str) -> AssistantConfig {
        AssistantConfig {
            provider,
            model: model.to_string(),
            endpoint: endpoint.to_string(),
            azure_api_version: "2024-06-01".to_string(),
            request_timeout_secs: 5,
            max_history_messages: 100,
            history_max_age_days: 30,
        }
    }

    fn history() -> Vec<ChatMessage> {
        vec![
            ChatMessage::new(ChatRole::User, "Plan my week", Utc::now()),
            ChatMessage::new(ChatRole::Assistant, "Sure", Utc::now()),
            ChatMessage::new(ChatRole::User, "Thanks", Utc::now()),
        ]
    }

    #[tokio::test]
    async fn test_gemini_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(query_param("key", "secret"))
            .and(body_partial_json(json!({
                "systemInstruction": { "parts": [{ "text": "SYSTEM" }] },
                "contents": [
                    { "role": "user", "parts": [{ "text": "Plan my week" }] },
                    { "role": "model", "parts": [{ "text": "Sure" }] },
                    { "role": "user", "parts": [{ "text": "Thanks" }] }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "role": "model", "parts": [{ "text": "Hello " }, { "text": "there" }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = config(LlmProvider::Gemini, &server.uri(), "gemini-2.0-flash");
        let client = GeminiClient::new(&cfg, "secret", RetryConfig::none()).unwrap();
        let text = client.generate("SYSTEM", &history()).await.unwrap();
        assert_eq!(text, "Hello there");
    }

    #[tokio::test]
    async fn test_azure_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/gpt-4o/chat/completions"))
            .and(query_param("api-version", "2024-06-01"))
            .and(header("api-key", "azure-secret"))
            .and(body_partial_json(json!({
                "messages": [
                    { "role": "system", "content": "SYSTEM" },
                    { "role": "user", "content": "Plan my week" },
                    { "role": "assistant", "content": "Sure" },
                    { "role": "user", "content": "Thanks" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Done" } }]
            })))
            .mount(&server)
            .await;

        let cfg = config(LlmProvider::AzureOpenAi, &server.uri(), "gpt-4o");
        let client = AzureOpenAiClient::new(&cfg, "azure-secret", RetryConfig::none()).unwrap();
        assert_eq!(client.generate("SYSTEM", &history()).await.unwrap(), "Done");
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let cfg = config(LlmProvider::Gemini, &server.uri(), "m");
        let client = GeminiClient::new(&cfg, "k", RetryConfig::none()).unwrap();
        let err = client.generate("s", &history()).await.unwrap_err();
        assert!(matches!(err, AssistantError::Llm(LlmError::RateLimited)));
    }

    #[tokio::test]
    async fn test_server_error_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(2)
            .mount(&server)
            .await;

        let cfg = config(LlmProvider::Gemini, &server.uri(), "m");
        let client = GeminiClient::new(&cfg, "k", RetryConfig::new(1, 1, 5)).unwrap();
        match client.generate("s", &history()).await.unwrap_err() {
            AssistantError::Llm(LlmError::RequestFailed { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "overloaded");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let cfg = config(LlmProvider::Gemini, &server.uri(), "m");
        let client = GeminiClient::new(&cfg, "k", RetryConfig::none()).unwrap();
        let err = client.generate("s", &history()).await.unwrap_err();
        assert!(matches!(err, AssistantError::Llm(LlmError::EmptyResponse)));
    }

    #[test]
    fn test_api_key_from_store() {
        let kv = MemoryKvStore::new();
        kv.set(keys::AZURE_OPENAI_API_KEY, &" stored ".to_string()).unwrap();
        let cfg = config(LlmProvider::AzureOpenAi, "http://localhost", "gpt");
        let client = ModelClient::from_config(&cfg, &kv, RetryConfig::none()).unwrap();
        match client {
            ModelClient::AzureOpenAi(c) => assert_eq!(c.api_key, "stored"),
            ModelClient::Gemini(_) => panic!("wrong provider"),
        }
    }

    #[test]
    fn test_empty_stored_key_is_missing() {
        let kv = MemoryKvStore::new();
        kv.set(keys::GEMINI_API_KEY, &"   ".to_string()).unwrap();
        let stored = resolve_api_key(&kv, keys::GEMINI_API_KEY, "FAMCAL_TEST_UNSET_KEY_VAR");
        assert!(stored.is_none());
    }
}
