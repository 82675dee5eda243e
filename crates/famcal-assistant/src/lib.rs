//! Chat assistant: turns family requests into calendar and task changes
//! through a hosted language model.

pub mod error;
pub mod executor;
pub mod history;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod response;
pub mod tools;

pub use error::{AssistantError, AssistantResult};
pub use executor::{ToolExecutor, ToolOutcome};
pub use history::{ChatFragment, ChatHistory, ChatMessage, ChatRole, CHAT_HISTORY};
pub use llm::{AzureOpenAiClient, GeminiClient, ModelClient};
pub use orchestrator::{Assistant, AssistantReply, AssistantState};
pub use prompt::{build_system_prompt, PromptContext};
pub use response::{parse_model_response, ParsedResponse};
pub use tools::{ToolCall, ToolCallError, TOOL_NAMES};
