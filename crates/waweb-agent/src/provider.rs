use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use waweb_core::Role;

/// A single message in the conversation sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Tool definition sent to the LLM API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub input_schema: serde_json::Value,
}

/// A tool call extracted from the LLM response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
    /// Opaque provider state that must be echoed back with the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    /// Plain text system instruction.
    pub system: String,
    /// Oldest first; the last entry is the message being answered.
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Tools to expose to the model. Empty means plain chat.
    pub tools: Vec<ToolDefinition>,
    /// Provider-native conversation entries built by the tool loop.
    /// Overrides `messages` when set.
    pub raw_messages: Option<Vec<serde_json::Value>>,
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    /// `"tool_use"` when the model is waiting on tool results.
    pub stop_reason: String,
    /// Tool calls requested by the model. Empty when none.
    pub tool_calls: Vec<ToolCall>,
}

/// Common interface for language-model backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// False for stand-ins that can never answer.
    fn is_configured(&self) -> bool {
        true
    }

    /// Send a non-streaming chat request, wait for full response.
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// No credential was configured for this provider.
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Stand-in used when no API key is configured.
///
/// Startup succeeds without credentials; the first request fails with a
/// configuration error instead.
pub struct UnconfiguredProvider;

#[async_trait]
impl LlmProvider for UnconfiguredProvider {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            "no Gemini API key configured; set GEMINI_API_KEY or agent.api_key".into(),
        ))
    }
}
