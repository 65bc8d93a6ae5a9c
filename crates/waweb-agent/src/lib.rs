pub mod classify;
pub mod error;
pub mod format;
pub mod gemini;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod runtime;
pub mod tools;

pub use classify::{classify, Classified, REDACTED_TOKEN_TURN, TOKEN_CONFIRMATION};
pub use error::AgentError;
pub use format::format_for_chat;
pub use pipeline::{process_message, MessageKind, ProcessedMessage};
pub use provider::{
    ChatRequest, ChatResponse, LlmProvider, Message, ProviderError, ToolCall, ToolDefinition,
};
pub use runtime::AiClient;
pub use tools::github::GithubClient;
