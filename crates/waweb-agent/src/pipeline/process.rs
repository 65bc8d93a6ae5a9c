use serde::Serialize;
use tracing::info;

use waweb_core::Role;
use waweb_sessions::SessionStore;

use crate::classify::{classify, Classified, REDACTED_TOKEN_TURN, TOKEN_CONFIRMATION};
use crate::error::AgentError;
use crate::format::format_for_chat;
use crate::runtime::AiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    TokenSubmission,
    Chat,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::TokenSubmission => "token_submission",
            MessageKind::Chat => "chat",
        }
    }
}

/// Result of one completed pipeline turn.
#[derive(Debug, Clone)]
pub struct ProcessedMessage {
    /// Text to deliver to the user, already formatted for chat.
    pub reply: String,
    pub kind: MessageKind,
    /// History length after this turn was recorded.
    pub history_len: usize,
    pub has_token: bool,
}

/// Run one inbound message through classification, history and the model.
///
/// Token submissions never reach the provider: the token is stored, a
/// redacted user turn and the fixed confirmation are recorded, and the
/// confirmation is returned. Ordinary messages record the user turn before
/// the model call, so a failed call still leaves it in history.
pub async fn process_message(
    ai: &AiClient,
    sessions: &SessionStore,
    user_id: &str,
    user_tag: &str,
    text: &str,
) -> Result<ProcessedMessage, AgentError> {
    match classify(text) {
        Classified::TokenSubmission { token } => {
            sessions.set_token(user_id, &token);
            sessions.append_turn(user_id, Role::User, REDACTED_TOKEN_TURN);
            let history_len = sessions.append_turn(user_id, Role::Assistant, TOKEN_CONFIRMATION);
            info!(user_tag, "token stored");
            Ok(ProcessedMessage {
                reply: TOKEN_CONFIRMATION.to_string(),
                kind: MessageKind::TokenSubmission,
                history_len,
                has_token: true,
            })
        }
        Classified::Ordinary(text) => {
            sessions.append_turn(user_id, Role::User, &text);
            let history = sessions.get_history(user_id);
            let token = sessions.get_token(user_id);

            let raw = ai
                .generate_reply(user_tag, &text, &history, token.as_deref())
                .await?;
            let reply = format_for_chat(&raw);
            let history_len = sessions.append_turn(user_id, Role::Assistant, &reply);

            info!(user_tag, history_len, reply_len = reply.len(), "pipeline: chat complete");
            Ok(ProcessedMessage {
                reply,
                kind: MessageKind::Chat,
                history_len,
                has_token: ai.effective_token(token.as_deref()).is_some(),
            })
        }
    }
}
