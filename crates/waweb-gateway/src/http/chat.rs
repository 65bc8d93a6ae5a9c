//! REST chat endpoints for testing without WhatsApp.
//!
//! Request:  `POST /api/chat {"message": "hello", "user_id": "optional"}`
//! Response: `{"reply", "user_id", "message_type", "chat_history_length", "has_github_token"}`
//! Error:    `{"error": "...", "code": "..."}`

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use waweb_agent::process_message;
use waweb_sessions::HistorySnapshot;

use crate::app::AppState;
use crate::http::error::ApiError;

/// Session key used when the caller does not name one.
pub const DEFAULT_API_USER: &str = "api_user";

#[derive(Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub message: String,
    pub user_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub user_id: String,
    pub message_type: &'static str,
    pub chat_history_length: usize,
    pub has_github_token: bool,
}

/// POST /api/chat: run one message through the shared pipeline.
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(body) = body.map_err(|e| {
        warn!(error = %e, "POST /api/chat: invalid JSON");
        ApiError::bad_request("Invalid JSON payload")
    })?;

    let message = body.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }
    let user_id = body
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(DEFAULT_API_USER)
        .to_string();
    let user_tag = state.user_tag(&user_id);

    info!(user_tag = %user_tag, len = message.len(), "POST /api/chat");

    let out = process_message(&state.ai, &state.sessions, &user_id, &user_tag, message).await?;

    Ok(Json(ChatReply {
        reply: out.reply,
        user_id,
        message_type: out.kind.as_str(),
        chat_history_length: out.history_len,
        has_github_token: out.has_token,
    }))
}

/// GET /api/chat/history/{user_id}: unknown ids get an empty history.
/// `has_github_token` counts the operator default, as `/api/chat` does.
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<HistorySnapshot> {
    let mut snapshot = state.sessions.snapshot(&user_id);
    snapshot.has_token |= state.ai.has_default_token();
    Json(snapshot)
}

/// DELETE /api/chat/clear/{user_id}: idempotent; the linked token survives.
pub async fn clear_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<Value> {
    state.sessions.clear(&user_id);
    info!(user_tag = %state.user_tag(&user_id), "chat history cleared");
    Json(json!({ "message": "Chat history cleared", "user_id": user_id }))
}
