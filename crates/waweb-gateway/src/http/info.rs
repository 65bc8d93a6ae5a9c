use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /: service metadata and the route list.
pub async fn info_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "service": "WhatsApp AI Coding Assistant",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "model": state.ai.model(),
        "reply_mode": state.config.twilio.reply_mode,
        "endpoints": {
            "webhook": "/webhook (POST) - Twilio WhatsApp webhook",
            "chat": "/api/chat (POST) - Chat with the assistant over REST",
            "chat_history": "/api/chat/history/{user_id} (GET) - Get chat history",
            "clear_history": "/api/chat/clear/{user_id} (DELETE) - Clear chat history",
            "health": "/health (GET) - Health check",
        },
    }))
}
