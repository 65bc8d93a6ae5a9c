use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness check. Reports whether credentials are present;
/// nothing is sent upstream.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.len(),
        "services": {
            "gemini": configured(state.ai.is_configured()),
            "twilio": configured(state.messenger.is_configured()),
        },
    }))
}

fn configured(ok: bool) -> &'static str {
    if ok {
        "configured"
    } else {
        "not_configured"
    }
}
