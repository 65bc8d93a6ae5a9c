use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use waweb_core::WawebError;

/// JSON error returned by the REST routes: `{"error": ..., "code": ...}`.
///
/// The message is always a fixed public string; details stay in the logs.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }
}

impl From<WawebError> for ApiError {
    fn from(e: WawebError) -> Self {
        let status = match &e {
            WawebError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            WawebError::Upstream(_) => StatusCode::BAD_GATEWAY,
            WawebError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(code = e.code(), error = %e, "request failed");
        Self {
            status,
            code: e.code(),
            message: e.public_message().to_string(),
        }
    }
}

impl From<waweb_agent::AgentError> for ApiError {
    fn from(e: waweb_agent::AgentError) -> Self {
        WawebError::from(e).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "error": self.message, "code": self.code })),
        )
            .into_response()
    }
}
