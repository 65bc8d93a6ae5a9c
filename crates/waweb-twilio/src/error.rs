use thiserror::Error;

use waweb_core::WawebError;

/// Errors from the WhatsApp messaging gateway.
#[derive(Debug, Error)]
pub enum TwilioError {
    /// Account SID, auth token or sender number is missing.
    #[error("Twilio not configured: {0}")]
    Configuration(String),

    /// An inbound webhook payload lacks a required field.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// The request never got a usable HTTP response (connect, timeout, body).
    #[error("Twilio request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Twilio answered with a non-2xx status.
    #[error("Twilio API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },
}

impl From<TwilioError> for WawebError {
    fn from(e: TwilioError) -> Self {
        match e {
            TwilioError::Configuration(msg) => WawebError::Configuration(msg),
            TwilioError::MalformedPayload(msg) => WawebError::MalformedPayload(msg),
            other => WawebError::Upstream(other.to_string()),
        }
    }
}
