//! Twilio WhatsApp webhook: POST /webhook
//!
//! Twilio posts each inbound WhatsApp message as a form. The handler always
//! answers 200 with TwiML so Twilio never retries; failures are logged and,
//! where possible, the user gets a short apology instead of silence.
//!
//! Reply delivery depends on `twilio.reply_mode`:
//!   - `api`: acknowledge with empty TwiML at once; a background task runs
//!     the pipeline and sends through the Messages API
//!   - `twiml`: put the reply chunks in the TwiML response itself

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Form,
};
use tracing::{error, info, warn};

use waweb_agent::process_message;
use waweb_core::config::ReplyMode;
use waweb_twilio::{
    parse_inbound, split_chunks, twiml_response, verify_signature, InboundMessage,
};

use crate::app::AppState;

/// Sent to the user when their message could not be answered.
pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

const SIGNATURE_HEADER: &str = "x-twilio-signature";

pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
    form: Result<Form<BTreeMap<String, String>>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(e) => {
            warn!(error = %e, "webhook: unreadable form body");
            return twiml(&[]);
        }
    };

    if let Err(reason) = check_signature(&state, &uri, &headers, &form) {
        warn!(reason, "webhook: signature rejected");
        return (StatusCode::FORBIDDEN, reason).into_response();
    }

    let inbound = match parse_inbound(&form) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "webhook: ignoring malformed payload");
            return twiml(&[]);
        }
    };

    let user_tag = state.user_tag(&inbound.sender_id);
    info!(user_tag = %user_tag, len = inbound.text.len(), "webhook: message received");

    match state.config.twilio.reply_mode {
        ReplyMode::Twiml => {
            let reply = answer(&state, &inbound, &user_tag).await;
            let chunks = split_chunks(&reply, state.messenger.max_chars());
            twiml(&chunks)
        }
        ReplyMode::Api => {
            // Detached: Twilio hangs up after 15 s and that must not cancel the reply.
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let reply = answer(&state, &inbound, &user_tag).await;
                match state.messenger.send_reply(&inbound.sender_id, &reply).await {
                    Ok(receipts) => {
                        info!(user_tag = %user_tag, messages = receipts.len(), "webhook: reply sent");
                    }
                    Err(e) => {
                        error!(user_tag = %user_tag, error = %e, "webhook: failed to send reply");
                    }
                }
            });
            twiml(&[])
        }
    }
}

/// Run the pipeline; any failure becomes the apology.
async fn answer(state: &AppState, inbound: &InboundMessage, user_tag: &str) -> String {
    match process_message(
        &state.ai,
        &state.sessions,
        &inbound.sender_id,
        user_tag,
        &inbound.text,
    )
    .await
    {
        Ok(out) => out.reply,
        Err(e) => {
            error!(user_tag, error = %e, "webhook: processing failed");
            APOLOGY.to_string()
        }
    }
}

/// Enforced only when `twilio.validate_signature` is on and a public URL is
/// configured, since Twilio signs the externally visible URL.
fn check_signature(
    state: &AppState,
    uri: &Uri,
    headers: &HeaderMap,
    form: &BTreeMap<String, String>,
) -> Result<(), &'static str> {
    if !state.config.twilio.validate_signature {
        return Ok(());
    }
    let Some(public_url) = state.config.gateway.public_url.as_deref() else {
        warn!("twilio.validate_signature is on but gateway.public_url is unset; skipping check");
        return Ok(());
    };
    let auth_token = state
        .config
        .twilio
        .auth_token
        .as_deref()
        .ok_or("no auth token to validate with")?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or("missing X-Twilio-Signature header")?;

    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/webhook");
    let url = format!("{}{}", public_url.trim_end_matches('/'), path);

    if verify_signature(auth_token, &url, form, signature) {
        Ok(())
    } else {
        Err("signature mismatch")
    }
}

fn twiml(messages: &[String]) -> Response {
    (
        [(header::CONTENT_TYPE, "application/xml")],
        twiml_response(messages),
    )
        .into_response()
}
