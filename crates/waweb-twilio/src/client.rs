use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use waweb_core::config::TwilioConfig;

use crate::error::TwilioError;
use crate::split::split_chunks;
use crate::types::DeliveryReceipt;

const WHATSAPP_PREFIX: &str = "whatsapp:";
/// Pause between chunks of one reply so they arrive in order.
const CHUNK_DELAY: Duration = Duration::from_millis(100);

/// Outbound side of the WhatsApp gateway.
///
/// `TwilioClient` is the production implementation; tests substitute their
/// own to observe what would be sent.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Stable lowercase identifier, used in logs.
    fn name(&self) -> &str;

    /// Whether credentials and a sender are present.
    fn is_configured(&self) -> bool;

    /// Longest body sent in one message, in characters.
    fn max_chars(&self) -> usize;

    /// Deliver one message body as-is. One attempt, no retry.
    async fn send_text(&self, to: &str, body: &str) -> Result<DeliveryReceipt, TwilioError>;

    /// Deliver `text`, split into as many messages as the length limit needs.
    /// Stops at the first failed chunk.
    async fn send_reply(&self, to: &str, text: &str) -> Result<Vec<DeliveryReceipt>, TwilioError> {
        let chunks = split_chunks(text, self.max_chars());
        let mut receipts = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(CHUNK_DELAY).await;
            }
            receipts.push(self.send_text(to, chunk).await?);
        }
        Ok(receipts)
    }
}

/// Twilio Programmable Messaging client for the WhatsApp channel.
pub struct TwilioClient {
    http: reqwest::Client,
    base_url: String,
    account_sid: Option<String>,
    auth_token: Option<String>,
    from: Option<String>,
    max_chars: usize,
}

impl TwilioClient {
    /// Build from the `[twilio]` config section. Missing credentials are
    /// accepted here and reported as `Configuration` when sending.
    pub fn from_config(cfg: &TwilioConfig) -> Result<Self, TwilioError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            account_sid: non_blank(&cfg.account_sid),
            auth_token: non_blank(&cfg.auth_token),
            from: non_blank(&cfg.from_number).map(|n| whatsapp_address(&n)),
            max_chars: cfg.max_message_chars,
        })
    }

    fn credentials(&self) -> Result<(&str, &str, &str), TwilioError> {
        match (&self.account_sid, &self.auth_token, &self.from) {
            (Some(sid), Some(token), Some(from)) => Ok((sid.as_str(), token.as_str(), from.as_str())),
            _ => Err(TwilioError::Configuration(
                "TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and TWILIO_PHONE_NUMBER must all be set".into(),
            )),
        }
    }
}

#[async_trait]
impl Messenger for TwilioClient {
    fn name(&self) -> &str {
        "twilio"
    }

    fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    fn max_chars(&self) -> usize {
        self.max_chars
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<DeliveryReceipt, TwilioError> {
        let (sid, token, from) = self.credentials()?;
        let url = format!("{}/2010-04-01/Accounts/{}/Messages.json", self.base_url, sid);
        let to = whatsapp_address(to);

        debug!(len = body.chars().count(), "sending WhatsApp message");

        let resp = self
            .http
            .post(&url)
            .basic_auth(sid, Some(token))
            .form(&[("From", from), ("To", to.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let parsed: Option<ApiErrorBody> = serde_json::from_str(&text).ok();
            warn!(status = status.as_u16(), body = %text, "Twilio API error");
            return Err(TwilioError::Api {
                status: status.as_u16(),
                code: parsed.as_ref().and_then(|p| p.code),
                message: parsed
                    .and_then(|p| p.message)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string()),
            });
        }

        let receipt: DeliveryReceipt = resp.json().await?;
        debug!(sid = %receipt.sid, status = %receipt.status, "WhatsApp message queued");
        Ok(receipt)
    }
}

/// Address in Twilio's WhatsApp form, `whatsapp:+E164`.
pub fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with(WHATSAPP_PREFIX) {
        number.to_string()
    } else {
        format!("{WHATSAPP_PREFIX}{number}")
    }
}

fn non_blank(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[derive(Deserialize)]
struct ApiErrorBody {
    code: Option<i64>,
    message: Option<String>,
}
