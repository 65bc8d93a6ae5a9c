use serde::{Deserialize, Serialize};

/// A WhatsApp message delivered to the webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender address as Twilio reports it, e.g. `whatsapp:+14155550100`.
    /// Used as the session key.
    pub sender_id: String,

    /// Message body, trimmed. Never empty.
    pub text: String,

    pub message_sid: Option<String>,

    /// WhatsApp display name, when Twilio includes it.
    pub profile_name: Option<String>,
}

/// Twilio's acknowledgement of one queued outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub sid: String,
    #[serde(default)]
    pub status: String,
}
