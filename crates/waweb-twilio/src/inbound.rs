use std::collections::BTreeMap;

use crate::error::TwilioError;
use crate::types::InboundMessage;

/// Extract the sender and text from a form-encoded Twilio webhook.
///
/// `From` and `Body` are required and must be non-empty after trimming.
pub fn parse_inbound(form: &BTreeMap<String, String>) -> Result<InboundMessage, TwilioError> {
    let sender_id = required(form, "From")?;
    let text = required(form, "Body")?;

    Ok(InboundMessage {
        sender_id,
        text,
        message_sid: optional(form, "MessageSid"),
        profile_name: optional(form, "ProfileName"),
    })
}

fn required(form: &BTreeMap<String, String>, key: &str) -> Result<String, TwilioError> {
    optional(form, key).ok_or_else(|| TwilioError::MalformedPayload(format!("missing or empty `{key}`")))
}

fn optional(form: &BTreeMap<String, String>, key: &str) -> Option<String> {
    form.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_sender_and_body() {
        let msg = parse_inbound(&form(&[
            ("From", "whatsapp:+14155550100"),
            ("Body", "  hello  "),
            ("MessageSid", "SM123"),
            ("ProfileName", "Ada"),
        ]))
        .unwrap();
        assert_eq!(msg.sender_id, "whatsapp:+14155550100");
        assert_eq!(msg.text, "hello");
        assert_eq!(msg.message_sid.as_deref(), Some("SM123"));
        assert_eq!(msg.profile_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn missing_from_is_malformed() {
        let err = parse_inbound(&form(&[("Body", "hi")])).unwrap_err();
        assert!(matches!(err, TwilioError::MalformedPayload(ref m) if m.contains("From")));
    }

    #[test]
    fn blank_body_is_malformed() {
        let err = parse_inbound(&form(&[("From", "whatsapp:+1"), ("Body", "   ")])).unwrap_err();
        assert!(matches!(err, TwilioError::MalformedPayload(ref m) if m.contains("Body")));
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let msg = parse_inbound(&form(&[("From", "whatsapp:+1"), ("Body", "x")])).unwrap();
        assert!(msg.message_sid.is_none());
        assert!(msg.profile_name.is_none());
    }
}
