use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Opaque identifier for the person on the other end of a conversation.
///
/// For WhatsApp traffic this is the gateway address (`whatsapp:+15551234567`);
/// REST callers pick any string they like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

impl UserId {
    /// Short keyed digest of the id, safe to put in logs.
    ///
    /// Phone numbers never hit the log sinks; the same id always maps to the
    /// same tag for a given secret, so a conversation can still be followed.
    pub fn tag(&self, secret: &str) -> String {
        let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
            Ok(m) => m,
            // HMAC accepts keys of any length; kept for the type signature.
            Err(_) => return "untagged".to_string(),
        };
        mac.update(self.0.as_bytes());
        let digest = mac.finalize().into_bytes();
        hex::encode(&digest[..6])
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which side of the conversation produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_stable_and_hides_the_id() {
        let id = UserId::from("whatsapp:+15551234567");
        let a = id.tag("secret");
        let b = id.tag("secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert!(!a.contains("1555"));
    }

    #[test]
    fn tag_depends_on_secret() {
        let id = UserId::from("u1");
        assert_ne!(id.tag("one"), id.tag("two"));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(Role::User.to_string(), "user");
    }
}
