use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use waweb_core::Role;

/// One recorded message. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    /// Serialized as `content` to keep the wire shape of the history API.
    #[serde(rename = "content")]
    pub text: String,
    /// RFC3339 timestamp taken when the turn was appended.
    pub timestamp: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Per-user conversation state held by the store.
#[derive(Debug, Clone)]
pub struct Session {
    /// Oldest first. Never longer than the store's cap.
    pub turns: VecDeque<Turn>,
    /// Opaque access token submitted by the user, if any.
    pub token: Option<String>,
    /// Bumped on every mutation; drives idle expiry.
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            turns: VecDeque::new(),
            token: None,
            last_active: now,
        }
    }

    /// A session with nothing worth keeping.
    pub fn is_vacant(&self) -> bool {
        self.turns.is_empty() && self.token.is_none()
    }
}

/// Read-only view returned to the history endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HistorySnapshot {
    pub user_id: String,
    #[serde(rename = "chat_history")]
    pub turns: Vec<Turn>,
    #[serde(rename = "has_github_token")]
    pub has_token: bool,
}
