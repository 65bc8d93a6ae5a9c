use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, instrument};

use waweb_core::config::SessionsConfig;
use waweb_core::Role;

use crate::types::{HistorySnapshot, Session, Turn};

/// In-process store of per-user conversation history and tokens.
///
/// Backed by a `DashMap`: every mutation of one user's session runs under
/// that key's shard lock, so concurrent appends for the same user never lose
/// a turn and never overshoot the cap. Nothing survives a restart.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    cap: usize,
    idle_ttl: Option<chrono::Duration>,
}

impl SessionStore {
    /// `cap` is clamped to at least 1. `idle_ttl = None` disables expiry.
    pub fn new(cap: usize, idle_ttl: Option<Duration>) -> Self {
        Self {
            sessions: DashMap::new(),
            cap: cap.max(1),
            idle_ttl: idle_ttl.and_then(|d| chrono::Duration::from_std(d).ok()),
        }
    }

    pub fn from_config(cfg: &SessionsConfig) -> Self {
        let ttl = (cfg.idle_ttl_secs > 0).then(|| Duration::from_secs(cfg.idle_ttl_secs));
        Self::new(cfg.max_turns, ttl)
    }

    /// Maximum turns retained per user.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Ordered history, oldest first. Unknown users get an empty list.
    pub fn get_history(&self, user_id: &str) -> Vec<Turn> {
        self.sessions
            .get(user_id)
            .map(|s| s.turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append a turn, creating the session on first use and evicting the
    /// oldest turns beyond the cap. Returns the resulting history length.
    #[instrument(skip(self, user_id, text), fields(role = %role, len = text.len()))]
    pub fn append_turn(&self, user_id: &str, role: Role, text: &str) -> usize {
        let now = Utc::now();
        let mut session = self
            .sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Session::new(now));

        session.turns.push_back(Turn::new(role, text));
        while session.turns.len() > self.cap {
            session.turns.pop_front();
        }
        session.last_active = now;
        session.turns.len()
    }

    /// Store an opaque access token for the user. Contents are not inspected.
    pub fn set_token(&self, user_id: &str, token: &str) {
        let now = Utc::now();
        let mut session = self
            .sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Session::new(now));
        session.token = Some(token.to_string());
        session.last_active = now;
        debug!("token stored");
    }

    pub fn get_token(&self, user_id: &str) -> Option<String> {
        self.sessions.get(user_id).and_then(|s| s.token.clone())
    }

    /// Drop the user's history. The token is kept; a session left with
    /// neither history nor token is removed. Unknown ids are a no-op.
    pub fn clear(&self, user_id: &str) {
        if let Some(mut session) = self.sessions.get_mut(user_id) {
            session.turns.clear();
            session.last_active = Utc::now();
        }
        self.sessions.remove_if(user_id, |_, s| s.is_vacant());
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.sessions.contains_key(user_id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn snapshot(&self, user_id: &str) -> HistorySnapshot {
        match self.sessions.get(user_id) {
            Some(s) => HistorySnapshot {
                user_id: user_id.to_string(),
                turns: s.turns.iter().cloned().collect(),
                has_token: s.token.is_some(),
            },
            None => HistorySnapshot {
                user_id: user_id.to_string(),
                turns: Vec::new(),
                has_token: false,
            },
        }
    }

    /// Remove sessions idle for longer than the configured TTL.
    /// Returns how many were removed.
    pub fn prune_idle(&self, now: DateTime<Utc>) -> usize {
        let Some(ttl) = self.idle_ttl else {
            return 0;
        };
        let mut removed = 0;
        self.sessions.retain(|_, s| {
            let keep = now.signed_duration_since(s.last_active) <= ttl;
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            debug!(removed, remaining = self.sessions.len(), "pruned idle sessions");
        }
        removed
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::from_config(&SessionsConfig::default())
    }
}
