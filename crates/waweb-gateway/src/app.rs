use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tracing::{debug, info};

use waweb_agent::AiClient;
use waweb_core::config::WawebConfig;
use waweb_core::{UserId, WawebError};
use waweb_sessions::SessionStore;
use waweb_twilio::{Messenger, TwilioClient};

/// Central shared state, passed as `Arc<AppState>` to all Axum handlers.
pub struct AppState {
    pub config: WawebConfig,
    pub sessions: SessionStore,
    pub ai: AiClient,
    pub messenger: Arc<dyn Messenger>,
}

impl AppState {
    pub fn new(config: WawebConfig, ai: AiClient, messenger: Arc<dyn Messenger>) -> Self {
        let sessions = SessionStore::from_config(&config.sessions);
        Self {
            config,
            sessions,
            ai,
            messenger,
        }
    }

    /// Wire the production Gemini and Twilio clients from config.
    /// Missing credentials do not fail here.
    pub fn from_config(config: WawebConfig) -> Result<Self, WawebError> {
        let ai = AiClient::from_config(&config);
        let messenger = TwilioClient::from_config(&config.twilio)?;
        info!(
            model = %config.agent.model,
            gemini = ai.is_configured(),
            twilio = messenger.is_configured(),
            default_github_token = ai.has_default_token(),
            reply_mode = ?config.twilio.reply_mode,
            "clients ready"
        );
        Ok(Self::new(config, ai, Arc::new(messenger)))
    }

    /// Pseudonymous id for logs.
    pub fn user_tag(&self, user_id: &str) -> String {
        UserId::from(user_id).tag(&self.config.gateway.secret_key)
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(crate::http::info::info_handler))
        .route("/health", get(crate::http::health::health_handler))
        .route("/webhook", post(crate::http::webhooks::webhook_handler))
        .route("/api/chat", post(crate::http::chat::chat_handler))
        .route(
            "/api/chat/history/{user_id}",
            get(crate::http::chat::history_handler),
        )
        .route(
            "/api/chat/clear/{user_id}",
            delete(crate::http::chat::clear_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Periodically drop idle sessions. Returns `None` when expiry is disabled.
pub fn spawn_session_sweeper(state: Arc<AppState>) -> Option<tokio::task::JoinHandle<()>> {
    let cfg = &state.config.sessions;
    if cfg.idle_ttl_secs == 0 || cfg.sweep_interval_secs == 0 {
        info!("session expiry disabled");
        return None;
    }
    let every = Duration::from_secs(cfg.sweep_interval_secs);
    info!(
        idle_ttl_secs = cfg.idle_ttl_secs,
        sweep_interval_secs = cfg.sweep_interval_secs,
        "session sweeper started"
    );

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = state.sessions.prune_idle(chrono::Utc::now());
            debug!(removed, live = state.sessions.len(), "session sweep");
        }
    }))
}
