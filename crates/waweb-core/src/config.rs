use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_MAX_TURNS: usize = 20;
/// Twilio accepts 1600 characters per WhatsApp body; keep some headroom.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 1500;
pub const DEFAULT_IDLE_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 600;

/// Environment names used by existing deployments, mapped onto config keys.
/// `PORT` is handled separately because it must be numeric.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("GEMINI_API_KEY", "agent.api_key"),
    ("GEMINI_MODEL", "agent.model"),
    ("GITHUB_TOKEN", "agent.default_token"),
    ("TWILIO_ACCOUNT_SID", "twilio.account_sid"),
    ("TWILIO_AUTH_TOKEN", "twilio.auth_token"),
    ("TWILIO_PHONE_NUMBER", "twilio.from_number"),
    ("SECRET_KEY", "gateway.secret_key"),
    ("PUBLIC_URL", "gateway.public_url"),
];

/// Top-level config (waweb.toml + WAWEB_* env overrides + legacy env names).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WawebConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub twilio: TwilioConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Keys the HMAC that pseudonymizes user ids in logs.
    /// Generated per process when not configured.
    #[serde(default = "generate_secret")]
    pub secret_key: String,
    /// Externally visible base URL (e.g. `https://bot.example.com`).
    /// Needed to validate Twilio request signatures.
    pub public_url: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            secret_key: generate_secret(),
            public_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Gemini API key. Absence is reported at first use, not at startup.
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_agent_timeout")]
    pub timeout_secs: u64,
    /// Replaces the built-in system prompt when set.
    pub prompt_path: Option<String>,
    /// Token used for users who never submitted their own.
    pub default_token: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_gemini_base_url(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_agent_timeout(),
            prompt_path: None,
            default_token: None,
        }
    }
}

impl AgentConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// GitHub REST access for the model's repository tools.
///
/// Tools are offered only when a token is available for the user
/// (their own, or `agent.default_token`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    #[serde(default = "default_github_timeout")]
    pub timeout_secs: u64,
    /// Model round-trips allowed to request tools before the loop gives up.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            timeout_secs: default_github_timeout(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

/// How webhook replies reach the user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReplyMode {
    /// Send through the Messages API and acknowledge with an empty TwiML document.
    #[default]
    Api,
    /// Return the reply inline as TwiML `<Message>` elements.
    Twiml,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    /// Sender address, with or without the `whatsapp:` prefix.
    pub from_number: Option<String>,
    #[serde(default = "default_twilio_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
    #[serde(default = "default_twilio_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub reply_mode: ReplyMode,
    /// Reject webhooks whose `X-Twilio-Signature` does not verify.
    /// Requires `gateway.public_url` and `twilio.auth_token`.
    #[serde(default)]
    pub validate_signature: bool,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            base_url: default_twilio_base_url(),
            max_message_chars: default_max_message_chars(),
            timeout_secs: default_twilio_timeout(),
            reply_mode: ReplyMode::default(),
            validate_signature: false,
        }
    }
}

impl TwilioConfig {
    pub fn is_configured(&self) -> bool {
        [&self.account_sid, &self.auth_token, &self.from_number]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Maximum turns kept per user; oldest are evicted first.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Sessions idle for longer than this are dropped. `0` keeps them forever.
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            idle_ttl_secs: DEFAULT_IDLE_TTL_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for daily-rolling log files. Empty disables file logging.
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_log_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            file_prefix: default_log_prefix(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_temperature() -> f32 {
    0.4
}
fn default_max_output_tokens() -> u32 {
    8192
}
fn default_agent_timeout() -> u64 {
    60
}
fn default_twilio_base_url() -> String {
    "https://api.twilio.com".to_string()
}
fn default_max_message_chars() -> usize {
    DEFAULT_MAX_MESSAGE_CHARS
}
fn default_twilio_timeout() -> u64 {
    15
}
fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_github_timeout() -> u64 {
    20
}
fn default_max_tool_rounds() -> usize {
    5
}
fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}
fn default_idle_ttl() -> u64 {
    DEFAULT_IDLE_TTL_SECS
}
fn default_sweep_interval() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_log_prefix() -> String {
    "waweb.log".to_string()
}

/// 32 random bytes as hex, drawn from two v4 UUIDs.
fn generate_secret() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

impl WawebConfig {
    /// Load config from a TOML file with env overrides.
    ///
    /// Precedence, lowest first:
    ///   1. built-in defaults
    ///   2. TOML file (explicit path, else `./waweb.toml`; missing is fine)
    ///   3. `WAWEB_*` variables, nested with `__` (`WAWEB_TWILIO__REPLY_MODE=twiml`)
    ///   4. legacy names (`GEMINI_API_KEY`, `TWILIO_AUTH_TOKEN`, `PORT`, ...)
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        Self::load_with(config_path, |name| std::env::var(name).ok())
    }

    /// Same as [`load`](Self::load) with an injectable lookup for legacy names.
    pub fn load_with<F>(config_path: Option<&str>, lookup: F) -> crate::error::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = config_path.unwrap_or("waweb.toml");

        let mut figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("WAWEB_").split("__"));

        // Serialized keeps the values as strings; `Env` would turn a phone
        // number like "+14155238886" into an integer.
        for (var, key) in LEGACY_ENV {
            if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
                figment = figment.merge(Serialized::default(key, value.trim().to_string()));
            }
        }

        if let Some(raw) = lookup("PORT") {
            let port: u16 = raw
                .trim()
                .parse()
                .map_err(|_| crate::error::WawebError::Config(format!("PORT is not a valid port: {raw}")))?;
            figment = figment.merge(Serialized::default("gateway.port", port));
        }

        figment
            .extract()
            .map_err(|e| crate::error::WawebError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_file_or_env() {
        let cfg = WawebConfig::load_with(Some("/nonexistent/waweb.toml"), lookup_from(&[])).unwrap();
        assert_eq!(cfg.gateway.port, DEFAULT_PORT);
        assert_eq!(cfg.sessions.max_turns, DEFAULT_MAX_TURNS);
        assert_eq!(cfg.agent.model, DEFAULT_MODEL);
        assert_eq!(cfg.twilio.reply_mode, ReplyMode::Api);
        assert!(!cfg.agent.is_configured());
        assert!(!cfg.twilio.is_configured());
        assert_eq!(cfg.gateway.secret_key.len(), 64);
        assert_eq!(cfg.github.api_url, "https://api.github.com");
        assert_eq!(cfg.github.max_tool_rounds, 5);
    }

    #[test]
    fn legacy_env_names_are_mapped() {
        let cfg = WawebConfig::load_with(
            Some("/nonexistent/waweb.toml"),
            lookup_from(&[
                ("GEMINI_API_KEY", "g-key"),
                ("TWILIO_ACCOUNT_SID", "AC123"),
                ("TWILIO_AUTH_TOKEN", "tok"),
                ("TWILIO_PHONE_NUMBER", "+14155238886"),
                ("SECRET_KEY", "s3cret"),
                ("PORT", "8080"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.agent.api_key.as_deref(), Some("g-key"));
        assert_eq!(cfg.twilio.from_number.as_deref(), Some("+14155238886"));
        assert_eq!(cfg.gateway.secret_key, "s3cret");
        assert_eq!(cfg.gateway.port, 8080);
        assert!(cfg.agent.is_configured());
        assert!(cfg.twilio.is_configured());
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let cfg = WawebConfig::load_with(
            Some("/nonexistent/waweb.toml"),
            lookup_from(&[("GEMINI_API_KEY", "  ")]),
        )
        .unwrap();
        assert!(cfg.agent.api_key.is_none());
    }

    #[test]
    fn bad_port_is_a_config_error() {
        let err = WawebConfig::load_with(
            Some("/nonexistent/waweb.toml"),
            lookup_from(&[("PORT", "eighty")]),
        )
        .unwrap_err();
        assert_eq!(err.code(), "CONFIG_LOAD_ERROR");
    }
}
