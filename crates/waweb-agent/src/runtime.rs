use std::time::Instant;

use tracing::{info, warn};

use waweb_core::config::{AgentConfig, SessionsConfig, WawebConfig};
use waweb_core::Role;
use waweb_sessions::Turn;

use crate::error::AgentError;
use crate::gemini::GeminiProvider;
use crate::prompt::{PromptBuilder, SessionInfo};
use crate::provider::{ChatRequest, LlmProvider, Message, ProviderError, UnconfiguredProvider};
use crate::tools::github::GithubClient;
use crate::tools::tool_loop::run_tool_loop;
use crate::tools::{to_definitions, Tool};

/// Holds the LLM provider, prompt builder and GitHub tools.
/// Shared across all requests via `Arc` in the gateway's `AppState`.
pub struct AiClient {
    provider: Box<dyn LlmProvider>,
    prompt: PromptBuilder,
    model: String,
    max_tokens: u32,
    temperature: f32,
    /// How many prior turns go into each request.
    context_turns: usize,
    /// Used for users who never sent their own token.
    default_token: Option<String>,
    github: Option<GithubClient>,
    max_tool_rounds: usize,
}

impl AiClient {
    pub fn new(provider: Box<dyn LlmProvider>, prompt: PromptBuilder, model: String) -> Self {
        let defaults = AgentConfig::default();
        Self {
            provider,
            prompt,
            model,
            max_tokens: defaults.max_output_tokens,
            temperature: defaults.temperature,
            context_turns: SessionsConfig::default().max_turns,
            default_token: None,
            github: None,
            max_tool_rounds: 0,
        }
    }

    /// Build from config. A missing API key is not an error here: the client
    /// falls back to a provider that reports `Configuration` on first use.
    pub fn from_config(config: &WawebConfig) -> Self {
        let agent = &config.agent;
        let provider: Box<dyn LlmProvider> = match GeminiProvider::from_config(agent) {
            Ok(p) => Box::new(p),
            Err(ProviderError::NotConfigured(_)) => {
                warn!("no Gemini API key configured, chat requests will fail until one is set");
                Box::new(UnconfiguredProvider)
            }
            Err(e) => {
                warn!(error = %e, "failed to build Gemini client");
                Box::new(UnconfiguredProvider)
            }
        };
        let github = GithubClient::from_config(&config.github)
            .map_err(|e| warn!(error = %e, "failed to build GitHub client, tools disabled"))
            .ok();

        Self::new(provider, PromptBuilder::load(agent.prompt_path.as_deref()), agent.model.clone())
            .with_generation(agent.max_output_tokens, agent.temperature)
            .with_context_turns(config.sessions.max_turns)
            .with_github(github, agent.default_token.clone(), config.github.max_tool_rounds)
    }

    pub fn with_generation(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn with_context_turns(mut self, turns: usize) -> Self {
        self.context_turns = turns;
        self
    }

    /// Attach GitHub tools. `default_token` stands in for users who never
    /// linked their own; blank values are ignored.
    pub fn with_github(
        mut self,
        client: Option<GithubClient>,
        default_token: Option<String>,
        max_rounds: usize,
    ) -> Self {
        self.github = client;
        self.default_token = default_token.filter(|t| !t.trim().is_empty());
        self.max_tool_rounds = max_rounds;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether an operator default token covers users without their own.
    pub fn has_default_token(&self) -> bool {
        self.default_token.is_some()
    }

    /// The user's own token, else the operator default.
    pub fn effective_token<'a>(&'a self, user_token: Option<&'a str>) -> Option<&'a str> {
        user_token.or(self.default_token.as_deref())
    }

    /// Generate a reply to `message` given the prior conversation.
    ///
    /// `history` is oldest first. If its last turn is the user message being
    /// answered it is not sent twice. Returns the trimmed model text.
    pub async fn generate_reply(
        &self,
        user_tag: &str,
        message: &str,
        history: &[Turn],
        token: Option<&str>,
    ) -> Result<String, AgentError> {
        let token = self.effective_token(token);
        let tools: Vec<Box<dyn Tool>> = match (&self.github, token) {
            (Some(github), Some(token)) if self.max_tool_rounds > 0 => github.tools(token),
            _ => Vec::new(),
        };

        let mut req = self.build_request(message, history, token.is_some(), !tools.is_empty());
        req.tools = to_definitions(&tools);
        info!(
            user_tag, model = %req.model, provider = %self.provider.name(),
            context = req.messages.len() - 1, tools = req.tools.len(), "generating reply"
        );

        let started = Instant::now();
        let (resp, called) =
            run_tool_loop(self.provider.as_ref(), req, &tools, self.max_tool_rounds)
                .await
                .map_err(|e| {
                    warn!(user_tag, error = %e, "model request failed");
                    AgentError::from(e)
                })?;

        info!(
            user_tag,
            tokens_in = resp.tokens_in,
            tokens_out = resp.tokens_out,
            stop_reason = %resp.stop_reason,
            tools_called = ?called,
            latency_ms = started.elapsed().as_millis() as u64,
            "reply generated"
        );

        let text = resp.content.trim();
        if text.is_empty() {
            return Err(AgentError::Upstream(ProviderError::Parse(
                "model returned only whitespace".into(),
            )));
        }
        Ok(text.to_string())
    }

    fn build_request(
        &self,
        message: &str,
        history: &[Turn],
        has_token: bool,
        github_tools: bool,
    ) -> ChatRequest {
        let prior = match history.last() {
            Some(last) if last.role == Role::User && last.text == message => {
                &history[..history.len() - 1]
            }
            _ => history,
        };
        let skip = prior.len().saturating_sub(self.context_turns);

        let mut messages: Vec<Message> = prior[skip..]
            .iter()
            .map(|t| Message {
                role: t.role,
                content: t.text.clone(),
            })
            .collect();
        messages.push(Message {
            role: Role::User,
            content: message.to_string(),
        });

        let info = SessionInfo {
            turn_count: prior.len() - skip,
            has_token,
            github_tools,
            timestamp: chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
        };

        ChatRequest {
            model: self.model.clone(),
            system: self.prompt.build(Some(&info)),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            tools: Vec::new(),
            raw_messages: None,
        }
    }
}
