use waweb_core::WawebError;

use crate::provider::ProviderError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// No API key, or the provider could not be built from config.
    #[error("AI client not configured: {0}")]
    Configuration(String),

    /// Transport failure, non-2xx status, or an unusable response.
    #[error("AI upstream failed: {0}")]
    Upstream(ProviderError),
}

impl From<ProviderError> for AgentError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NotConfigured(msg) => AgentError::Configuration(msg),
            other => AgentError::Upstream(other),
        }
    }
}

impl From<AgentError> for WawebError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::Configuration(msg) => WawebError::Configuration(msg),
            AgentError::Upstream(err) => WawebError::Upstream(err.to_string()),
        }
    }
}
