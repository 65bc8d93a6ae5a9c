use thiserror::Error;

#[derive(Debug, Error)]
pub enum WawebError {
    /// A credential or setting needed by this operation is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The language-model API or the messaging gateway failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The inbound request could not be understood.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// The config file or environment could not be loaded.
    #[error("Config load error: {0}")]
    Config(String),
}

impl WawebError {
    /// Short error code string returned to REST clients.
    pub fn code(&self) -> &'static str {
        match self {
            WawebError::Configuration(_) => "CONFIGURATION_ERROR",
            WawebError::Upstream(_) => "UPSTREAM_ERROR",
            WawebError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            WawebError::Config(_) => "CONFIG_LOAD_ERROR",
        }
    }

    /// Message safe to show an end user: no upstream bodies, no paths.
    pub fn public_message(&self) -> &'static str {
        match self {
            WawebError::Configuration(_) => "The service is not fully configured. Please contact the operator.",
            WawebError::Upstream(_) => "Sorry, I encountered an error. Please try again.",
            WawebError::MalformedPayload(_) => "The request could not be understood.",
            WawebError::Config(_) => "Internal server error",
        }
    }
}

pub type Result<T> = std::result::Result<T, WawebError>;
