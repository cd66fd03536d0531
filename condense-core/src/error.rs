//! Error types for the condense synthesis engine.
//!
//! Uses `thiserror` for public API error types. Provider failures, missing
//! configuration, and configuration loading each get their own enum so callers
//! can match on the layer that failed.

/// Top-level error returned by the synthesis orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Missing configuration: {reason}")]
    MissingConfiguration { reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP {status} from {provider}: {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Request to {provider} failed: {message}")]
    Connection { provider: String, message: String },

    #[error("Could not read {provider} response: {message}")]
    ResponseParse { provider: String, message: String },

    #[error("LLM call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("LLM call was cancelled")]
    Cancelled,

    #[error("Unknown provider: {name}")]
    UnknownProvider { name: String },
}

impl ProviderError {
    /// Whether this error came from the network layer (HTTP status, transport, deadline).
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ProviderError::Http { .. }
                | ProviderError::Connection { .. }
                | ProviderError::Timeout { .. }
        )
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// A type alias for results using the top-level `SynthesisError`.
pub type Result<T> = std::result::Result<T, SynthesisError>;
