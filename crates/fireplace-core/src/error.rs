use thiserror::Error;

use crate::models::ConceptFailure;

/// Application-wide error types for Fireplace insights.
#[derive(Error, Debug)]
pub enum AppError {
    /// The LLM provider rejected the API key (HTTP 401/403).
    #[error("LLM authentication failed: {0}")]
    Authentication(String),

    /// The LLM provider throttled the request (HTTP 429).
    #[error("LLM rate limit exceeded: {0}")]
    RateLimit(String),

    /// The prompt did not fit the model's context window.
    #[error("LLM context length exceeded: {0}")]
    ContextLengthExceeded(String),

    /// The LLM provider is down or overloaded (HTTP 5xx).
    #[error("LLM service unavailable (HTTP {status_code}): {message}")]
    ServiceUnavailable { message: String, status_code: u16 },

    /// Unclassified generation failure: transport errors, malformed payloads,
    /// unexpected statuses.
    #[error("Transient LLM error: {0}")]
    Transient(String),

    /// The LLM answered, but nothing usable could be made of the answer.
    #[error("Malformed LLM output: {0}")]
    MalformedOutput(String),

    /// Caller supplied input that can never succeed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Network/connection error while crawling.
    #[error("Network error: {0}")]
    Network(String),

    /// A fetch followed more redirects than allowed.
    #[error("Too many redirects (max {max}) while fetching {url}")]
    TooManyRedirects { url: String, max: usize },

    /// The crawled page answered with a non-2xx status.
    #[error("HTTP {status_code} for {url}")]
    NonSuccessStatus { status_code: u16, url: String },

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// The fetched document could not be turned into a tree.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Every concept of a discovery run failed.
    #[error("Discovery failed for all {} concepts", failures.len())]
    DiscoveryFailed { failures: Vec<ConceptFailure> },

    /// A plan or other collaborator record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AppError {
    /// Returns true if this error is transient and the whole request is
    /// worth repeating later.
    ///
    /// For callers that retry at a higher level than a single generation.
    /// [`RetryPolicy::run`](crate::retry::RetryPolicy::run) does not consult
    /// it: within one call every failure except [`AppError::Cancelled`] is
    /// retried until attempts run out.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::RateLimit(_)
                | AppError::ServiceUnavailable { .. }
                | AppError::Transient(_)
                | AppError::Network(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }
}
