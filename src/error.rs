//! Error types for LLM API interactions.
//!
//! Agent-level and pipeline-level errors live in [`crate::agents::error`];
//! this module only covers the transport boundary to the model provider.

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API base URL: LITELLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LlmError {
    /// Whether a retry of the same request has any chance of succeeding.
    ///
    /// Everything except a missing configuration value is transient from the
    /// caller's point of view: transport failures, rate limits, server-side
    /// errors and empty completions can all resolve on a later attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LlmError::MissingApiBase)
    }
}
