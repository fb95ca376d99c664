//! Error types for the generation agents.
//!
//! The taxonomy separates locally recoverable validation failures (schema,
//! cardinality, referential) and transient transport failures from the
//! terminal [`AgentError::Exhausted`], which a stage surfaces only after its
//! retry bound is spent. `Exhausted` aborts the channel run; it is never
//! swallowed or substituted with placeholder content.

use thiserror::Error;

use crate::error::LlmError;

/// Errors that can occur during agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A model response failed to parse into the expected record shape.
    #[error("Schema validation failed: {0}")]
    Schema(String),

    /// The number of parsed records does not match the requested count.
    #[error("Cardinality mismatch: expected {expected} records, got {actual}")]
    Cardinality { expected: usize, actual: usize },

    /// A script event references a username absent from the persona set.
    #[error("Script references unknown username '{username}'")]
    Referential { username: String },

    /// The underlying generation call failed.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Terminal failure: the retry bound was spent without a valid result.
    #[error("Generation failed at stage '{stage}' after {attempts} attempts: {reason}")]
    Exhausted {
        stage: String,
        attempts: u32,
        reason: String,
    },

    /// Invalid agent or pipeline configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AgentError {
    /// Whether the owning stage may retry the full generation request.
    ///
    /// Schema, cardinality and referential failures come from malformed model
    /// output and are recoverable by asking again; transport errors are
    /// recoverable when the underlying call is. `Exhausted` and
    /// `Configuration` are terminal.
    pub fn is_recoverable(&self) -> bool {
        match self {
            AgentError::Schema(_)
            | AgentError::Cardinality { .. }
            | AgentError::Referential { .. } => true,
            AgentError::Llm(err) => err.is_retryable(),
            AgentError::Exhausted { .. } | AgentError::Configuration(_) => false,
        }
    }
}

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;
