//! social-forge: synthetic social-network dataset generator.
//!
//! This library synthesizes a fictitious social-network channel in three
//! staged LLM calls plus an adversarial review loop: a persona cast, an
//! ordered interaction script over that cast, and rendered post text for
//! each script event, each draft optionally revised under judge critique.
//! The library guarantees structural conformance (exact cardinalities, valid
//! references, ordered history) and bounded retry behavior - not the factual
//! or stylistic quality of the generated text.

// Core modules
pub mod agents;
pub mod channel;
pub mod cli;
pub mod error;
pub mod export;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod utils;

// Re-export commonly used types
pub use agents::{AgentError, AgentResult};
pub use channel::{ChannelSpec, ChannelSpecError};
pub use error::LlmError;
pub use pipeline::{ChannelDataset, ChannelOrchestrator, PipelineConfig, PipelineEvent};
