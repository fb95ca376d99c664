//! Adversarial judge for rendered drafts.
//!
//! The judge reads one draft and decides whether it would pass as
//! human-written. An "AI-like" verdict is not an error: the content actor
//! treats it as a steering signal and revises. Only transport or parse
//! failures that outlive the judge's own retry bound fail the stage.

use std::sync::Arc;

use serde::Deserialize;

use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::prompts;
use crate::utils::json_extraction::extract_json_object;

use super::error::{AgentError, AgentResult};
use super::retry::{retry_with_backoff, RetryPolicy};
use super::types::JudgeVerdict;

/// Configuration for the judge agent.
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// Sampling temperature; low, the verdict should be stable.
    pub temperature: f64,
    /// Maximum tokens for the verdict.
    pub max_tokens: u32,
    /// Retry policy for transport/parse failures of the judge call itself.
    pub retry: RetryPolicy,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 500,
            retry: RetryPolicy::default(),
        }
    }
}

impl JudgeConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    /// Sets the max tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Agent that assesses whether a draft reads as machine-generated.
pub struct JudgeAgent {
    llm_client: Arc<dyn LlmProvider>,
    config: JudgeConfig,
}

impl std::fmt::Debug for JudgeAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgeAgent")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JudgeAgent {
    /// Stage name used in logs and terminal errors.
    pub const STAGE_NAME: &'static str = "judge";

    /// Creates a new judge agent.
    pub fn new(llm_client: Arc<dyn LlmProvider>, config: JudgeConfig) -> Self {
        Self { llm_client, config }
    }

    /// Creates a new judge agent with default configuration.
    pub fn with_defaults(llm_client: Arc<dyn LlmProvider>) -> Self {
        Self::new(llm_client, JudgeConfig::default())
    }

    /// Assesses one draft, retrying transport/parse failures up to the bound.
    pub async fn assess(&self, text: &str) -> AgentResult<JudgeVerdict> {
        retry_with_backoff(&self.config.retry, Self::STAGE_NAME, || {
            self.attempt_assess(text)
        })
        .await
    }

    async fn attempt_assess(&self, text: &str) -> AgentResult<JudgeVerdict> {
        let request = GenerationRequest::new(
            "",
            vec![
                Message::system(prompts::JUDGE_SYSTEM_PROMPT),
                Message::user(prompts::build_judge_prompt(text)),
            ],
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let content = self.llm_client.generate_text(request).await?;
        parse_verdict(&content)
    }

    /// Returns the agent configuration.
    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }
}

/// Wire shape of a judge response.
#[derive(Debug, Deserialize)]
struct VerdictResponse {
    #[serde(rename = "RESULT")]
    result: serde_json::Value,
    #[serde(rename = "FEEDBACK", default)]
    feedback: String,
}

/// Parses a judge response, tolerating the flag shapes models actually emit.
pub(crate) fn parse_verdict(content: &str) -> AgentResult<JudgeVerdict> {
    let json = extract_json_object(content)
        .into_result_with_context(content)
        .map_err(|e| AgentError::Schema(e.to_string()))?;

    let parsed: VerdictResponse = serde_json::from_str(&json)
        .map_err(|e| AgentError::Schema(format!("Invalid verdict JSON: {}", e)))?;

    let ai_generated = parse_result_flag(&parsed.result).ok_or_else(|| {
        AgentError::Schema(format!(
            "Unrecognized RESULT value: {}",
            parsed.result
        ))
    })?;

    Ok(JudgeVerdict {
        ai_generated,
        feedback: parsed.feedback,
    })
}

/// Interprets the RESULT field as an "AI-generated" flag.
///
/// Accepts JSON booleans, 0/1, and the label strings models substitute for
/// them ("true", "yes", "ai", "human", ...).
fn parse_result_flag(value: &serde_json::Value) -> Option<bool> {
    match value {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::Number(n) => n.as_i64().map(|v| v != 0),
        serde_json::Value::String(s) => {
            let label = s.trim().to_lowercase();
            match label.as_str() {
                "true" | "yes" | "ai" | "llm" | "machine" | "ai-generated" | "ai generated" => {
                    Some(true)
                }
                "false" | "no" | "human" | "human-written" | "human written" => Some(false),
                // Labels like "likely AI" still carry the signal
                _ if label.contains("ai") => Some(true),
                _ if label.contains("human") => Some(false),
                _ => None,
            }
        }
        _ => None,
    }
}
