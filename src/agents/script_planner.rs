//! Script planning for a channel.
//!
//! Second stage of the pipeline: given the channel spec and the finished
//! persona cast, plan an ordered sequence of exactly `post_count` interaction
//! events. Sequence order is canonical; it defines rendering order and
//! conversational context order for the content actor.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use crate::channel::ChannelSpec;
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::prompts;
use crate::utils::json_extraction::extract_json_object;

use super::error::{AgentError, AgentResult};
use super::retry::{retry_with_backoff, RetryPolicy};
use super::types::{parse_event_time, FeatureSet, ScriptEvent, UserProfile};

/// Configuration for the script planner agent.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens for the script response.
    pub max_tokens: u32,
    /// Retry policy for the full planning request.
    pub retry: RetryPolicy,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_tokens: 8000,
            retry: RetryPolicy::default(),
        }
    }
}

impl PlannerConfig {
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

/// Agent that plans the interaction script for a channel.
pub struct ScriptPlannerAgent {
    llm_client: Arc<dyn LlmProvider>,
    config: PlannerConfig,
}

impl std::fmt::Debug for ScriptPlannerAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptPlannerAgent")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ScriptPlannerAgent {
    /// Stage name used in logs and terminal errors.
    pub const STAGE_NAME: &'static str = "script_planning";

    /// Creates a new planner agent.
    pub fn new(llm_client: Arc<dyn LlmProvider>, config: PlannerConfig) -> Self {
        Self { llm_client, config }
    }

    /// Creates a new planner agent with default configuration.
    pub fn with_defaults(llm_client: Arc<dyn LlmProvider>) -> Self {
        Self::new(llm_client, PlannerConfig::default())
    }

    /// Plans exactly `spec.post_count` events over the given cast.
    ///
    /// Retries the full request on schema, cardinality or referential
    /// failures up to the configured bound.
    pub async fn plan(
        &self,
        spec: &ChannelSpec,
        profiles: &[UserProfile],
    ) -> AgentResult<Vec<ScriptEvent>> {
        if profiles.is_empty() {
            return Err(AgentError::Configuration(
                "cannot plan a script over an empty persona set".to_string(),
            ));
        }

        retry_with_backoff(&self.config.retry, Self::STAGE_NAME, || {
            self.attempt_plan(spec, profiles)
        })
        .await
    }

    async fn attempt_plan(
        &self,
        spec: &ChannelSpec,
        profiles: &[UserProfile],
    ) -> AgentResult<Vec<ScriptEvent>> {
        let request = GenerationRequest::new(
            "",
            vec![
                Message::system(prompts::SOCIAL_SCIENTIST_SYSTEM_PROMPT),
                Message::user(prompts::build_script_prompt(spec, profiles)),
            ],
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let content = self.llm_client.generate_text(request).await?;
        let script = parse_script(&content)?;
        validate_script(spec, profiles, &script)?;

        tracing::debug!(
            events = script.len(),
            channel = %spec.title,
            "Planned interaction script"
        );
        Ok(script)
    }

    /// Returns the agent configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }
}

/// Wire shape of a script response.
#[derive(Debug, Deserialize)]
struct ScriptResponse {
    #[serde(rename = "SCRIPT")]
    script: Vec<WireEvent>,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(rename = "USER")]
    user: String,
    #[serde(rename = "TIME")]
    time: String,
    #[serde(rename = "PURPOSE")]
    purpose: String,
    #[serde(rename = "FEATURES")]
    features: WireFeatures,
}

#[derive(Debug, Deserialize)]
struct WireFeatures {
    #[serde(rename = "TOXICITY")]
    toxicity: String,
    #[serde(rename = "SENTIMENT")]
    sentiment: String,
    #[serde(rename = "EMOTION")]
    emotion: String,
}

/// Parses a script response into domain events.
///
/// Timestamp parsing happens here: an unparseable `TIME` is a schema error
/// for the whole response, since the event would have no place in the
/// simulated timeline.
pub(crate) fn parse_script(content: &str) -> AgentResult<Vec<ScriptEvent>> {
    let json = extract_json_object(content)
        .into_result_with_context(content)
        .map_err(|e| AgentError::Schema(e.to_string()))?;

    let parsed: ScriptResponse = serde_json::from_str(&json)
        .map_err(|e| AgentError::Schema(format!("Invalid SCRIPT JSON: {}", e)))?;

    parsed
        .script
        .into_iter()
        .enumerate()
        .map(|(index, event)| {
            let timestamp = parse_event_time(&event.time).ok_or_else(|| {
                AgentError::Schema(format!(
                    "event {} has unparseable TIME '{}'",
                    index, event.time
                ))
            })?;

            Ok(ScriptEvent {
                username: event.user.trim().to_string(),
                timestamp,
                purpose: event.purpose,
                features: FeatureSet {
                    toxicity: event.features.toxicity,
                    sentiment: event.features.sentiment,
                    emotion: event.features.emotion,
                },
            })
        })
        .collect()
}

/// Validates a script against the channel spec and persona set.
///
/// Checks exact cardinality, that every referenced username belongs to the
/// cast, and that every event carries a purpose and a complete feature set.
/// Out-of-order timestamps are logged, not rejected: sequence order is the
/// canonical ordering. Never mutates its input.
pub fn validate_script(
    spec: &ChannelSpec,
    profiles: &[UserProfile],
    script: &[ScriptEvent],
) -> AgentResult<()> {
    let expected = spec.post_count as usize;
    if script.len() != expected {
        return Err(AgentError::Cardinality {
            expected,
            actual: script.len(),
        });
    }

    let roster: HashSet<&str> = profiles.iter().map(|p| p.username.as_str()).collect();

    for (index, event) in script.iter().enumerate() {
        if !roster.contains(event.username.as_str()) {
            return Err(AgentError::Referential {
                username: event.username.clone(),
            });
        }
        if event.purpose.trim().is_empty() {
            return Err(AgentError::Schema(format!(
                "event {} has an empty PURPOSE",
                index
            )));
        }
        if !event.features.is_complete() {
            return Err(AgentError::Schema(format!(
                "event {} has an incomplete FEATURES set",
                index
            )));
        }
    }

    for window in script.windows(2) {
        if window[1].timestamp < window[0].timestamp {
            tracing::warn!(
                earlier = %window[0].timestamp,
                later = %window[1].timestamp,
                "Script timestamps are not non-decreasing; sequence order wins"
            );
            break;
        }
    }

    Ok(())
}
