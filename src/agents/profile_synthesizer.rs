//! Persona synthesis for a channel.
//!
//! First stage of the pipeline: given a [`ChannelSpec`], produce exactly
//! `user_count` personas with pairwise-distinct usernames. The full request
//! is retried on malformed output; a run never proceeds to script planning
//! with a partial cast.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use crate::channel::ChannelSpec;
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::prompts;
use crate::utils::json_extraction::extract_json_object;

use super::error::{AgentError, AgentResult};
use super::retry::{retry_with_backoff, RetryPolicy};
use super::types::UserProfile;

/// Configuration for the profile synthesizer agent.
#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    /// Sampling temperature; high enough to vary the cast.
    pub temperature: f64,
    /// Maximum tokens for the persona response.
    pub max_tokens: u32,
    /// Retry policy for the full synthesis request.
    pub retry: RetryPolicy,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            temperature: 0.9,
            max_tokens: 4000,
            retry: RetryPolicy::default(),
        }
    }
}

impl SynthesizerConfig {
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

/// Agent that synthesizes the persona cast for a channel.
pub struct ProfileSynthesizerAgent {
    llm_client: Arc<dyn LlmProvider>,
    config: SynthesizerConfig,
}

impl std::fmt::Debug for ProfileSynthesizerAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileSynthesizerAgent")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProfileSynthesizerAgent {
    /// Stage name used in logs and terminal errors.
    pub const STAGE_NAME: &'static str = "profile_synthesis";

    /// Creates a new synthesizer agent.
    pub fn new(llm_client: Arc<dyn LlmProvider>, config: SynthesizerConfig) -> Self {
        Self { llm_client, config }
    }

    /// Creates a new synthesizer agent with default configuration.
    pub fn with_defaults(llm_client: Arc<dyn LlmProvider>) -> Self {
        Self::new(llm_client, SynthesizerConfig::default())
    }

    /// Synthesizes exactly `spec.user_count` personas for the channel.
    ///
    /// Retries the full request on schema or cardinality failures up to the
    /// configured bound, then fails with [`AgentError::Exhausted`].
    pub async fn synthesize(&self, spec: &ChannelSpec) -> AgentResult<Vec<UserProfile>> {
        spec.validate()
            .map_err(|e| AgentError::Configuration(e.to_string()))?;

        retry_with_backoff(&self.config.retry, Self::STAGE_NAME, || {
            self.attempt_synthesize(spec)
        })
        .await
    }

    async fn attempt_synthesize(&self, spec: &ChannelSpec) -> AgentResult<Vec<UserProfile>> {
        let request = GenerationRequest::new(
            "",
            vec![
                Message::system(prompts::SOCIAL_SCIENTIST_SYSTEM_PROMPT),
                Message::user(prompts::build_profile_prompt(spec)),
            ],
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let content = self.llm_client.generate_text(request).await?;
        let profiles = parse_profiles(&content)?;
        validate_profiles(spec, &profiles)?;

        tracing::debug!(
            count = profiles.len(),
            channel = %spec.title,
            "Synthesized persona cast"
        );
        Ok(profiles)
    }

    /// Drafts a complete channel spec from a one-line seed description.
    ///
    /// Restores the abstract-writing operation: useful when the caller has
    /// only an idea of the channel, not its parameters.
    pub async fn draft_spec(&self, seed: &str) -> AgentResult<ChannelSpec> {
        if seed.trim().is_empty() {
            return Err(AgentError::Configuration(
                "seed description must not be empty".to_string(),
            ));
        }

        retry_with_backoff(&self.config.retry, "spec_draft", || {
            self.attempt_draft_spec(seed)
        })
        .await
    }

    async fn attempt_draft_spec(&self, seed: &str) -> AgentResult<ChannelSpec> {
        let request = GenerationRequest::new(
            "",
            vec![
                Message::system(prompts::SOCIAL_SCIENTIST_SYSTEM_PROMPT),
                Message::user(prompts::build_spec_draft_prompt(seed)),
            ],
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let content = self.llm_client.generate_text(request).await?;
        parse_drafted_spec(&content)
    }

    /// Returns the agent configuration.
    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }
}

/// Wire shape of a persona response.
#[derive(Debug, Deserialize)]
struct UsersResponse {
    #[serde(rename = "USERS")]
    users: Vec<WireProfile>,
}

#[derive(Debug, Deserialize)]
struct WireProfile {
    #[serde(rename = "USERNAME")]
    username: String,
    #[serde(rename = "BIO")]
    bio: String,
    #[serde(rename = "PERSONALITY")]
    personality: String,
}

/// Parses a persona response into domain profiles.
pub(crate) fn parse_profiles(content: &str) -> AgentResult<Vec<UserProfile>> {
    let json = extract_json_object(content)
        .into_result_with_context(content)
        .map_err(|e| AgentError::Schema(e.to_string()))?;

    let parsed: UsersResponse = serde_json::from_str(&json)
        .map_err(|e| AgentError::Schema(format!("Invalid USERS JSON: {}", e)))?;

    Ok(parsed
        .users
        .into_iter()
        .map(|u| UserProfile {
            username: u.username.trim().to_string(),
            bio: u.bio,
            personality: u.personality,
        })
        .collect())
}

/// Validates a persona set against the channel spec.
///
/// Checks exact cardinality, non-empty fields and username uniqueness.
/// Never mutates its input; re-validating a valid set always succeeds.
pub fn validate_profiles(spec: &ChannelSpec, profiles: &[UserProfile]) -> AgentResult<()> {
    let expected = spec.user_count as usize;
    if profiles.len() != expected {
        return Err(AgentError::Cardinality {
            expected,
            actual: profiles.len(),
        });
    }

    let mut seen = HashSet::new();
    for profile in profiles {
        if profile.username.is_empty() {
            return Err(AgentError::Schema("empty username in USERS".to_string()));
        }
        if profile.bio.trim().is_empty() || profile.personality.trim().is_empty() {
            return Err(AgentError::Schema(format!(
                "persona '{}' is missing bio or personality",
                profile.username
            )));
        }
        if !seen.insert(profile.username.as_str()) {
            return Err(AgentError::Schema(format!(
                "duplicate username '{}' in USERS",
                profile.username
            )));
        }
    }

    Ok(())
}

/// Wire shape of a drafted channel spec.
#[derive(Debug, Deserialize)]
struct DraftedSpecResponse {
    #[serde(rename = "TITLE")]
    title: String,
    #[serde(rename = "DESCRIPTION")]
    description: String,
    #[serde(rename = "NUMBER_OF_USERS")]
    user_count: serde_json::Value,
    #[serde(rename = "CHANNEL_VIBE")]
    vibe: String,
    #[serde(rename = "STORY_AGENDA")]
    agenda: String,
    #[serde(rename = "NUMBER_OF_POSTS")]
    post_count: serde_json::Value,
}

/// Parses a drafted spec response into a validated [`ChannelSpec`].
fn parse_drafted_spec(content: &str) -> AgentResult<ChannelSpec> {
    let json = extract_json_object(content)
        .into_result_with_context(content)
        .map_err(|e| AgentError::Schema(e.to_string()))?;

    let parsed: DraftedSpecResponse = serde_json::from_str(&json)
        .map_err(|e| AgentError::Schema(format!("Invalid drafted spec JSON: {}", e)))?;

    // A drafted channel with no participants is unusable downstream
    let user_count = parse_count(&parsed.user_count, "NUMBER_OF_USERS")?.max(1);
    let post_count = parse_count(&parsed.post_count, "NUMBER_OF_POSTS")?.max(1);

    ChannelSpec::new(
        parsed.title,
        parsed.description,
        user_count,
        parsed.vibe,
        parsed.agenda,
        post_count,
    )
    .map_err(|e| AgentError::Schema(e.to_string()))
}

/// Reads a count that may arrive as a JSON number or a numeric string.
fn parse_count(value: &serde_json::Value, field: &str) -> AgentResult<u32> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    parsed
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| AgentError::Schema(format!("{} is not a non-negative integer", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{mock_profiles_response, MockLlmProvider, MockReply};
    use std::time::Duration;

    fn spec(user_count: u32) -> ChannelSpec {
        ChannelSpec::new("Title", "Desc", user_count, "Vibe", "Agenda", 5).expect("valid")
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(max_attempts)
            .with_base_delay(Duration::from_millis(1))
    }

    fn agent_with(mock: Arc<MockLlmProvider>, max_attempts: u32) -> ProfileSynthesizerAgent {
        let config = SynthesizerConfig::new().with_retry(fast_retry(max_attempts));
        ProfileSynthesizerAgent::new(mock, config)
    }

    #[tokio::test]
    async fn test_synthesize_exact_cast() {
        let mock = Arc::new(MockLlmProvider::single_text(mock_profiles_response()));
        let agent = agent_with(Arc::clone(&mock), 4);

        let profiles = agent.synthesize(&spec(3)).await.expect("cast");
        assert_eq!(profiles.len(), 3);
        assert_eq!(profiles[0].username, "synth_sarah");
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_synthesize_recovers_from_malformed_output() {
        let mock = Arc::new(MockLlmProvider::with_texts(vec![
            "sorry, here you go:".to_string(),
            r#"{"USERS": [{"USERNAME": "only_one", "BIO": "b", "PERSONALITY": "p"}]}"#.to_string(),
            mock_profiles_response(),
        ]));
        let agent = agent_with(Arc::clone(&mock), 4);

        let profiles = agent.synthesize(&spec(3)).await.expect("cast");
        assert_eq!(profiles.len(), 3);
        // Attempt 1: no JSON, attempt 2: wrong cardinality, attempt 3: valid
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_synthesize_exhausts_retry_bound() {
        let mock = Arc::new(MockLlmProvider::single_text("never json"));
        let agent = agent_with(Arc::clone(&mock), 3);

        let result = agent.synthesize(&spec(3)).await;
        match result {
            Err(AgentError::Exhausted {
                stage, attempts, ..
            }) => {
                assert_eq!(stage, ProfileSynthesizerAgent::STAGE_NAME);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_synthesize_retries_transport_errors() {
        let mock = Arc::new(MockLlmProvider::new(vec![
            MockReply::TransportError("timeout".into()),
            MockReply::text(mock_profiles_response()),
        ]));
        let agent = agent_with(Arc::clone(&mock), 4);

        let profiles = agent.synthesize(&spec(3)).await.expect("cast");
        assert_eq!(profiles.len(), 3);
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_synthesize_rejects_invalid_spec_without_calling_llm() {
        let mock = Arc::new(MockLlmProvider::single_text(mock_profiles_response()));
        let agent = agent_with(Arc::clone(&mock), 4);

        let bad_spec = ChannelSpec {
            title: "T".into(),
            description: "D".into(),
            user_count: 0,
            vibe: "V".into(),
            agenda: "A".into(),
            post_count: 5,
        };

        let result = agent.synthesize(&bad_spec).await;
        assert!(matches!(result, Err(AgentError::Configuration(_))));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_draft_spec_from_seed() {
        let drafted = r#"{
            "TITLE": "Trail Runners of the North",
            "DESCRIPTION": "Weekly route swaps and race reports",
            "NUMBER_OF_USERS": "6",
            "CHANNEL_VIBE": "Supportive with friendly rivalry",
            "STORY_AGENDA": "An upcoming 50k race",
            "NUMBER_OF_POSTS": 15
        }"#;
        let mock = Arc::new(MockLlmProvider::single_text(drafted));
        let agent = agent_with(mock, 4);

        let spec = agent.draft_spec("a trail running community").await.expect("spec");
        assert_eq!(spec.user_count, 6);
        assert_eq!(spec.post_count, 15);
        assert_eq!(spec.title, "Trail Runners of the North");
    }

    #[tokio::test]
    async fn test_draft_spec_clamps_zero_counts() {
        let drafted = r#"{
            "TITLE": "T", "DESCRIPTION": "D",
            "NUMBER_OF_USERS": 0, "CHANNEL_VIBE": "V",
            "STORY_AGENDA": "A", "NUMBER_OF_POSTS": 0
        }"#;
        let mock = Arc::new(MockLlmProvider::single_text(drafted));
        let agent = agent_with(mock, 4);

        let spec = agent.draft_spec("seed").await.expect("spec");
        assert_eq!(spec.user_count, 1);
        assert_eq!(spec.post_count, 1);
    }

    #[tokio::test]
    async fn test_draft_spec_rejects_empty_seed() {
        let mock = Arc::new(MockLlmProvider::single_text("{}"));
        let agent = agent_with(Arc::clone(&mock), 4);

        let result = agent.draft_spec("  ").await;
        assert!(matches!(result, Err(AgentError::Configuration(_))));
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn test_validate_profiles_duplicate_username() {
        let profiles = vec![
            UserProfile {
                username: "dup".into(),
                bio: "b".into(),
                personality: "p".into(),
            },
            UserProfile {
                username: "dup".into(),
                bio: "b2".into(),
                personality: "p2".into(),
            },
        ];
        let result = validate_profiles(&spec(2), &profiles);
        assert!(matches!(result, Err(AgentError::Schema(_))));
    }

    #[test]
    fn test_validate_profiles_cardinality() {
        let profiles = vec![UserProfile {
            username: "solo".into(),
            bio: "b".into(),
            personality: "p".into(),
        }];
        match validate_profiles(&spec(3), &profiles) {
            Err(AgentError::Cardinality { expected, actual }) => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 1);
            }
            other => panic!("expected Cardinality, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_profiles_is_idempotent() {
        let profiles = parse_profiles(&mock_profiles_response()).expect("parses");
        let before = profiles.clone();
        validate_profiles(&spec(3), &profiles).expect("first validation");
        validate_profiles(&spec(3), &profiles).expect("second validation");
        assert_eq!(profiles, before);
    }

    #[test]
    fn test_parse_profiles_trims_usernames() {
        let content = r#"{"USERS": [{"USERNAME": " padded ", "BIO": "b", "PERSONALITY": "p"}]}"#;
        let profiles = parse_profiles(content).expect("parses");
        assert_eq!(profiles[0].username, "padded");
    }
}
