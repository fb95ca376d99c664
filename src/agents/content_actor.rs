//! Post rendering with adversarial revision.
//!
//! Third stage of the pipeline: for one script event, render the post text
//! in the acting persona's voice, grounded on a bounded window of the prior
//! history, then run the draft through the judge. Rejected drafts are
//! revised with the critique appended as corrective guidance, through an
//! explicit bounded state machine:
//!
//! ```text
//! Drafted -> Judged -> Accepted                  (judge satisfied)
//!                   -> Critiqued -> Revised -> Judged -> ...
//!                   -> Exhausted                (round bound spent)
//! ```
//!
//! Both terminal states yield a usable post; `Exhausted` keeps the last
//! draft regardless of verdict, so the loop always terminates. Critiques are
//! transient: each one steers exactly one revision and is then dropped.

use std::sync::Arc;

use serde::Deserialize;

use crate::channel::ChannelSpec;
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::prompts;
use crate::utils::json_extraction::extract_json_object;

use super::error::{AgentError, AgentResult};
use super::judge::JudgeAgent;
use super::retry::{retry_with_backoff, RetryPolicy};
use super::types::{Post, ScriptEvent, UserProfile};

/// Configuration for the content actor agent.
#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// Sampling temperature; high, posts should vary in voice.
    pub temperature: f64,
    /// Maximum tokens per rendered post.
    pub max_tokens: u32,
    /// How many of the most recent prior posts the prompt includes.
    pub context_window: usize,
    /// Maximum revision rounds before the last draft is accepted as-is.
    pub max_revision_rounds: u32,
    /// Retry policy for each individual draft/revision call.
    pub retry: RetryPolicy,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            max_tokens: 1000,
            context_window: 12,
            max_revision_rounds: 5,
            retry: RetryPolicy::default(),
        }
    }
}

impl ActorConfig {
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

    /// Sets the context window (clamped to at least 1).
    pub fn with_context_window(mut self, context_window: usize) -> Self {
        self.context_window = context_window.max(1);
        self
    }

    /// Sets the revision round bound.
    pub fn with_max_revision_rounds(mut self, max_revision_rounds: u32) -> Self {
        self.max_revision_rounds = max_revision_rounds;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// How the revision loop ended for one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RevisionOutcome {
    /// The judge accepted a draft within the round bound.
    Accepted {
        /// Revision rounds performed before acceptance.
        rounds: u32,
    },
    /// The round bound was spent; the last draft was kept regardless.
    Exhausted {
        /// Revision rounds performed.
        rounds: u32,
    },
}

impl RevisionOutcome {
    /// Revision rounds performed.
    pub fn rounds(&self) -> u32 {
        match self {
            RevisionOutcome::Accepted { rounds } | RevisionOutcome::Exhausted { rounds } => *rounds,
        }
    }
}

/// A rendered post together with its revision outcome.
#[derive(Debug, Clone)]
pub struct RenderedPost {
    /// The final post.
    pub post: Post,
    /// How the revision loop ended.
    pub revision: RevisionOutcome,
}

/// States of the per-post revision machine.
enum RevisionState {
    /// A draft awaits the judge.
    Judged { draft: String },
    /// The judge rejected the draft; a revision is due.
    Critiqued { draft: String, critique: String },
    /// Terminal: the text is final.
    Done {
        text: String,
        outcome: RevisionOutcome,
    },
}

/// Agent that renders post text for script events.
pub struct ContentActorAgent {
    llm_client: Arc<dyn LlmProvider>,
    judge: JudgeAgent,
    config: ActorConfig,
}

impl std::fmt::Debug for ContentActorAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentActorAgent")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ContentActorAgent {
    /// Stage name used in logs and terminal errors.
    pub const STAGE_NAME: &'static str = "post_rendering";

    /// Creates a new actor agent with an explicit judge.
    pub fn new(llm_client: Arc<dyn LlmProvider>, judge: JudgeAgent, config: ActorConfig) -> Self {
        Self {
            llm_client,
            judge,
            config,
        }
    }

    /// Creates a new actor agent with a default-configured judge.
    pub fn with_defaults(llm_client: Arc<dyn LlmProvider>) -> Self {
        let judge = JudgeAgent::with_defaults(Arc::clone(&llm_client));
        Self::new(llm_client, judge, ActorConfig::default())
    }

    /// Renders the post for one script event.
    ///
    /// `history` is the full prior history in script order; the prompt uses
    /// only the configured window of most recent posts. The caller appends
    /// the returned post to the history - this agent never mutates it.
    pub async fn render(
        &self,
        spec: &ChannelSpec,
        event: &ScriptEvent,
        profiles: &[UserProfile],
        history: &[Post],
    ) -> AgentResult<Post> {
        self.render_detailed(spec, event, profiles, history)
            .await
            .map(|rendered| rendered.post)
    }

    /// As [`render`](Self::render), also reporting the revision outcome.
    pub async fn render_detailed(
        &self,
        spec: &ChannelSpec,
        event: &ScriptEvent,
        profiles: &[UserProfile],
        history: &[Post],
    ) -> AgentResult<RenderedPost> {
        let persona = profiles
            .iter()
            .find(|p| p.username == event.username)
            .ok_or_else(|| AgentError::Referential {
                username: event.username.clone(),
            })?;

        let window_start = history.len().saturating_sub(self.config.context_window);
        let base_prompt = prompts::build_post_prompt(spec, persona, event, &history[window_start..]);

        let draft = retry_with_backoff(&self.config.retry, Self::STAGE_NAME, || {
            self.attempt_draft(&base_prompt)
        })
        .await?;

        let (text, outcome) = self.refine(&base_prompt, draft).await?;

        tracing::debug!(
            username = %event.username,
            rounds = outcome.rounds(),
            accepted = matches!(outcome, RevisionOutcome::Accepted { .. }),
            "Rendered post"
        );

        Ok(RenderedPost {
            post: Post {
                username: event.username.clone(),
                timestamp: event.timestamp,
                text,
            },
            revision: outcome,
        })
    }

    /// Runs the bounded judge/revise machine over an initial draft.
    async fn refine(
        &self,
        base_prompt: &str,
        initial_draft: String,
    ) -> AgentResult<(String, RevisionOutcome)> {
        let mut rounds = 0u32;
        let mut state = RevisionState::Judged {
            draft: initial_draft,
        };

        loop {
            state = match state {
                RevisionState::Judged { draft } => {
                    let verdict = self.judge.assess(&draft).await?;

                    if !verdict.ai_generated {
                        RevisionState::Done {
                            text: draft,
                            outcome: RevisionOutcome::Accepted { rounds },
                        }
                    } else if rounds >= self.config.max_revision_rounds {
                        tracing::warn!(
                            rounds,
                            "Revision bound spent; keeping last draft despite verdict"
                        );
                        RevisionState::Done {
                            text: draft,
                            outcome: RevisionOutcome::Exhausted { rounds },
                        }
                    } else {
                        RevisionState::Critiqued {
                            draft,
                            critique: verdict.feedback,
                        }
                    }
                }
                RevisionState::Critiqued { draft, critique } => {
                    rounds += 1;
                    tracing::debug!(round = rounds, critique = %critique, "Revising draft");

                    let prompt = format!(
                        "{}\n\n{}",
                        base_prompt,
                        prompts::build_revision_suffix(&draft, &critique)
                    );
                    let revised = retry_with_backoff(&self.config.retry, "post_revision", || {
                        self.attempt_draft(&prompt)
                    })
                    .await?;

                    RevisionState::Judged { draft: revised }
                }
                RevisionState::Done { text, outcome } => return Ok((text, outcome)),
            };
        }
    }

    /// One draft call: generate, extract, parse, reject empty posts.
    async fn attempt_draft(&self, prompt: &str) -> AgentResult<String> {
        let request = GenerationRequest::new(
            "",
            vec![
                Message::system(prompts::ACTOR_SYSTEM_PROMPT),
                Message::user(prompt.to_string()),
            ],
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let content = self.llm_client.generate_text(request).await?;
        parse_draft(&content)
    }

    /// Returns the agent configuration.
    pub fn config(&self) -> &ActorConfig {
        &self.config
    }
}

/// Wire shape of a rendered draft.
#[derive(Debug, Deserialize)]
struct DraftResponse {
    #[serde(rename = "POST")]
    post: String,
    #[serde(rename = "REASONING", default)]
    reasoning: Option<String>,
}

/// Parses a draft response into post text.
pub(crate) fn parse_draft(content: &str) -> AgentResult<String> {
    let json = extract_json_object(content)
        .into_result_with_context(content)
        .map_err(|e| AgentError::Schema(e.to_string()))?;

    let parsed: DraftResponse = serde_json::from_str(&json)
        .map_err(|e| AgentError::Schema(format!("Invalid POST JSON: {}", e)))?;

    if parsed.post.trim().is_empty() {
        return Err(AgentError::Schema("POST text is empty".to_string()));
    }

    if let Some(reasoning) = parsed.reasoning {
        // Transient: the actor's self-explanation is never part of the record
        tracing::debug!(reasoning = %reasoning, "Draft reasoning");
    }

    Ok(parsed.post)
}
