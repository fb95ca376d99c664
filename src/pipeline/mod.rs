//! Channel generation pipeline orchestrator.
//!
//! Drives the three stages in strict sequence:
//!
//! 1. **Profile synthesis**: the persona cast, exactly `user_count` strong
//! 2. **Script planning**: the ordered interaction script, exactly
//!    `post_count` events over that cast
//! 3. **Post rendering**: one post per event, in script order, each grounded
//!    on the prefix of posts rendered before it
//!
//! The orchestrator is the single writer of the append-only post history;
//! agents only ever see it as a slice. Stages never overlap: planning needs
//! the finished cast, rendering needs the finished script, and rendering in
//! script order is what guarantees a post never references content that
//! comes after it. Progress is emitted as [`PipelineEvent`]s over an mpsc
//! channel for display layers; send errors are ignored.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::agents::content_actor::{ActorConfig, ContentActorAgent, RevisionOutcome};
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::judge::{JudgeAgent, JudgeConfig};
use crate::agents::profile_synthesizer::{ProfileSynthesizerAgent, SynthesizerConfig};
use crate::agents::retry::RetryPolicy;
use crate::agents::script_planner::{PlannerConfig, ScriptPlannerAgent};
use crate::agents::types::{Post, ScriptEvent, UserProfile};
use crate::channel::ChannelSpec;
use crate::llm::LlmProvider;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the channel pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Configuration for the profile synthesizer.
    pub synthesizer_config: SynthesizerConfig,
    /// Configuration for the script planner.
    pub planner_config: PlannerConfig,
    /// Configuration for the content actor.
    pub actor_config: ActorConfig,
    /// Configuration for the adversarial judge.
    pub judge_config: JudgeConfig,
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the synthesizer configuration.
    pub fn with_synthesizer_config(mut self, config: SynthesizerConfig) -> Self {
        self.synthesizer_config = config;
        self
    }

    /// Sets the planner configuration.
    pub fn with_planner_config(mut self, config: PlannerConfig) -> Self {
        self.planner_config = config;
        self
    }

    /// Sets the actor configuration.
    pub fn with_actor_config(mut self, config: ActorConfig) -> Self {
        self.actor_config = config;
        self
    }

    /// Sets the judge configuration.
    pub fn with_judge_config(mut self, config: JudgeConfig) -> Self {
        self.judge_config = config;
        self
    }

    /// Applies one retry policy across all four agents.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.synthesizer_config.retry = retry.clone();
        self.planner_config.retry = retry.clone();
        self.actor_config.retry = retry.clone();
        self.judge_config.retry = retry;
        self
    }

    /// Sets the revision round bound on the actor.
    pub fn with_max_revision_rounds(mut self, rounds: u32) -> Self {
        self.actor_config.max_revision_rounds = rounds;
        self
    }
}

// ============================================================================
// Pipeline Stage Enum
// ============================================================================

/// Stages in the channel generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    /// Synthesizing the persona cast.
    ProfileSynthesis,
    /// Planning the interaction script.
    ScriptPlanning,
    /// Rendering posts in script order.
    PostRendering,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::ProfileSynthesis => write!(f, "Profile Synthesis"),
            PipelineStage::ScriptPlanning => write!(f, "Script Planning"),
            PipelineStage::PostRendering => write!(f, "Post Rendering"),
        }
    }
}

// ============================================================================
// Pipeline Events
// ============================================================================

/// Events emitted during channel generation for progress display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// A pipeline stage has started.
    StageStarted {
        /// The stage that started.
        stage: PipelineStage,
        /// When the stage started.
        timestamp: DateTime<Utc>,
    },
    /// The persona cast is complete.
    ProfilesSynthesized {
        /// Number of personas synthesized.
        count: usize,
        /// When synthesis completed.
        timestamp: DateTime<Utc>,
    },
    /// The interaction script is complete.
    ScriptPlanned {
        /// Number of planned events.
        count: usize,
        /// When planning completed.
        timestamp: DateTime<Utc>,
    },
    /// One post was rendered and appended to the history.
    PostRendered {
        /// 0-based index of the post in the history.
        index: usize,
        /// Author username.
        username: String,
        /// How the revision loop ended for this post.
        revision: RevisionOutcome,
        /// When rendering completed.
        timestamp: DateTime<Utc>,
    },
    /// The pipeline completed successfully.
    PipelineComplete {
        /// Identifier of this generation run.
        run_id: Uuid,
        /// Number of posts in the finished history.
        post_count: usize,
        /// Total duration in milliseconds.
        total_duration_ms: u64,
    },
    /// The pipeline failed terminally.
    PipelineFailed {
        /// Error description.
        error: String,
        /// Stage where the failure occurred.
        stage: PipelineStage,
        /// When the failure occurred.
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Creates a StageStarted event.
    pub fn stage_started(stage: PipelineStage) -> Self {
        Self::StageStarted {
            stage,
            timestamp: Utc::now(),
        }
    }

    /// Creates a ProfilesSynthesized event.
    pub fn profiles_synthesized(count: usize) -> Self {
        Self::ProfilesSynthesized {
            count,
            timestamp: Utc::now(),
        }
    }

    /// Creates a ScriptPlanned event.
    pub fn script_planned(count: usize) -> Self {
        Self::ScriptPlanned {
            count,
            timestamp: Utc::now(),
        }
    }

    /// Creates a PostRendered event.
    pub fn post_rendered(index: usize, username: impl Into<String>, revision: RevisionOutcome) -> Self {
        Self::PostRendered {
            index,
            username: username.into(),
            revision,
            timestamp: Utc::now(),
        }
    }

    /// Creates a PipelineComplete event.
    pub fn pipeline_complete(run_id: Uuid, post_count: usize, total_duration_ms: u64) -> Self {
        Self::PipelineComplete {
            run_id,
            post_count,
            total_duration_ms,
        }
    }

    /// Creates a PipelineFailed event.
    pub fn pipeline_failed(error: impl Into<String>, stage: PipelineStage) -> Self {
        Self::PipelineFailed {
            error: error.into(),
            stage,
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// Pipeline Output
// ============================================================================

/// The complete output of one channel generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDataset {
    /// The channel spec the run was generated from.
    pub spec: ChannelSpec,
    /// The synthesized persona cast.
    pub profiles: Vec<UserProfile>,
    /// The planned interaction script.
    pub script: Vec<ScriptEvent>,
    /// The rendered post history, in script order.
    pub posts: Vec<Post>,
}

// ============================================================================
// Channel Orchestrator
// ============================================================================

/// Orchestrator that runs the channel generation pipeline.
pub struct ChannelOrchestrator {
    /// The profile synthesizer (PlayWrite role).
    synthesizer: ProfileSynthesizerAgent,
    /// The script planner (Director role).
    planner: ScriptPlannerAgent,
    /// The content actor, with its judge (Actor + Judge roles).
    actor: ContentActorAgent,
    /// Pipeline configuration.
    config: PipelineConfig,
}

impl ChannelOrchestrator {
    /// Creates a new orchestrator over one LLM client.
    pub fn new(llm_client: Arc<dyn LlmProvider>, config: PipelineConfig) -> Self {
        let synthesizer = ProfileSynthesizerAgent::new(
            Arc::clone(&llm_client),
            config.synthesizer_config.clone(),
        );
        let planner =
            ScriptPlannerAgent::new(Arc::clone(&llm_client), config.planner_config.clone());
        let judge = JudgeAgent::new(Arc::clone(&llm_client), config.judge_config.clone());
        let actor = ContentActorAgent::new(llm_client, judge, config.actor_config.clone());

        Self {
            synthesizer,
            planner,
            actor,
            config,
        }
    }

    /// Creates a new orchestrator with default configuration.
    pub fn with_defaults(llm_client: Arc<dyn LlmProvider>) -> Self {
        Self::new(llm_client, PipelineConfig::default())
    }

    /// Runs the full pipeline for one channel.
    ///
    /// Returns the finished dataset, or the first terminal failure. A
    /// terminal failure aborts the run; no placeholder content is ever
    /// substituted for a stage that could not produce a valid result.
    pub async fn run(
        &self,
        spec: &ChannelSpec,
        event_tx: mpsc::Sender<PipelineEvent>,
    ) -> AgentResult<ChannelDataset> {
        let run_id = Uuid::new_v4();
        let start_time = Instant::now();

        spec.validate()
            .map_err(|e| AgentError::Configuration(e.to_string()))?;

        tracing::info!(%run_id, channel = %spec.title, "Starting channel generation");

        // Stage 1: profile synthesis
        self.send_event(
            &event_tx,
            PipelineEvent::stage_started(PipelineStage::ProfileSynthesis),
        )
        .await;

        let profiles = match self.synthesizer.synthesize(spec).await {
            Ok(profiles) => profiles,
            Err(e) => {
                return self
                    .fail(&event_tx, e, PipelineStage::ProfileSynthesis)
                    .await;
            }
        };

        self.send_event(
            &event_tx,
            PipelineEvent::profiles_synthesized(profiles.len()),
        )
        .await;

        // Stage 2: script planning
        self.send_event(
            &event_tx,
            PipelineEvent::stage_started(PipelineStage::ScriptPlanning),
        )
        .await;

        let script = match self.planner.plan(spec, &profiles).await {
            Ok(script) => script,
            Err(e) => {
                return self.fail(&event_tx, e, PipelineStage::ScriptPlanning).await;
            }
        };

        self.send_event(&event_tx, PipelineEvent::script_planned(script.len()))
            .await;

        // Stage 3: post rendering, strictly in script order
        self.send_event(
            &event_tx,
            PipelineEvent::stage_started(PipelineStage::PostRendering),
        )
        .await;

        let mut history: Vec<Post> = Vec::with_capacity(script.len());
        for (index, event) in script.iter().enumerate() {
            let rendered = match self
                .actor
                .render_detailed(spec, event, &profiles, &history)
                .await
            {
                Ok(rendered) => rendered,
                Err(e) => {
                    return self.fail(&event_tx, e, PipelineStage::PostRendering).await;
                }
            };

            history.push(rendered.post);
            debug_assert_eq!(history.len(), index + 1);

            self.send_event(
                &event_tx,
                PipelineEvent::post_rendered(index, event.username.as_str(), rendered.revision),
            )
            .await;
        }

        let total_duration_ms = start_time.elapsed().as_millis() as u64;
        self.send_event(
            &event_tx,
            PipelineEvent::pipeline_complete(run_id, history.len(), total_duration_ms),
        )
        .await;

        tracing::info!(
            %run_id,
            posts = history.len(),
            duration_ms = total_duration_ms,
            "Channel generation complete"
        );

        Ok(ChannelDataset {
            spec: spec.clone(),
            profiles,
            script,
            posts: history,
        })
    }

    /// Emits a failure event and propagates the error.
    async fn fail<T>(
        &self,
        event_tx: &mpsc::Sender<PipelineEvent>,
        error: AgentError,
        stage: PipelineStage,
    ) -> AgentResult<T> {
        tracing::error!(%stage, error = %error, "Pipeline stage failed");
        self.send_event(
            event_tx,
            PipelineEvent::pipeline_failed(error.to_string(), stage),
        )
        .await;
        Err(error)
    }

    /// Sends an event through the channel, ignoring send errors.
    async fn send_event(&self, event_tx: &mpsc::Sender<PipelineEvent>, event: PipelineEvent) {
        // Receiver may have been dropped; generation continues regardless
        let _ = event_tx.send(event).await;
    }

    /// Returns a reference to the profile synthesizer.
    pub fn synthesizer(&self) -> &ProfileSynthesizerAgent {
        &self.synthesizer
    }

    /// Returns a reference to the script planner.
    pub fn planner(&self) -> &ScriptPlannerAgent {
        &self.planner
    }

    /// Returns a reference to the content actor.
    pub fn actor(&self) -> &ContentActorAgent {
        &self.actor
    }

    /// Returns the pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{
        mock_draft_response, mock_profiles_response, mock_script_response, mock_verdict_response,
        MockLlmProvider,
    };
    use std::time::Duration;

    fn spec() -> ChannelSpec {
        ChannelSpec::new("Title", "Desc", 3, "Vibe", "Agenda", 5).expect("valid")
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig::new().with_retry_policy(
            RetryPolicy::new()
                .with_max_attempts(3)
                .with_base_delay(Duration::from_millis(1)),
        )
    }

    /// Replies for a clean run: cast, script, then draft + approval per post.
    fn happy_path_replies() -> Vec<String> {
        let mut replies = vec![mock_profiles_response(), mock_script_response()];
        for i in 0..5 {
            replies.push(mock_draft_response(&format!("post number {}", i)));
            replies.push(mock_verdict_response(false, "fine"));
        }
        replies
    }

    async fn drain(mut event_rx: mpsc::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        event_rx.close();
        while let Some(event) = event_rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_full_pipeline_success() {
        let mock = Arc::new(MockLlmProvider::with_texts(happy_path_replies()));
        let orchestrator = ChannelOrchestrator::new(Arc::clone(&mock) as Arc<dyn LlmProvider>, fast_config());

        let (event_tx, event_rx) = mpsc::channel(100);
        let dataset = orchestrator
            .run(&spec(), event_tx)
            .await
            .expect("pipeline succeeds");

        assert_eq!(dataset.profiles.len(), 3);
        assert_eq!(dataset.script.len(), 5);
        assert_eq!(dataset.posts.len(), 5);
        // 1 cast + 1 script + 5 * (draft + verdict)
        assert_eq!(mock.calls(), 12);

        let events = drain(event_rx).await;
        let has_complete = events
            .iter()
            .any(|e| matches!(e, PipelineEvent::PipelineComplete { post_count: 5, .. }));
        assert!(has_complete, "should emit PipelineComplete");
    }

    #[tokio::test]
    async fn test_history_order_and_timestamps_match_script() {
        let mock = Arc::new(MockLlmProvider::with_texts(happy_path_replies()));
        let orchestrator = ChannelOrchestrator::new(mock, fast_config());

        let (event_tx, _event_rx) = mpsc::channel(100);
        let dataset = orchestrator.run(&spec(), event_tx).await.expect("succeeds");

        for (i, (event, post)) in dataset.script.iter().zip(dataset.posts.iter()).enumerate() {
            assert_eq!(post.username, event.username, "post {} author", i);
            assert_eq!(post.timestamp, event.timestamp, "post {} timestamp", i);
            assert_eq!(post.text, format!("post number {}", i));
        }
    }

    #[tokio::test]
    async fn test_posts_see_only_prior_history() {
        let mock = Arc::new(MockLlmProvider::with_texts(happy_path_replies()));
        let orchestrator = ChannelOrchestrator::new(Arc::clone(&mock) as Arc<dyn LlmProvider>, fast_config());

        let (event_tx, _event_rx) = mpsc::channel(100);
        orchestrator.run(&spec(), event_tx).await.expect("succeeds");

        // Draft prompts are calls 2, 4, 6, 8, 10; the prompt for post i must
        // contain posts 0..i and nothing from i onward.
        for i in 0..5usize {
            let prompt = mock.user_prompt(2 + 2 * i).expect("draft prompt");
            for j in 0..i {
                assert!(
                    prompt.contains(&format!("post number {}", j)),
                    "post {} prompt missing earlier post {}",
                    i,
                    j
                );
            }
            assert!(
                !prompt.contains(&format!("post number {}", i)),
                "post {} prompt leaks later content",
                i
            );
        }
    }

    #[tokio::test]
    async fn test_profile_stage_recovers_after_malformed_output() {
        let mut replies = vec!["garbage".to_string(), "more garbage".to_string()];
        replies.extend(happy_path_replies());
        let mock = Arc::new(MockLlmProvider::with_texts(replies));
        let orchestrator = ChannelOrchestrator::new(Arc::clone(&mock) as Arc<dyn LlmProvider>, fast_config());

        let (event_tx, _event_rx) = mpsc::channel(100);
        let dataset = orchestrator.run(&spec(), event_tx).await.expect("succeeds");

        assert_eq!(dataset.profiles.len(), 3);
        assert_eq!(mock.calls(), 14);
    }

    #[tokio::test]
    async fn test_pipeline_fails_terminally_when_profiles_never_parse() {
        let mock = Arc::new(MockLlmProvider::single_text("never valid"));
        let orchestrator = ChannelOrchestrator::new(Arc::clone(&mock) as Arc<dyn LlmProvider>, fast_config());

        let (event_tx, event_rx) = mpsc::channel(100);
        let result = orchestrator.run(&spec(), event_tx).await;

        match result {
            Err(AgentError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected Exhausted, got {:?}", other),
        }
        // Exactly the bound's worth of attempts, then stop
        assert_eq!(mock.calls(), 3);

        let events = drain(event_rx).await;
        let failed = events.iter().any(|e| {
            matches!(
                e,
                PipelineEvent::PipelineFailed {
                    stage: PipelineStage::ProfileSynthesis,
                    ..
                }
            )
        });
        assert!(failed, "should emit PipelineFailed for the profile stage");
    }

    #[tokio::test]
    async fn test_pipeline_with_stubborn_judge_still_completes() {
        let mut replies = vec![mock_profiles_response(), mock_script_response()];
        // Judge never approves; every post exhausts its 2-round bound.
        // Per post: initial draft + 2 revisions, each followed by a verdict.
        for i in 0..5 {
            for round in 0..3 {
                replies.push(mock_draft_response(&format!("post {} round {}", i, round)));
                replies.push(mock_verdict_response(true, "reads artificial"));
            }
        }
        let mock = Arc::new(MockLlmProvider::with_texts(replies));
        let config = fast_config().with_max_revision_rounds(2);
        let orchestrator = ChannelOrchestrator::new(mock, config);

        let (event_tx, event_rx) = mpsc::channel(200);
        let dataset = orchestrator.run(&spec(), event_tx).await.expect("succeeds");

        assert_eq!(dataset.posts.len(), 5);

        let events = drain(event_rx).await;
        let exhausted_posts = events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    PipelineEvent::PostRendered {
                        revision: RevisionOutcome::Exhausted { rounds: 2 },
                        ..
                    }
                )
            })
            .count();
        assert_eq!(exhausted_posts, 5, "every post should exhaust its bound");
    }

    #[tokio::test]
    async fn test_stage_events_in_order() {
        let mock = Arc::new(MockLlmProvider::with_texts(happy_path_replies()));
        let orchestrator = ChannelOrchestrator::new(mock, fast_config());

        let (event_tx, event_rx) = mpsc::channel(100);
        orchestrator.run(&spec(), event_tx).await.expect("succeeds");

        let events = drain(event_rx).await;
        let stages: Vec<PipelineStage> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::StageStarted { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect();

        assert_eq!(
            stages,
            vec![
                PipelineStage::ProfileSynthesis,
                PipelineStage::ScriptPlanning,
                PipelineStage::PostRendering,
            ]
        );

        let rendered_indices: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::PostRendered { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(rendered_indices, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_invalid_spec_rejected_before_any_call() {
        let mock = Arc::new(MockLlmProvider::single_text("{}"));
        let orchestrator = ChannelOrchestrator::new(Arc::clone(&mock) as Arc<dyn LlmProvider>, fast_config());

        let bad_spec = ChannelSpec {
            title: String::new(),
            description: "D".into(),
            user_count: 3,
            vibe: "V".into(),
            agenda: "A".into(),
            post_count: 5,
        };

        let (event_tx, _event_rx) = mpsc::channel(10);
        let result = orchestrator.run(&bad_spec, event_tx).await;

        assert!(matches!(result, Err(AgentError::Configuration(_))));
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn test_pipeline_stage_display() {
        assert_eq!(
            format!("{}", PipelineStage::ProfileSynthesis),
            "Profile Synthesis"
        );
        assert_eq!(
            format!("{}", PipelineStage::ScriptPlanning),
            "Script Planning"
        );
        assert_eq!(format!("{}", PipelineStage::PostRendering), "Post Rendering");
    }

    #[test]
    fn test_event_constructors() {
        let event = PipelineEvent::post_rendered(3, "ana", RevisionOutcome::Accepted { rounds: 1 });
        match event {
            PipelineEvent::PostRendered {
                index,
                username,
                revision,
                ..
            } => {
                assert_eq!(index, 3);
                assert_eq!(username, "ana");
                assert_eq!(revision, RevisionOutcome::Accepted { rounds: 1 });
            }
            _ => panic!("expected PostRendered"),
        }

        let event = PipelineEvent::pipeline_failed("boom", PipelineStage::ScriptPlanning);
        match event {
            PipelineEvent::PipelineFailed { error, stage, .. } => {
                assert_eq!(error, "boom");
                assert_eq!(stage, PipelineStage::ScriptPlanning);
            }
            _ => panic!("expected PipelineFailed"),
        }
    }

    #[test]
    fn test_config_retry_policy_applies_to_all_agents() {
        let config = PipelineConfig::new().with_retry_policy(
            RetryPolicy::new().with_max_attempts(7),
        );
        assert_eq!(config.synthesizer_config.retry.max_attempts, 7);
        assert_eq!(config.planner_config.retry.max_attempts, 7);
        assert_eq!(config.actor_config.retry.max_attempts, 7);
        assert_eq!(config.judge_config.retry.max_attempts, 7);
    }
}
