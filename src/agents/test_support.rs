//! Shared mock LLM provider for agent and pipeline tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};

/// One scripted reply from the mock provider.
pub(crate) enum MockReply {
    /// Return this content as the completion.
    Text(String),
    /// Fail the call with `LlmError::RequestFailed`.
    TransportError(String),
}

impl MockReply {
    pub(crate) fn text(content: impl Into<String>) -> Self {
        MockReply::Text(content.into())
    }
}

/// Mock LLM provider that replays a predetermined response sequence.
///
/// When the sequence runs out, the last reply repeats, so open-ended loops
/// (e.g. a judge that never approves) can be scripted with one entry.
/// Incoming requests are recorded for prompt assertions.
pub(crate) struct MockLlmProvider {
    replies: Mutex<Vec<MockReply>>,
    requests: Mutex<Vec<GenerationRequest>>,
    call_count: AtomicUsize,
}

impl MockLlmProvider {
    pub(crate) fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_texts(texts: Vec<String>) -> Self {
        Self::new(texts.into_iter().map(MockReply::Text).collect())
    }

    pub(crate) fn single_text(text: impl Into<String>) -> Self {
        Self::with_texts(vec![text.into()])
    }

    /// Number of generate calls made so far.
    pub(crate) fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// The user-role content of the request at `index`.
    pub(crate) fn user_prompt(&self, index: usize) -> Option<String> {
        let requests = self.requests.lock().expect("lock not poisoned");
        requests.get(index).and_then(|r| {
            r.messages
                .iter()
                .find(|m| m.role == "user")
                .map(|m| m.content.clone())
        })
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("lock not poisoned")
            .push(request);
        let replies = self.replies.lock().expect("lock not poisoned");
        let reply = replies.get(idx).or_else(|| replies.last());

        let content = match reply {
            Some(MockReply::Text(content)) => content.clone(),
            Some(MockReply::TransportError(message)) => {
                return Err(LlmError::RequestFailed(message.clone()));
            }
            None => String::new(),
        };

        Ok(GenerationResponse {
            id: format!("mock-{}", idx),
            model: "mock-model".to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(content),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage {
                prompt_tokens: 100,
                completion_tokens: 200,
                total_tokens: 300,
            },
        })
    }
}

/// A well-formed three-persona USERS response.
pub(crate) fn mock_profiles_response() -> String {
    r#"{
        "USERS": [
            {"USERNAME": "synth_sarah", "BIO": "Repairs vintage keyboards in her garage", "PERSONALITY": "Patient, detail-obsessed"},
            {"USERNAME": "moog_mike", "BIO": "Collects modular gear since 1998", "PERSONALITY": "Opinionated, nostalgic"},
            {"USERNAME": "patch_priya", "BIO": "Sound designer for indie games", "PERSONALITY": "Curious, encouraging"}
        ]
    }"#
    .to_string()
}

/// A well-formed five-event SCRIPT response referencing the mock personas.
pub(crate) fn mock_script_response() -> String {
    r#"{
        "SCRIPT": [
            {"USER": "synth_sarah", "TIME": "05/11/24 09:00:00", "PURPOSE": "share news about the reissue", "FEATURES": {"TOXICITY": "none", "SENTIMENT": "positive", "EMOTION": "excitement"}},
            {"USER": "moog_mike", "TIME": "05/11/24 09:12:30", "PURPOSE": "question the build quality", "FEATURES": {"TOXICITY": "mild", "SENTIMENT": "negative", "EMOTION": "skepticism"}},
            {"USER": "patch_priya", "TIME": "05/11/24 09:30:00", "PURPOSE": "ask about preorder dates", "FEATURES": {"TOXICITY": "none", "SENTIMENT": "neutral", "EMOTION": "curiosity"}},
            {"USER": "synth_sarah", "TIME": "05/11/24 10:02:15", "PURPOSE": "reply with preorder details", "FEATURES": {"TOXICITY": "none", "SENTIMENT": "positive", "EMOTION": "helpfulness"}},
            {"USER": "moog_mike", "TIME": "05/11/24 11:45:00", "PURPOSE": "concede after reading the spec sheet", "FEATURES": {"TOXICITY": "none", "SENTIMENT": "positive", "EMOTION": "surprise"}}
        ]
    }"#
    .to_string()
}

/// A well-formed draft post response.
pub(crate) fn mock_draft_response(text: &str) -> String {
    format!(
        r#"{{"POST": "{}", "REASONING": "fits the persona and purpose"}}"#,
        text
    )
}

/// A judge verdict response.
pub(crate) fn mock_verdict_response(ai_generated: bool, feedback: &str) -> String {
    format!(
        r#"{{"RESULT": {}, "FEEDBACK": "{}"}}"#,
        ai_generated, feedback
    )
}
