//! Bounded retry with exponential backoff, shared by all pipeline stages.
//!
//! A stage hands the helper its full generate-parse-validate attempt as a
//! closure. Recoverable failures (malformed output, wrong cardinality, bad
//! references, transient transport errors) are retried up to the policy
//! bound; the bound spent, the stage gets a terminal
//! [`AgentError::Exhausted`] carrying the last failure.

use std::future::Future;
use std::time::Duration;

use super::error::{AgentError, AgentResult};

/// Retry policy for a pipeline stage.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1).
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per subsequent attempt.
    pub base_delay: Duration,
    /// Ceiling on the backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Creates a new policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the attempt bound (clamped to at least 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the base backoff delay.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Sets the backoff ceiling.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Backoff delay after the given 1-based failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Runs `operation` until it succeeds, fails unrecoverably, or the policy
/// bound is spent.
///
/// `stage` names the calling stage in logs and in the terminal error.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    stage: &str,
    mut operation: F,
) -> AgentResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AgentResult<T>>,
{
    let mut last_error: Option<AgentError> = None;

    for attempt in 1..=policy.max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_recoverable() => {
                tracing::warn!(
                    stage,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "Generation attempt failed"
                );
                last_error = Some(err);

                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay_after(attempt)).await;
                }
            }
            // Unrecoverable errors pass through untouched
            Err(err) => return Err(err),
        }
    }

    Err(AgentError::Exhausted {
        stage: stage.to_string(),
        attempts: policy.max_attempts,
        reason: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string()),
    })
}
