use crate::core::Sleeper;
use crate::domain::model::Stage;
use crate::utils::error::StageError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::future::Future;
use std::time::Duration;

/// Delays and attempt bound for the scoring service calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait after a 429 from the guide endpoint without `Retry-After`.
    pub guide_rate_limit_delay: Duration,
    /// Wait after a 429 from the check and serp endpoints without `Retry-After`.
    pub rate_limit_delay: Duration,
    pub timeout_delay: Duration,
    pub guide_not_ready_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            guide_rate_limit_delay: Duration::from_secs(35),
            rate_limit_delay: Duration::from_secs(20),
            timeout_delay: Duration::from_secs(35),
            guide_not_ready_delay: Duration::from_secs(35),
        }
    }
}

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    Retry { wait: Duration, reason: String },
    Fail(StageError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// `Retry-After` in whole seconds, when the server sent one.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Runs `op` until it succeeds, fails terminally or `max_attempts` is used up.
/// No wait follows the last attempt.
pub async fn run_with_retry<T, F, Fut>(
    stage: Stage,
    subject: &str,
    max_attempts: u32,
    sleeper: &dyn Sleeper,
    mut op: F,
) -> Result<T, StageError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut last_reason = String::from("no attempt made");

    for attempt in 1..=max_attempts {
        tracing::info!(%stage, subject, attempt, max_attempts, "attempt started");

        match op(attempt).await {
            Attempt::Done(value) => {
                if attempt > 1 {
                    tracing::info!(%stage, subject, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Attempt::Retry { wait, reason } => {
                if attempt < max_attempts {
                    tracing::warn!(
                        %stage,
                        subject,
                        attempt,
                        max_attempts,
                        wait_secs = wait.as_secs_f64(),
                        "{}, retrying",
                        reason
                    );
                    sleeper.sleep(wait).await;
                } else {
                    tracing::warn!(%stage, subject, attempt, max_attempts, "{}", reason);
                }
                last_reason = reason;
            }
            Attempt::Fail(error) => {
                tracing::error!(%stage, subject, attempt, "terminal failure: {}", error);
                return Err(error);
            }
        }
    }

    tracing::error!(%stage, subject, max_attempts, "giving up: {}", last_reason);
    Err(StageError::Exhausted {
        stage,
        attempts: max_attempts,
        last: last_reason,
    })
}
