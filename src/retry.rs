//! Bounded retry helper for transient remote errors.
//!
//! Adapted from the pipeline send path: a small fixed-attempt retry with
//! jittered delay, gated by an `IsRetryable` classification on the error type.

use std::future::Future;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2, // 1 initial + 1 retry: chunk failures should surface quickly
            delay: Duration::from_millis(200),
        }
    }
}

impl RetryConfig {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let jitter = random_jitter(self.delay.as_millis() as u64 / 2);
        self.delay + Duration::from_millis(jitter)
    }
}

fn random_jitter(max_jitter: u64) -> u64 {
    if max_jitter == 0 {
        return 0;
    }
    use rand::Rng;
    rand::thread_rng().gen_range(0..=max_jitter)
}

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

/// Execute an async operation with retries. Only retries when the error
/// reports itself as retryable via `IsRetryable`.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable,
{
    let attempts = config.max_attempts.max(1);
    let mut last_error: Option<E> = None;

    for attempt in 0..attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                let delay = config.delay_for_attempt(attempt);
                tracing::debug!(
                    attempt = attempt + 1,
                    max = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after transient error"
                );
                last_error = Some(e);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.expect("retry loop should have returned an error"))
}
