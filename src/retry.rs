//! Generic retry combinator (§4.D): exponential or linear backoff with
//! jitter, driven by a pluggable retryable-error classifier.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::domain::traits::RetryClassifier;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
            multiplier: 2.0,
            jitter_ratio: 0.1,
        }
    }
}

impl RetryPolicy {
    /// `min(maxDelayMs, baseDelayMs * multiplier^attempt + uniform(-j,+j)*base)`.
    /// `attempt` is zero-based (the delay before the first retry uses `attempt = 0`).
    fn delay_for(&self, attempt: u32, jitter_sample: f64) -> Duration {
        let exp = self.multiplier.powi(attempt as i32);
        let raw = self.base_delay_ms as f64 * exp;
        let jitter = jitter_sample * self.jitter_ratio * self.base_delay_ms as f64;
        let with_jitter = (raw + jitter).max(0.0);
        Duration::from_millis(with_jitter.min(self.max_delay_ms as f64) as u64)
    }
}

/// Runs `operation` up to `policy.max_retries + 1` times, stopping as soon as
/// it succeeds or `classifier` says the error isn't worth retrying.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    classifier: &dyn RetryClassifier,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let message = error.to_string();
                if attempt >= policy.max_retries || !classifier.is_retryable(&message) {
                    warn!(attempt, error = %message, "retry exhausted or non-retryable");
                    return Err(error);
                }
                let delay = policy.delay_for(attempt, rand::thread_rng().gen_range(-1.0..=1.0));
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %message, "retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Races `operation` against `deadline`; on timeout yields `None` without
/// consuming a retry attempt from the caller's own policy bookkeeping.
pub async fn with_timeout<T, Fut>(deadline: Duration, operation: Fut) -> Option<T>
where
    Fut: Future<Output = T>,
{
    tokio::time::timeout(deadline, operation).await.ok()
}
