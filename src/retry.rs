//! Bounded retry for flaky UI operations
//!
//! A minimal flakiness mitigator, not a resilience engine: fixed attempt
//! count, fixed inter-attempt delay, no backoff growth, no jitter. The last
//! failure propagates once the attempts are exhausted.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Default attempt count for retried operations.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Default delay between attempts.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total invocations allowed, including the first.
    pub max_attempts: usize,

    /// Fixed delay between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// Invoke `op` until it succeeds or `max_attempts` invocations have failed,
/// sleeping the fixed delay between attempts. The final attempt's error is
/// returned as-is.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(
                    "attempt {}/{} failed: {}; retrying in {} ms",
                    attempt,
                    attempts,
                    err,
                    policy.delay.as_millis()
                );
                sleep(policy.delay).await;
            }
        }
    }

    // Last attempt propagates its own error.
    op().await
}
