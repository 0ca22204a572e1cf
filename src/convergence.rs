//! Settledness detection for the asynchronously rendered output field
//!
//! The page converts input remotely and rewrites the output textarea some
//! time later. Before comparing strings, the suite waits until the output is
//! judged settled: non-empty, long enough relative to the input, and
//! containing at least one Sinhala code point. The wait itself runs inside
//! the browser (the automation layer's condition-wait primitive re-evaluates
//! the predicate on its own schedule); this module owns the predicate, the
//! policy knobs, and the timeout-to-fallback degradation.

use std::future::Future;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::E2eResult;

/// Deadline for the condition-wait before degrading to the fixed delay.
pub const DEFAULT_SETTLE_TIMEOUT_MS: u64 = 5_000;

/// Unconditional delay applied when the deadline elapses, giving the
/// renderer a last chance before the caller reads the field anyway.
pub const DEFAULT_FALLBACK_DELAY_MS: u64 = 2_000;

/// Divisor of the input length heuristic: expect at least one output
/// character per five input characters. Empirically tuned, not linguistic.
const MIN_CHARS_DIVISOR: usize = 5;

static SINHALA_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{0D80}-\u{0DFF}]").expect("sinhala block class compiles"));

/// True if any code point falls in the Sinhala block U+0D80..U+0DFF.
pub fn contains_sinhala(value: &str) -> bool {
    SINHALA_BLOCK.is_match(value)
}

/// Minimum settled-output length derived from the input: one fifth of the
/// input's char count, floored at 1.
pub fn min_chars_for(input: &str) -> usize {
    (input.chars().count() / MIN_CHARS_DIVISOR).max(1)
}

/// The settledness predicate. False for empty or whitespace-only values and
/// for values with no Sinhala-block character, regardless of length.
pub fn is_settled(value: &str, min_chars: usize) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed.chars().count() >= min_chars && contains_sinhala(trimmed)
}

/// Knobs for one settle wait. A policy is per-case and carries no state
/// between cases.
#[derive(Debug, Clone)]
pub struct ConvergencePolicy {
    /// Minimum trimmed char count the output must reach.
    pub min_chars: usize,

    /// Condition-wait deadline.
    pub timeout: Duration,

    /// Fixed delay applied after a deadline elapse.
    pub fallback_delay: Duration,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            min_chars: 1,
            timeout: Duration::from_millis(DEFAULT_SETTLE_TIMEOUT_MS),
            fallback_delay: Duration::from_millis(DEFAULT_FALLBACK_DELAY_MS),
        }
    }
}

impl ConvergencePolicy {
    /// Policy for a given input string, with the length heuristic applied.
    pub fn for_input(input: &str) -> Self {
        Self {
            min_chars: min_chars_for(input),
            ..Self::default()
        }
    }
}

/// Outcome of one settle wait. `TimedOut` is not an error: the caller
/// proceeds to read and assert regardless, and only the assertion can fail
/// the case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// The predicate held within the deadline.
    Converged { elapsed: Duration },

    /// The deadline elapsed; the fallback delay has already been applied.
    TimedOut { waited: Duration },
}

impl SettleOutcome {
    pub fn converged(&self) -> bool {
        matches!(self, SettleOutcome::Converged { .. })
    }
}

/// Wait until the output is settled or the deadline passes.
///
/// `condition_wait` is the automation layer's condition-wait primitive:
/// given the minimum char count and the deadline, it resolves `Ok(true)`
/// once the browser observes a settled value and `Ok(false)` if the deadline
/// elapses first. On `Ok(false)` the fallback delay is applied and the
/// outcome is `TimedOut`; only transport failures surface as `Err`.
pub async fn wait_for_settled<F, Fut>(
    policy: &ConvergencePolicy,
    condition_wait: F,
) -> E2eResult<SettleOutcome>
where
    F: FnOnce(usize, Duration) -> Fut,
    Fut: Future<Output = E2eResult<bool>>,
{
    let start = Instant::now();

    if condition_wait(policy.min_chars, policy.timeout).await? {
        let elapsed = start.elapsed();
        debug!("output settled after {} ms", elapsed.as_millis());
        return Ok(SettleOutcome::Converged { elapsed });
    }

    warn!(
        "output not settled within {} ms, applying {} ms fallback delay",
        policy.timeout.as_millis(),
        policy.fallback_delay.as_millis()
    );
    sleep(policy.fallback_delay).await;

    Ok(SettleOutcome::TimedOut {
        waited: start.elapsed(),
    })
}
