//! Bounded retry with transient-error classification.
//!
//! The policy is split per the design in this repo: [`decide`] is a pure
//! function from (attempt, error) to a decision, deterministically testable
//! without timers; [`with_retry`] is the effectful driver that sleeps and
//! logs between attempts.

use std::time::Duration;

use rand::Rng;

use super::invoker::AgentInvocation;

/// Retry limits and backoff shape.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

/// Substring classes that mark an error as likely to succeed on retry.
const TRANSIENT_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "etimedout",
    "econnreset",
    "econnrefused",
    "enetunreach",
    "network",
    "socket hang up",
    "connection reset",
    "connection refused",
    "connection closed",
    "rate limit",
    "rate-limit",
    "too many requests",
    "429",
    "502",
    "503",
    "504",
    "overloaded",
    "capacity",
    "temporarily unavailable",
];

/// Classify an error message. `None` and empty strings are permanent:
/// without a message there is nothing to justify a retry.
pub fn is_transient_error(error: Option<&str>) -> bool {
    let Some(message) = error else {
        return false;
    };
    if message.is_empty() {
        return false;
    }
    let lower = message.to_lowercase();
    TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Backoff before retry `attempt` (1-indexed):
/// `min(base * 2^(attempt-1), cap)` with ±10% jitter.
pub fn calculate_backoff(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let exponential = base_delay_ms.saturating_mul(2u64.saturating_pow(exponent));
    let capped = exponential.min(max_delay_ms);
    let jitter: f64 = rand::rng().random_range(0.9..=1.1);
    Duration::from_millis((capped as f64 * jitter) as u64)
}

/// What the driver should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDecision {
    Stop,
    RetryAfter(Duration),
}

/// Pure retry policy: given the attempt number just completed (1-indexed)
/// and its error, decide whether to retry and how long to wait.
///
/// Permanent errors stop after the first attempt; transient errors retry
/// until `max_retries` total attempts have been made.
pub fn decide(attempt: u32, error: Option<&str>, policy: &RetryPolicy) -> RetryDecision {
    if attempt >= policy.max_retries {
        return RetryDecision::Stop;
    }
    if !is_transient_error(error) {
        return RetryDecision::Stop;
    }
    RetryDecision::RetryAfter(calculate_backoff(
        attempt,
        policy.base_delay_ms,
        policy.max_delay_ms,
    ))
}

/// Drive an attempt function under the retry policy.
///
/// Attempts are strictly sequential: each is awaited fully before the next
/// begins. The final (possibly failed) invocation is returned; degrading an
/// exhausted failure into a verdict is the orchestrator's job.
pub async fn with_retry<F, Fut>(mut attempt_fn: F, policy: &RetryPolicy) -> AgentInvocation
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AgentInvocation>,
{
    let mut attempt = 1u32;
    loop {
        let invocation = attempt_fn(attempt).await;
        if invocation.success {
            return invocation;
        }

        match decide(attempt, invocation.error.as_deref(), policy) {
            RetryDecision::Stop => {
                tracing::warn!(
                    attempt,
                    error = invocation.error.as_deref().unwrap_or(""),
                    "agent call failed, not retrying"
                );
                return invocation;
            }
            RetryDecision::RetryAfter(delay) => {
                tracing::info!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "transient agent failure, backing off before retry"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
