//! Bounded retry for upstream calls.
//!
//! Retries only failures classified as retryable (rate limited, 5xx, network,
//! timeout, pool exhaustion). Everything else is returned after the first
//! attempt.

use serde::{Deserialize, Serialize};
use shared_types::{Operation, OperationResult, TraceId};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy, fixed per operation at configuration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first, at least 1
    pub max_attempts: u32,
    /// Pause between attempts
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
    /// Growth factor applied to `delay` after each attempt (1.0 = fixed delay)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            backoff_multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff_multiplier: 1.0,
        }
    }

    /// Single attempt, no retry
    pub fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Delay after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.backoff_multiplier <= 1.0 || attempt <= 1 {
            return self.delay;
        }
        let exponent = (attempt - 1).min(16) as i32;
        self.delay.mul_f64(self.backoff_multiplier.powi(exponent))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".into());
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err("backoff_multiplier must be a finite number >= 1.0".into());
        }
        Ok(())
    }
}

/// Run `call` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. `call` receives the 1-based attempt number.
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: Operation,
    trace_id: &TraceId,
    mut call: F,
) -> OperationResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = OperationResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match call(attempt).await {
            Ok(value) => return Ok(value),
            Err(failure) if failure.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    operation = %operation,
                    trace_id = %trace_id,
                    attempt,
                    max_attempts,
                    reason = %failure.info.reason,
                    "Upstream call failed, retrying in {delay:?}: {failure}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(failure) => return Err(failure),
        }
    }
}
