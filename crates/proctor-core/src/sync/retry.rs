use crate::{CoreResult, ProctorError};

use std::{future::Future, panic::Location, time::Duration};

use error_location::ErrorLocation;
use tracing::warn;

/// Exponential backoff schedule.
///
/// `max_retries` counts retries, so an operation runs at most
/// `max_retries + 1` times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Growth factor between consecutive waits.
    pub multiplier: f64,
    /// Upper bound on any single wait.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(scaled.max(0.0))
        }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Result of a retried operation plus how many attempts it took.
#[derive(Debug)]
pub struct Retried<T> {
    /// Final result.
    pub result: CoreResult<T>,
    /// Attempts made, including the successful one.
    pub attempts: u32,
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// The closure receives the zero-based attempt number. The last error is
/// wrapped in `UploadFailure` with the attempt count.
#[track_caller]
pub fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    what: &'static str,
    mut op: F,
) -> impl Future<Output = Retried<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    let location = Location::caller();
    async move {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    return Retried {
                        result: Ok(value),
                        attempts: attempt + 1,
                    };
                }
                Err(e) if attempt < policy.max_retries => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        operation = what,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    let attempts = attempt + 1;
                    return Retried {
                        result: Err(ProctorError::UploadFailure {
                            attempts,
                            reason: e.to_string(),
                            location: ErrorLocation::from(location),
                        }),
                        attempts,
                    };
                }
            }
        }
    }
}
