use proctor_core::RetryPolicy;

use std::time::Duration;

use serde::{Deserialize, Serialize};

const MB: u64 = 1024 * 1024;

/// Upload retry schedule and size limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,

    /// Backoff multiplier.
    pub multiplier: f64,

    /// Longest delay between attempts, in milliseconds.
    pub max_delay_ms: u64,

    /// Largest artifact accepted, in megabytes.
    pub max_artifact_mb: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            max_retries: retry.max_retries,
            initial_delay_ms: retry.initial_delay.as_millis() as u64,
            multiplier: retry.multiplier,
            max_delay_ms: retry.max_delay.as_millis() as u64,
            max_artifact_mb: proctor_core::DEFAULT_MAX_ARTIFACT_BYTES / MB,
        }
    }
}

impl UploadConfig {
    /// Retry policy for the sync bridge.
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            multiplier: self.multiplier.max(1.0),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    /// Size limit in bytes.
    pub fn max_artifact_bytes(&self) -> u64 {
        self.max_artifact_mb.saturating_mul(MB)
    }
}
