use crate::{
    ViolationPolicy,
    capture::DEFAULT_CHUNK_INTERVAL,
    detect::{DEFAULT_MULTI_MONITOR_GRACE, MAX_LIVENESS_POLL},
    sync::{DEFAULT_MAX_ARTIFACT_BYTES, RetryPolicy},
};

use std::time::Duration;

/// Tuning for one proctoring session.
#[derive(Debug, Clone, PartialEq)]
pub struct ProctorSettings {
    /// Recorder timeslice; bounds data loss on abrupt termination.
    pub chunk_interval: Duration,
    /// Display liveness poll, capped at two seconds.
    pub liveness_poll: Duration,
    /// Delay before the multi-monitor check runs.
    pub multi_monitor_grace: Duration,
    /// How long a capture prompt may stay unanswered. `None` waits forever.
    pub permission_timeout: Option<Duration>,
    /// Report developer-tools shortcuts in addition to suppressing them.
    pub report_devtools: bool,
    /// Report copy events, not only pastes.
    pub detect_copy: bool,
    /// Hard/soft classification.
    pub policy: ViolationPolicy,
    /// Upload retry schedule.
    pub retry: RetryPolicy,
    /// Largest artifact accepted for upload.
    pub max_artifact_bytes: u64,
}

impl Default for ProctorSettings {
    fn default() -> Self {
        Self {
            chunk_interval: DEFAULT_CHUNK_INTERVAL,
            liveness_poll: MAX_LIVENESS_POLL,
            multi_monitor_grace: DEFAULT_MULTI_MONITOR_GRACE,
            permission_timeout: None,
            report_devtools: true,
            detect_copy: false,
            policy: ViolationPolicy::default(),
            retry: RetryPolicy::default(),
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
        }
    }
}
