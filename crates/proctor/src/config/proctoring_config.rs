use proctor_core::{MAX_LIVENESS_POLL, ProctorSettings, ViolationKind, ViolationPolicy};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Capture and detector tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProctoringConfig {
    /// Recorder timeslice in milliseconds.
    pub chunk_interval_ms: u64,

    /// Display liveness poll in milliseconds; values above 2000 are capped.
    pub liveness_poll_ms: u64,

    /// Delay before the multi-monitor check, in seconds.
    pub multi_monitor_grace_secs: u64,

    /// Give up on an unanswered capture prompt after this many seconds.
    pub permission_timeout_secs: Option<u64>,

    /// Violations that disqualify immediately.
    pub hard_violations: Vec<ViolationKind>,

    /// Report developer-tools shortcuts, not only suppress them.
    pub report_devtools: bool,

    /// Report copy events in addition to pastes.
    pub detect_copy: bool,
}

impl Default for ProctoringConfig {
    fn default() -> Self {
        let defaults = ProctorSettings::default();
        let mut hard_violations: Vec<ViolationKind> = defaults.policy.hard_kinds().collect();
        hard_violations.sort();
        Self {
            chunk_interval_ms: defaults.chunk_interval.as_millis() as u64,
            liveness_poll_ms: defaults.liveness_poll.as_millis() as u64,
            multi_monitor_grace_secs: defaults.multi_monitor_grace.as_secs(),
            permission_timeout_secs: None,
            hard_violations,
            report_devtools: defaults.report_devtools,
            detect_copy: defaults.detect_copy,
        }
    }
}

impl ProctoringConfig {
    /// Violation classification for this deployment.
    pub fn policy(&self) -> ViolationPolicy {
        ViolationPolicy::with_hard(self.hard_violations.iter().copied())
    }

    /// Liveness poll, capped.
    pub fn liveness_poll(&self) -> Duration {
        Duration::from_millis(self.liveness_poll_ms.max(1)).min(MAX_LIVENESS_POLL)
    }
}
