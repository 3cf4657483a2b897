use crate::violation::ViolationKind;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Consequence class of a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Ends the session and disqualifies the submission.
    Hard,
    /// Recorded for human review; the session continues.
    Soft,
}

/// Maps violation kinds to severities.
///
/// Defaults to the strict anti-cheat policy: tab switches and lost screen
/// shares are hard, everything else is soft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationPolicy {
    hard: BTreeSet<ViolationKind>,
}

impl Default for ViolationPolicy {
    fn default() -> Self {
        Self::with_hard([ViolationKind::TabSwitch, ViolationKind::ScreenShareStopped])
    }
}

impl ViolationPolicy {
    /// Policy where exactly `kinds` are hard violations.
    pub fn with_hard(kinds: impl IntoIterator<Item = ViolationKind>) -> Self {
        Self {
            hard: kinds.into_iter().collect(),
        }
    }

    /// Severity assigned to `kind`.
    pub fn severity(&self, kind: ViolationKind) -> Severity {
        if self.hard.contains(&kind) {
            Severity::Hard
        } else {
            Severity::Soft
        }
    }

    /// Kinds treated as hard.
    pub fn hard_kinds(&self) -> impl Iterator<Item = ViolationKind> + '_ {
        self.hard.iter().copied()
    }
}
