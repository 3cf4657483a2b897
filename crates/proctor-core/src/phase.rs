use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stage of the assessment flow.
///
/// The first six variants form a strict linear order. `Disqualified` can be
/// entered from any in-progress phase and, like `Finish`, is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Overview video and consent.
    Guidelines,
    /// Timed written response to a task video.
    Writing,
    /// Timed multiple-choice reasoning questions.
    Intelligence,
    /// Multiple-choice personality questions.
    Personality,
    /// Recorded spoken answers.
    Verbal,
    /// Assessment completed.
    Finish,
    /// Session ended by a hard violation.
    Disqualified,
}

impl Phase {
    /// Linear order of the non-disqualified phases.
    pub const ORDER: [Phase; 6] = [
        Phase::Guidelines,
        Phase::Writing,
        Phase::Intelligence,
        Phase::Personality,
        Phase::Verbal,
        Phase::Finish,
    ];

    fn rank(self) -> Option<usize> {
        Self::ORDER.iter().position(|p| *p == self)
    }

    /// The phase that follows this one, if any.
    pub fn next(self) -> Option<Phase> {
        self.rank().and_then(|r| Self::ORDER.get(r + 1).copied())
    }

    /// Whether `self` lies strictly later than `other` in the linear order.
    ///
    /// `Disqualified` is later than every other phase.
    pub fn is_after(self, other: Phase) -> bool {
        match (self.rank(), other.rank()) {
            (None, Some(_)) => true,
            (Some(a), Some(b)) => a > b,
            (_, None) => false,
        }
    }

    /// `Finish` and `Disqualified` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Finish | Phase::Disqualified)
    }

    /// Phases during which integrity detectors are armed.
    pub fn is_assessment(self) -> bool {
        matches!(
            self,
            Phase::Writing | Phase::Intelligence | Phase::Personality | Phase::Verbal
        )
    }

    /// Whether moving from `self` to `to` respects the assessment order.
    pub fn can_transition_to(self, to: Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Phase::Disqualified || self.next() == Some(to)
    }

    /// Wire name used by the backend submission record.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Guidelines => "guidelines",
            Phase::Writing => "writing",
            Phase::Intelligence => "intelligence",
            Phase::Personality => "personality",
            Phase::Verbal => "verbal",
            Phase::Finish => "finish",
            Phase::Disqualified => "disqualified",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown phase name.
#[derive(Debug, Error)]
#[error("Unknown phase: {0}")]
pub struct ParsePhaseError(pub String);

impl FromStr for Phase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ORDER
            .iter()
            .copied()
            .chain(std::iter::once(Phase::Disqualified))
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParsePhaseError(s.to_string()))
    }
}
