use crate::{Phase, capture::Segment, sync::UploadedArtifact};

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Multiple-choice option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerOption {
    /// Option `a`.
    A,
    /// Option `b`.
    B,
    /// Option `c`.
    C,
    /// Option `d`.
    D,
}

impl AnswerOption {
    /// Every option in display order.
    pub const ALL: [AnswerOption; 4] = [AnswerOption::A, AnswerOption::B, AnswerOption::C, AnswerOption::D];

    /// Lowercase letter.
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerOption::A => "a",
            AnswerOption::B => "b",
            AnswerOption::C => "c",
            AnswerOption::D => "d",
        }
    }
}

impl fmt::Display for AnswerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Letter outside `a`–`d`.
#[derive(Debug, Error)]
#[error("Unknown answer option: {0}")]
pub struct ParseAnswerError(pub String);

impl FromStr for AnswerOption {
    type Err = ParseAnswerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|o| o.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseAnswerError(s.to_string()))
    }
}

/// One multiple-choice question's answer; `None` means unanswered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceAnswer {
    /// Question identifier.
    pub question_id: String,
    /// Selected option.
    pub answer: Option<AnswerOption>,
}

/// Writing phase response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingResponse {
    /// Task slot the backend files the text under.
    pub task_number: u8,
    /// Candidate text, possibly empty.
    pub text: String,
}

/// What a phase hands over when it completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseSubmission {
    /// Guidelines accepted.
    Guidelines,
    /// Written response.
    Writing(WritingResponse),
    /// Reasoning answers.
    Intelligence {
        /// One entry per question.
        answers: Vec<ChoiceAnswer>,
    },
    /// Personality answers.
    Personality {
        /// One entry per question.
        answers: Vec<ChoiceAnswer>,
    },
    /// Verbal answers; the audio lives in the session's microphone capture.
    Verbal {
        /// Questions that were recorded.
        questions: usize,
    },
}

impl PhaseSubmission {
    /// Phase this submission completes.
    pub fn phase(&self) -> Phase {
        match self {
            PhaseSubmission::Guidelines => Phase::Guidelines,
            PhaseSubmission::Writing(_) => Phase::Writing,
            PhaseSubmission::Intelligence { .. } => Phase::Intelligence,
            PhaseSubmission::Personality { .. } => Phase::Personality,
            PhaseSubmission::Verbal { .. } => Phase::Verbal,
        }
    }

    /// Whether the backend stores anything for this submission directly.
    pub fn has_responses(&self) -> bool {
        matches!(
            self,
            PhaseSubmission::Writing(_)
                | PhaseSubmission::Intelligence { .. }
                | PhaseSubmission::Personality { .. }
        )
    }
}

/// The combined verbal recording after upload.
#[derive(Debug, Clone, PartialEq)]
pub struct VerbalRecording {
    /// Storage URL.
    pub url: String,
    /// One window per answered question, in answer order.
    pub segments: Vec<Segment>,
}

impl VerbalRecording {
    pub(crate) fn from_artifact(artifact: &UploadedArtifact) -> Self {
        Self {
            url: artifact.url.clone(),
            segments: artifact.segments.clone(),
        }
    }
}
