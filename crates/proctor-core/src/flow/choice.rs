use crate::{
    CoreResult, Phase, ProctorError,
    flow::{AnswerOption, ChoiceAnswer, Countdown, PhaseSubmission},
    session::{PhaseReceipt, ProctorHandle},
};

use std::{collections::HashMap, panic::Location, time::Duration};

use error_location::ErrorLocation;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChoiceKind {
    Intelligence,
    Personality,
}

/// Multiple-choice phase (intelligence or personality).
pub struct ChoiceStep {
    handle: ProctorHandle,
    kind: ChoiceKind,
    questions: Vec<String>,
    answers: HashMap<String, AnswerOption>,
    countdown: Option<Countdown>,
}

impl ChoiceStep {
    /// Step over `questions`; the timer, if any, starts now.
    ///
    /// # Errors
    ///
    /// `EntryGuard` when `phase` is not a multiple-choice phase.
    #[track_caller]
    pub fn new(
        handle: ProctorHandle,
        phase: Phase,
        questions: Vec<String>,
        limit: Option<Duration>,
    ) -> CoreResult<Self> {
        let kind = match phase {
            Phase::Intelligence => ChoiceKind::Intelligence,
            Phase::Personality => ChoiceKind::Personality,
            other => {
                return Err(ProctorError::EntryGuard {
                    phase: other,
                    reason: String::from("not a multiple-choice phase"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };
        Ok(Self {
            handle,
            kind,
            questions,
            answers: HashMap::new(),
            countdown: limit.map(Countdown::start),
        })
    }

    /// Phase this step completes.
    pub fn phase(&self) -> Phase {
        match self.kind {
            ChoiceKind::Intelligence => Phase::Intelligence,
            ChoiceKind::Personality => Phase::Personality,
        }
    }

    /// Record or change an answer. `false` for an unknown question.
    pub fn select(&mut self, question_id: &str, option: AnswerOption) -> bool {
        if !self.questions.iter().any(|q| q == question_id) {
            warn!(question_id, "Answer for unknown question ignored");
            return false;
        }
        debug!(question_id, %option, "Answer selected");
        self.answers.insert(question_id.to_string(), option);
        true
    }

    /// Questions answered so far.
    pub fn answered(&self) -> usize {
        self.answers.len()
    }

    /// Questions still open.
    pub fn unanswered(&self) -> usize {
        self.questions.len() - self.answers.len()
    }

    /// Running timer, if the phase is timed.
    pub fn countdown(&self) -> Option<&Countdown> {
        self.countdown.as_ref()
    }

    /// Timer deadline, if the phase is timed.
    pub fn deadline(&self) -> Option<Instant> {
        self.countdown.map(|c| c.deadline())
    }

    fn collect(&self) -> Vec<ChoiceAnswer> {
        self.questions
            .iter()
            .map(|q| ChoiceAnswer {
                question_id: q.clone(),
                answer: self.answers.get(q).copied(),
            })
            .collect()
    }

    fn submission(&self) -> PhaseSubmission {
        let answers = self.collect();
        match self.kind {
            ChoiceKind::Intelligence => PhaseSubmission::Intelligence { answers },
            ChoiceKind::Personality => PhaseSubmission::Personality { answers },
        }
    }

    /// Manual submit; every question must be answered.
    ///
    /// # Errors
    ///
    /// `EntryGuard` while questions are open, plus anything
    /// [`ProctorHandle::complete_phase`] returns.
    #[instrument(skip(self), fields(phase = %self.phase()))]
    pub async fn submit(&mut self) -> CoreResult<PhaseReceipt> {
        let open = self.unanswered();
        if open > 0 {
            return Err(ProctorError::EntryGuard {
                phase: self.phase().next().unwrap_or(self.phase()),
                reason: format!("{open} question(s) unanswered"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        self.handle.complete_phase(self.submission()).await
    }

    /// Timed submit; open questions go in as unanswered.
    ///
    /// # Errors
    ///
    /// Anything [`ProctorHandle::complete_phase`] returns.
    #[instrument(skip(self), fields(phase = %self.phase()))]
    pub async fn submit_expired(&mut self) -> CoreResult<PhaseReceipt> {
        info!(unanswered = self.unanswered(), "Time expired, submitting answers");
        self.handle.complete_phase(self.submission()).await
    }
}
