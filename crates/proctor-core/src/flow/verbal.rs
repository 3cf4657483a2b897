use crate::{
    CoreResult, Phase, ProctorError,
    flow::{PhasePlan, PhaseSubmission, VerbalRecording},
    session::{PhaseReceipt, ProctorHandle},
    sync::ArtifactKind,
};

use std::panic::Location;

use error_location::ErrorLocation;
use tracing::{debug, info, instrument};

/// Where the candidate is within the verbal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbalStage {
    /// Instruction video playing.
    Instructions,
    /// Waiting for microphone access.
    MicrophoneCheck,
    /// Preparation video for question `n` (zero-based).
    Preparation(usize),
    /// Question video for question `n`.
    Question(usize),
    /// Recording the answer to question `n`.
    Answering(usize),
    /// Every question answered.
    Done,
}

/// Spoken answers recorded into one continuous microphone capture.
///
/// The recording is resumed for each answer and paused in between; it is
/// finalized once, when the phase completes.
pub struct VerbalStep {
    handle: ProctorHandle,
    questions: usize,
    stage: VerbalStage,
    recorded: usize,
}

impl VerbalStep {
    /// Step asking `plan.verbal_questions` questions.
    pub fn new(handle: ProctorHandle, plan: &PhasePlan) -> Self {
        Self {
            handle,
            questions: plan.verbal_questions.max(1),
            stage: VerbalStage::Instructions,
            recorded: 0,
        }
    }

    /// Current stage.
    pub fn stage(&self) -> VerbalStage {
        self.stage
    }

    /// Answers recorded so far.
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    #[track_caller]
    fn out_of_order(&self, action: &str) -> ProctorError {
        ProctorError::EntryGuard {
            phase: Phase::Verbal,
            reason: format!("cannot {action} during {:?}", self.stage),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// The instruction video ended.
    pub fn on_instructions_ended(&mut self) {
        match self.stage {
            VerbalStage::Instructions => self.stage = VerbalStage::MicrophoneCheck,
            stage => debug!(?stage, "Video end ignored"),
        }
    }

    /// The current preparation video ended.
    pub fn on_preparation_ended(&mut self) {
        match self.stage {
            VerbalStage::Preparation(n) => self.stage = VerbalStage::Question(n),
            stage => debug!(?stage, "Video end ignored"),
        }
    }

    /// Grant the microphone; the recording starts paused.
    ///
    /// # Errors
    ///
    /// `EntryGuard` outside the microphone check, or whatever
    /// [`ProctorHandle::enable_microphone`] returns. A refused prompt leaves
    /// the stage unchanged so the candidate can retry.
    pub async fn enable_microphone(&mut self) -> CoreResult<()> {
        if self.stage != VerbalStage::MicrophoneCheck {
            return Err(self.out_of_order("enable the microphone"));
        }
        self.handle.enable_microphone().await?;
        self.stage = VerbalStage::Preparation(0);
        Ok(())
    }

    /// The question video ended; recording resumes for the answer.
    ///
    /// # Errors
    ///
    /// `EntryGuard` when no question video is showing.
    pub async fn on_question_ended(&mut self) -> CoreResult<()> {
        let VerbalStage::Question(n) = self.stage else {
            return Err(self.out_of_order("start an answer"));
        };
        self.handle.begin_answer().await?;
        self.stage = VerbalStage::Answering(n);
        debug!(question = n + 1, "Answer recording");
        Ok(())
    }

    /// The candidate finished the current answer; recording pauses.
    ///
    /// # Errors
    ///
    /// `EntryGuard` when no answer is being recorded.
    pub async fn next_question(&mut self) -> CoreResult<()> {
        let VerbalStage::Answering(n) = self.stage else {
            return Err(self.out_of_order("end an answer"));
        };
        self.handle.end_answer().await?;
        self.recorded += 1;
        self.stage = if n + 1 < self.questions {
            VerbalStage::Preparation(n + 1)
        } else {
            VerbalStage::Done
        };
        Ok(())
    }

    /// Finalize and upload the combined recording, then advance to finish.
    ///
    /// # Errors
    ///
    /// `EntryGuard` before every question is answered, plus anything
    /// [`ProctorHandle::complete_phase`] returns.
    #[instrument(skip(self), fields(recorded = self.recorded))]
    pub async fn finish(&mut self) -> CoreResult<PhaseReceipt> {
        if self.stage != VerbalStage::Done {
            return Err(self.out_of_order("finish"));
        }
        let receipt = self
            .handle
            .complete_phase(PhaseSubmission::Verbal {
                questions: self.recorded,
            })
            .await?;
        info!(uploaded = receipt.artifact.is_some(), "Verbal phase complete");
        Ok(receipt)
    }
}

impl PhaseReceipt {
    /// The verbal recording carried by this receipt, if one was uploaded.
    pub fn verbal_recording(&self) -> Option<VerbalRecording> {
        self.artifact
            .as_ref()
            .filter(|a| a.kind == ArtifactKind::VerbalAudio)
            .map(VerbalRecording::from_artifact)
    }
}
