use crate::{
    CoreResult, Phase, ProctorError,
    flow::{Countdown, PhasePlan, PhaseSubmission, WritingResponse},
    session::{PhaseReceipt, ProctorHandle},
};

use std::{panic::Location, time::Duration};

use error_location::ErrorLocation;
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// One of the writing task videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritingTask {
    /// One-based task number.
    pub number: u8,
}

impl WritingTask {
    /// Uniformly chosen task out of `count`.
    pub fn random(count: u8) -> Self {
        let count = count.max(1);
        Self {
            number: rand::rng().random_range(1..=count),
        }
    }

    /// Video asset for the task.
    pub fn video(&self) -> String {
        format!("writing-task-{}.mp4", self.number)
    }
}

/// Task video, then a timed text response.
pub struct WritingStep {
    handle: ProctorHandle,
    task: WritingTask,
    limit: Duration,
    countdown: Option<Countdown>,
    text: String,
}

impl WritingStep {
    /// Step with a randomly chosen task.
    pub fn new(handle: ProctorHandle, plan: &PhasePlan) -> Self {
        Self::with_task(handle, WritingTask::random(plan.writing_tasks), plan.writing_limit)
    }

    /// Step with a fixed task.
    pub fn with_task(handle: ProctorHandle, task: WritingTask, limit: Duration) -> Self {
        Self {
            handle,
            task,
            limit,
            countdown: None,
            text: String::new(),
        }
    }

    /// Task shown to the candidate.
    pub fn task(&self) -> WritingTask {
        self.task
    }

    /// The task video ended; the timer starts now.
    pub fn on_video_ended(&mut self) {
        if self.countdown.is_none() {
            debug!(task = self.task.number, "Writing timer started");
            self.countdown = Some(Countdown::start(self.limit));
        }
    }

    /// Replace the response text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Current response text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Running timer, once the video has ended.
    pub fn countdown(&self) -> Option<&Countdown> {
        self.countdown.as_ref()
    }

    /// Timer deadline, once the video has ended.
    pub fn deadline(&self) -> Option<Instant> {
        self.countdown.map(|c| c.deadline())
    }

    /// Submit the text and advance.
    ///
    /// # Errors
    ///
    /// `EntryGuard` before the task video has ended, plus anything
    /// [`ProctorHandle::complete_phase`] returns.
    #[instrument(skip(self), fields(task = self.task.number, chars = self.text.chars().count()))]
    pub async fn submit(&mut self) -> CoreResult<PhaseReceipt> {
        if self.countdown.is_none() {
            return Err(ProctorError::EntryGuard {
                phase: Phase::Intelligence,
                reason: String::from("task video has not finished"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        if self.countdown.is_some_and(|c| c.is_expired()) {
            info!("Writing time expired, submitting current text");
        }
        let response = WritingResponse {
            task_number: 1,
            text: std::mem::take(&mut self.text),
        };
        self.handle
            .complete_phase(PhaseSubmission::Writing(response))
            .await
    }
}
