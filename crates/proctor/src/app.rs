use crate::{
    AppResult,
    bridge::{Outbound, Outbox, UiEvent},
};

use proctor_core::{
    ChoiceStep, Countdown, GuidelinesStep, Phase, PhasePlan, PhaseReceipt, ProctorHandle,
    SessionStatus, VerbalStage, VerbalStep, WritingStep,
};

use std::time::Duration;

use tokio::{
    sync::mpsc,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Interval of the countdown pushed to the view.
const TIMER_TICK: Duration = Duration::from_secs(1);

/// What the candidate is doing inside the current phase.
pub enum Step {
    /// Overview video and consent.
    Guidelines(GuidelinesStep),
    /// Task video and text response.
    Writing(WritingStep),
    /// Choice phase entered, question list not received yet.
    AwaitingQuestions(Phase),
    /// Multiple-choice questions.
    Choice(ChoiceStep),
    /// Spoken answers.
    Verbal(VerbalStep),
    /// Finish or disqualified; nothing left to drive.
    Closed(Phase),
}

impl Step {
    /// Step for entering `phase`.
    pub fn for_phase(phase: Phase, handle: &ProctorHandle, plan: &PhasePlan) -> Self {
        match phase {
            Phase::Guidelines => Step::Guidelines(GuidelinesStep::new(handle.clone())),
            Phase::Writing => Step::Writing(WritingStep::new(handle.clone(), plan)),
            Phase::Intelligence | Phase::Personality => Step::AwaitingQuestions(phase),
            Phase::Verbal => Step::Verbal(VerbalStep::new(handle.clone(), plan)),
            Phase::Finish | Phase::Disqualified => Step::Closed(phase),
        }
    }

    /// Phase the step belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            Step::Guidelines(_) => Phase::Guidelines,
            Step::Writing(_) => Phase::Writing,
            Step::AwaitingQuestions(phase) | Step::Closed(phase) => *phase,
            Step::Choice(step) => step.phase(),
            Step::Verbal(_) => Phase::Verbal,
        }
    }

    /// Running phase timer, if any.
    pub fn countdown(&self) -> Option<&Countdown> {
        match self {
            Step::Writing(step) => step.countdown(),
            Step::Choice(step) => step.countdown(),
            _ => None,
        }
    }

    /// When the running phase timer runs out.
    pub fn deadline(&self) -> Option<Instant> {
        self.countdown().map(|c| c.deadline())
    }
}

/// Limit of a choice phase under `plan`.
pub fn choice_limit(phase: Phase, plan: &PhasePlan) -> Option<Duration> {
    match phase {
        Phase::Intelligence => Some(plan.intelligence_limit),
        Phase::Personality => plan.personality_limit,
        _ => None,
    }
}

/// View message for a verbal stage.
pub fn verbal_stage_message(stage: VerbalStage) -> Outbound {
    let (name, question) = match stage {
        VerbalStage::Instructions => ("instructions", None),
        VerbalStage::MicrophoneCheck => ("microphone_check", None),
        VerbalStage::Preparation(n) => ("preparation", Some(n + 1)),
        VerbalStage::Question(n) => ("question", Some(n + 1)),
        VerbalStage::Answering(n) => ("answering", Some(n + 1)),
        VerbalStage::Done => ("done", None),
    };
    Outbound::VerbalStage {
        stage: name.to_string(),
        question,
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Drives the phase steps from UI events, session status and phase timers.
pub struct App {
    run_id: Uuid,
    handle: ProctorHandle,
    outbox: Outbox,
    ui_rx: mpsc::Receiver<UiEvent>,
    plan: PhasePlan,
    step: Step,
    expired: Option<Instant>,
}

impl App {
    /// App for the session behind `handle`, starting at its current phase.
    pub fn new(
        handle: ProctorHandle,
        outbox: Outbox,
        ui_rx: mpsc::Receiver<UiEvent>,
        plan: PhasePlan,
    ) -> Self {
        let step = Step::for_phase(handle.current_phase(), &handle, &plan);
        Self {
            run_id: Uuid::new_v4(),
            handle,
            outbox,
            ui_rx,
            plan,
            step,
            expired: None,
        }
    }

    /// Phase of the current step.
    pub fn phase(&self) -> Phase {
        self.step.phase()
    }

    /// Run until the bridge closes or the session ends.
    #[instrument(skip(self), fields(run_id = %self.run_id))]
    pub async fn run(mut self) -> AppResult<()> {
        info!(phase = %self.phase(), "Proctor app starting");

        let mut status_rx = self.handle.subscribe();
        let initial = status_rx.borrow_and_update().clone();
        self.on_status(initial);

        let mut timer = time::interval(TIMER_TICK);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let deadline = self.step.deadline().filter(|d| Some(*d) != self.expired);

            tokio::select! {
                event = self.ui_rx.recv() => {
                    let Some(event) = event else {
                        info!("Bridge closed, shutting down");
                        break;
                    };
                    if let Err(e) = self.on_ui(event).await {
                        error!(error = ?e, phase = %self.phase(), "UI event failed");
                        self.outbox.send(Outbound::Error {
                            message: e.to_string(),
                            retry: e.is_recoverable(),
                        });
                    }
                }

                changed = status_rx.changed() => {
                    if changed.is_err() {
                        info!("Session ended");
                        break;
                    }
                    let status = status_rx.borrow_and_update().clone();
                    self.on_status(status);
                }

                _ = until(deadline) => {
                    self.expired = deadline;
                    if let Err(e) = self.on_deadline().await {
                        error!(error = ?e, phase = %self.phase(), "Timed submit failed");
                        self.outbox.send(Outbound::Error {
                            message: e.to_string(),
                            retry: e.is_recoverable(),
                        });
                    }
                }

                _ = timer.tick() => self.publish_timer(),
            }
        }

        if self.handle.is_proctoring() {
            match self.handle.stop_proctoring().await {
                Some(outcome) => info!(
                    success = outcome.success,
                    attempts = outcome.attempts,
                    "Recording uploaded on shutdown"
                ),
                None => debug!("Proctoring already stopped"),
            }
        }

        info!("Proctor app shut down");
        Ok(())
    }

    /// Publish `status` and switch steps when the phase moved.
    pub fn on_status(&mut self, status: SessionStatus) {
        let phase = status.current_phase;
        if phase != self.step.phase() {
            info!(from = %self.step.phase(), to = %phase, "Phase step changed");
            self.step = Step::for_phase(phase, &self.handle, &self.plan);
            self.expired = None;
            self.announce_step();
        }
        self.outbox.send(Outbound::Status(status));
    }

    fn announce_step(&self) {
        match &self.step {
            Step::Writing(step) => {
                let task = step.task();
                self.outbox.send(Outbound::WritingTask {
                    number: task.number,
                    video: task.video(),
                });
            }
            Step::Verbal(step) => self.outbox.send(verbal_stage_message(step.stage())),
            _ => {}
        }
    }

    fn publish_timer(&self) {
        if let Some(countdown) = self.step.countdown() {
            self.outbox.send(Outbound::Timer {
                remaining: countdown.display(),
            });
        }
    }

    fn receipt(&self, receipt: &PhaseReceipt) {
        match &receipt.sync_error {
            Some(sync_error) => {
                warn!(phase = %receipt.phase, %sync_error, "Phase advanced with sync errors")
            }
            None => info!(phase = %receipt.phase, "Phase advanced"),
        }
    }

    /// Apply one candidate interaction to the current step.
    #[instrument(skip(self), fields(phase = %self.phase()))]
    pub async fn on_ui(&mut self, event: UiEvent) -> AppResult<()> {
        let handle = self.handle.clone();
        match (event, &mut self.step) {
            (UiEvent::VideoEnded, Step::Guidelines(step)) => step.on_video_ended(),
            (UiEvent::VideoEnded, Step::Writing(step)) => step.on_video_ended(),
            (UiEvent::VideoEnded, Step::Verbal(step)) => {
                match step.stage() {
                    VerbalStage::Instructions => step.on_instructions_ended(),
                    VerbalStage::Preparation(_) => step.on_preparation_ended(),
                    VerbalStage::Question(_) => step.on_question_ended().await?,
                    stage => debug!(?stage, "Video end ignored"),
                }
                self.outbox.send(verbal_stage_message(step.stage()));
            }
            (UiEvent::Begin, Step::Guidelines(step)) => {
                let receipt = step.begin_assessment().await?;
                self.receipt(&receipt);
            }
            (UiEvent::Text { text }, Step::Writing(step)) => step.set_text(text),
            (UiEvent::Questions { ids }, Step::AwaitingQuestions(phase)) => {
                let phase = *phase;
                let limit = choice_limit(phase, &self.plan);
                info!(%phase, questions = ids.len(), "Questions received");
                self.step = Step::Choice(ChoiceStep::new(handle, phase, ids, limit)?);
            }
            (UiEvent::Answer { question_id, option }, Step::Choice(step)) => {
                step.select(&question_id, option);
            }
            (UiEvent::Submit, Step::Writing(step)) => {
                let receipt = step.submit().await?;
                self.receipt(&receipt);
            }
            (UiEvent::Submit, Step::Choice(step)) => {
                let receipt = step.submit().await?;
                self.receipt(&receipt);
            }
            (UiEvent::Submit, Step::Verbal(step)) => {
                let receipt = step.finish().await?;
                self.receipt(&receipt);
            }
            (UiEvent::EnableMicrophone, Step::Verbal(step)) => {
                step.enable_microphone().await?;
                self.outbox.send(verbal_stage_message(step.stage()));
            }
            (UiEvent::NextQuestion, Step::Verbal(step)) => {
                step.next_question().await?;
                self.outbox.send(verbal_stage_message(step.stage()));
            }
            (event, step) => {
                warn!(?event, step = %step.phase(), "UI event does not apply to this step");
            }
        }
        Ok(())
    }

    /// Submit whatever the timed step holds.
    pub async fn on_deadline(&mut self) -> AppResult<()> {
        info!(phase = %self.phase(), "Phase time expired");
        let receipt = match &mut self.step {
            Step::Writing(step) => step.submit().await?,
            Step::Choice(step) => step.submit_expired().await?,
            _ => return Ok(()),
        };
        self.receipt(&receipt);
        Ok(())
    }
}
