mod handle;
mod ledger;

pub use {
    handle::{PhaseReceipt, ProctorHandle, SessionStatus},
    ledger::{Reaction, SessionCore, SessionState},
};

use crate::{
    CoreResult, Phase, ProctorError, ProctorSettings, ViolationEvent, ViolationKind,
    capture::{CaptureController, CaptureHandle, CapturedMedia, MediaDevices, Modality},
    detect::{ArmContext, Beacon, DetectorSet, HostEnvironment, SignalBus, SignalGate, ViolationSink, precheck_geometry},
    flow::PhaseSubmission,
    sync::{
        ArtifactKind, ObjectStorage, PhaseRecorder, PhaseWriter, SubmissionBackend, SyncBridge,
        UploadOutcome, UploadedArtifact,
    },
};

use handle::SessionCommand;

use std::{future::Future, panic::Location, sync::Arc, time::Duration};

use error_location::ErrorLocation;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::AbortHandle,
};
use tracing::{debug, error, info, instrument, warn};

/// Identifiers resolved from the test link before the session starts.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Backend submission identifier.
    pub submission_id: String,
    /// Test-link token.
    pub token: String,
    /// Phase recorded by the backend, for resuming after a reload.
    pub resume_phase: Phase,
}

/// Moves the candidate's view.
pub trait Navigator: Send + Sync {
    /// Show the view for `phase`.
    fn navigate(&self, phase: Phase);
}

/// Platform and infrastructure the session runs against.
#[derive(Clone)]
pub struct Collaborators {
    /// Capture prompts.
    pub devices: Arc<dyn MediaDevices>,
    /// Geometry and connectivity.
    pub environment: Arc<dyn HostEnvironment>,
    /// Submission record.
    pub backend: Arc<dyn SubmissionBackend>,
    /// Media storage.
    pub storage: Arc<dyn ObjectStorage>,
    /// Teardown-safe delivery.
    pub beacon: Arc<dyn Beacon>,
    /// View changes.
    pub navigator: Arc<dyn Navigator>,
}

const COMMAND_CAPACITY: usize = 32;

/// A capture prompt answered in the background.
enum PromptAnswer {
    Display(CoreResult<CaptureHandle>),
    Microphone(CoreResult<CaptureHandle>),
}

/// A prompt in flight and the caller waiting on it.
struct Pending<T> {
    reply: oneshot::Sender<T>,
    prompt: AbortHandle,
}

impl<T> Pending<T> {
    fn cancel(self, answer: T) {
        self.prompt.abort();
        let _ = self.reply.send(answer);
    }
}

/// Proctoring state machine for one assessment attempt.
///
/// Runs as a single task: commands from the [`ProctorHandle`], answered
/// capture prompts and violations from the detectors are handled one at a
/// time, violations first. Nothing awaited inside the loop waits on the
/// candidate; prompts run in the background and report back. Capture
/// handles are owned here and nowhere else.
pub struct ProctoringSession {
    submission_id: String,
    core: SessionCore,
    settings: ProctorSettings,
    controller: CaptureController,
    environment: Arc<dyn HostEnvironment>,
    navigator: Arc<dyn Navigator>,
    sync: SyncBridge,
    phases: PhaseRecorder,
    writer: Option<PhaseWriter>,
    detectors: DetectorSet,
    bus: SignalBus,
    sink: ViolationSink,
    violations: mpsc::UnboundedReceiver<ViolationEvent>,
    commands: mpsc::Receiver<SessionCommand>,
    answers_tx: mpsc::UnboundedSender<PromptAnswer>,
    answers: mpsc::UnboundedReceiver<PromptAnswer>,
    pending_start: Option<Pending<bool>>,
    pending_microphone: Option<Pending<CoreResult<()>>>,
    status: watch::Sender<SessionStatus>,
    display: Option<CaptureHandle>,
    microphone: Option<CaptureHandle>,
    last_error: Option<String>,
}

impl ProctoringSession {
    /// Session positioned at the backend's recorded phase.
    ///
    /// Returns the session (to be run), the handle for the phase flow, and
    /// the signal gate for the host's document listeners. A resumed session
    /// starts idle; proctoring is not re-established automatically.
    pub fn new(
        context: SessionContext,
        collaborators: Collaborators,
        settings: ProctorSettings,
    ) -> (Self, ProctorHandle, SignalGate) {
        let core = SessionCore::new(context.resume_phase, settings.policy.clone());
        let bus = SignalBus::new();
        let (sink, violations) = ViolationSink::channel();
        let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (answers_tx, answers) = mpsc::unbounded_channel();

        let detectors = DetectorSet::new(
            &settings,
            bus.clone(),
            &context.submission_id,
            Arc::clone(&collaborators.beacon),
        );
        let gate = detectors.gate();

        let sync = SyncBridge::new(
            &context.submission_id,
            collaborators.backend,
            collaborators.storage,
            settings.retry,
            settings.max_artifact_bytes,
        );
        let (phases, writer) = PhaseRecorder::channel(sync.clone(), context.resume_phase);

        let initial = SessionStatus {
            current_phase: core.phase(),
            state: core.state(),
            is_proctoring: false,
            last_error: None,
            microphone_ready: false,
        };
        let (status, status_rx) = watch::channel(initial);

        if context.resume_phase != Phase::Guidelines {
            info!(
                submission_id = %context.submission_id,
                phase = %context.resume_phase,
                "Resuming session without proctoring"
            );
        }

        let session = Self {
            submission_id: context.submission_id,
            core,
            controller: CaptureController::new(collaborators.devices, settings.chunk_interval),
            settings,
            environment: collaborators.environment,
            navigator: collaborators.navigator,
            sync,
            phases,
            writer: Some(writer),
            detectors,
            bus,
            sink,
            violations,
            commands,
            answers_tx,
            answers,
            pending_start: None,
            pending_microphone: None,
            status,
            display: None,
            microphone: None,
            last_error: None,
        };

        (session, ProctorHandle::new(command_tx, status_rx), gate)
    }

    /// Serve commands and violations until every handle is dropped.
    #[instrument(skip(self), fields(submission_id = %self.submission_id))]
    pub async fn run(mut self) {
        info!(phase = %self.core.phase(), "Proctoring session running");
        if let Some(writer) = self.writer.take() {
            tokio::spawn(writer.run());
        }

        loop {
            tokio::select! {
                biased;

                Some(event) = self.violations.recv() => {
                    self.on_violation(event);
                }

                Some(answer) = self.answers.recv() => {
                    self.on_prompt_answer(answer);
                }

                cmd = self.commands.recv() => {
                    match cmd {
                        Some(cmd) => self.dispatch(cmd),
                        None => {
                            info!("All handles dropped, session ending");
                            break;
                        }
                    }
                }
            }
        }

        // Leftover streams are released on drop; nothing left to upload to.
        self.cancel_prompts();
        self.detectors.disarm_all();
        info!(phase = %self.core.phase(), state = %self.core.state(), "Proctoring session ended");
    }

    fn dispatch(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Start { reply } => {
                self.start_proctoring(reply);
            }
            SessionCommand::Stop { reply } => {
                self.stop_proctoring(reply);
            }
            SessionCommand::CompletePhase { submission, reply } => {
                self.complete_phase(submission, reply);
            }
            SessionCommand::EnableMicrophone { reply } => {
                self.enable_microphone(reply);
            }
            SessionCommand::BeginAnswer { reply } => {
                let result = self.with_microphone(|controller, mic| controller.resume(mic));
                let _ = reply.send(result);
            }
            SessionCommand::EndAnswer { reply } => {
                let result = self.with_microphone(|controller, mic| controller.pause(mic));
                let _ = reply.send(result);
            }
        }
    }

    fn on_prompt_answer(&mut self, answer: PromptAnswer) {
        match answer {
            PromptAnswer::Display(acquired) => match self.pending_start.take() {
                Some(pending) => {
                    let started = self.finish_start(acquired);
                    let _ = pending.reply.send(started);
                }
                None => debug!("Display prompt answered after cancellation"),
            },
            PromptAnswer::Microphone(acquired) => match self.pending_microphone.take() {
                Some(pending) => {
                    let result = self.finish_microphone(acquired);
                    let _ = pending.reply.send(result);
                }
                None => debug!("Microphone prompt answered after cancellation"),
            },
        }
    }

    /// Abandon open prompts; a stream granted later is released on arrival.
    fn cancel_prompts(&mut self) {
        if let Some(pending) = self.pending_start.take() {
            debug!("Display prompt abandoned");
            pending.cancel(false);
        }
        if let Some(pending) = self.pending_microphone.take() {
            debug!("Microphone prompt abandoned");
            let reason = if self.core.is_terminal() {
                ProctorError::SessionTerminated {
                    phase: self.core.phase(),
                    location: ErrorLocation::from(Location::caller()),
                }
            } else {
                Self::entry_guard(self.core.phase(), "proctoring stopped")
            };
            pending.cancel(Err(reason));
        }
    }

    fn publish(&self) {
        let snapshot = SessionStatus {
            current_phase: self.core.phase(),
            state: self.core.state(),
            is_proctoring: self.core.is_proctoring(),
            last_error: self.last_error.clone(),
            microphone_ready: self.microphone.is_some(),
        };
        self.status.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    fn arm_context(&self) -> ArmContext {
        ArmContext {
            bus: self.bus.clone(),
            sink: self.sink.clone(),
            environment: Arc::clone(&self.environment),
            display: self.display.as_ref().and_then(CaptureHandle::probe),
        }
    }

    fn fail_start(&mut self, e: &ProctorError) -> bool {
        warn!(error = %e, "Proctoring not started");
        self.core.start_failed();
        self.last_error = Some(e.to_string());
        self.publish();
        false
    }

    #[instrument(skip(self, reply), fields(phase = %self.core.phase()))]
    fn start_proctoring(&mut self, reply: oneshot::Sender<bool>) {
        match self.core.begin_start() {
            Ok(true) => {}
            Ok(false) => {
                debug!(state = %self.core.state(), "Start ignored");
                let _ = reply.send(self.core.is_proctoring());
                return;
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                self.publish();
                let _ = reply.send(false);
                return;
            }
        }
        self.publish();

        let controller = self.controller.clone();
        let answers = self.answers_tx.clone();
        let limit = self.settings.permission_timeout;
        let prompt = tokio::spawn(async move {
            let acquired = answer_within(Modality::Display, limit, controller.acquire_display_capture()).await;
            // A closed session drops the handle, which releases the stream.
            let _ = answers.send(PromptAnswer::Display(acquired));
        });
        self.pending_start = Some(Pending {
            reply,
            prompt: prompt.abort_handle(),
        });
    }

    fn finish_start(&mut self, acquired: CoreResult<CaptureHandle>) -> bool {
        let mut handle = match acquired {
            Ok(handle) => handle,
            Err(e) => return self.fail_start(&e),
        };

        if let Err(e) = precheck_geometry(&self.environment.screen_geometry()) {
            handle.release();
            return self.fail_start(&e);
        }

        self.controller.start(&mut handle);
        self.display = Some(handle);

        let ctx = self.arm_context();
        self.detectors.apply_phase(self.core.phase(), &ctx);
        self.core.start_succeeded();
        self.last_error = None;
        self.publish();
        info!("Proctoring active");
        true
    }

    /// Cancel prompts, disarm detectors, drop the microphone and halt the
    /// display recorder. The halted display is returned for finalizing.
    fn release_captures(&mut self) -> Option<CaptureHandle> {
        self.cancel_prompts();
        self.detectors.disarm_all();
        if let Some(mut mic) = self.microphone.take() {
            mic.release();
        }
        let mut display = self.display.take()?;
        display.halt();
        Some(display)
    }

    /// First stop: tear down and return the display. Later stops: `None`.
    fn teardown(&mut self) -> Option<Option<CaptureHandle>> {
        if !self.core.begin_stop() {
            debug!(state = %self.core.state(), "Stop ignored");
            return None;
        }
        self.publish();
        let display = self.release_captures();
        self.core.finish_stop();
        self.publish();
        info!("Proctoring stopped");
        Some(display)
    }

    fn stop_proctoring(&mut self, reply: oneshot::Sender<Option<UploadOutcome>>) {
        let Some(display) = self.teardown() else {
            let _ = reply.send(None);
            return;
        };

        let controller = self.controller.clone();
        let sync = self.sync.clone();
        tokio::spawn(async move {
            let media = match display {
                Some(display) => finalize(&controller, display).await,
                None => None,
            };
            let Some(media) = media else {
                let _ = reply.send(Some(UploadOutcome {
                    success: false,
                    url: None,
                    error: Some(String::from("no display recording captured")),
                    attempts: 0,
                }));
                return;
            };
            let outcome = sync.upload_outcome(&media, ArtifactKind::ScreenRecording).await;
            if let Some(url) = outcome.url.as_deref() {
                let artifact = UploadedArtifact {
                    kind: ArtifactKind::ScreenRecording,
                    url: url.to_string(),
                    bytes: media.len(),
                    segments: media.segments.clone(),
                    attempts: outcome.attempts,
                };
                let _ = sync.record_artifact(&artifact).await;
            }
            let _ = reply.send(Some(outcome));
        });
    }

    #[instrument(skip(self, event), fields(kind = %event.kind()))]
    fn on_violation(&mut self, event: ViolationEvent) {
        let reaction = self.core.classify(event.kind());
        if reaction != Reaction::Ignore && event.kind() == ViolationKind::ScreenShareStopped {
            let lost = ProctorError::CaptureLost {
                reason: String::from("the display share was stopped"),
                location: ErrorLocation::from(Location::caller()),
            };
            self.last_error = Some(lost.to_string());
        }

        match reaction {
            Reaction::Ignore => {
                debug!(state = %self.core.state(), "Violation ignored");
            }
            Reaction::Report => {
                warn!(metadata = ?event.metadata(), "Soft violation");
                self.sync.report_violation(event);
                self.publish();
            }
            Reaction::Disqualify => {
                error!(metadata = ?event.metadata(), "Hard violation, disqualifying");
                let evidence = self.release_captures();
                self.sync.report_violation(event);
                self.phases.record_detached(Phase::Disqualified);
                if let Some(display) = evidence {
                    let controller = self.controller.clone();
                    let sync = self.sync.clone();
                    tokio::spawn(async move {
                        let Some(media) = finalize(&controller, display).await else {
                            return;
                        };
                        if let Ok(artifact) = sync.upload(&media, ArtifactKind::ScreenRecording).await {
                            let _ = sync.record_artifact(&artifact).await;
                        }
                    });
                }
                self.publish();
                self.navigator.navigate(Phase::Disqualified);
            }
        }
    }

    #[track_caller]
    fn entry_guard(phase: Phase, reason: &str) -> ProctorError {
        ProctorError::EntryGuard {
            phase,
            reason: reason.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    fn validate(&self, submission: &PhaseSubmission) -> CoreResult<Phase> {
        let current = self.core.phase();
        if self.core.is_terminal() {
            return Err(ProctorError::SessionTerminated {
                phase: current,
                location: ErrorLocation::from(Location::caller()),
            });
        }
        let submitted = submission.phase();
        let next = current.next().filter(|_| submitted == current).ok_or_else(|| {
            ProctorError::InvalidTransition {
                from: current,
                to: submitted.next().unwrap_or(submitted),
                location: ErrorLocation::from(Location::caller()),
            }
        })?;
        if next.is_assessment() && !self.core.is_proctoring() {
            return Err(Self::entry_guard(next, "proctoring is not active"));
        }
        if matches!(submission, PhaseSubmission::Verbal { .. }) && self.microphone.is_none() {
            return Err(Self::entry_guard(next, "no microphone recording"));
        }
        Ok(next)
    }

    #[instrument(skip(self, submission, reply), fields(phase = %submission.phase()))]
    fn complete_phase(
        &mut self,
        submission: PhaseSubmission,
        reply: oneshot::Sender<CoreResult<PhaseReceipt>>,
    ) {
        let next = match self.validate(&submission).and_then(|next| {
            self.core.advance(next)?;
            Ok(next)
        }) {
            Ok(next) => next,
            Err(e) => {
                warn!(error = %e, "Phase submission rejected");
                let _ = reply.send(Err(e));
                return;
            }
        };
        info!(%next, "Phase advanced");

        let verbal_audio = match &submission {
            PhaseSubmission::Verbal { .. } => self.microphone.take().map(|mut mic| {
                mic.halt();
                mic
            }),
            _ => None,
        };

        let ctx = self.arm_context();
        self.detectors.apply_phase(next, &ctx);

        let screen = if next == Phase::Finish {
            self.teardown().flatten()
        } else {
            None
        };
        self.publish();
        self.navigator.navigate(next);

        let controller = self.controller.clone();
        let sync = self.sync.clone();
        let phases = self.phases.clone();
        tokio::spawn(async move {
            let mut sync_errors: Vec<String> = Vec::new();
            let mut artifact = None;
            if submission.has_responses() {
                if let Err(e) = sync.submit_responses(&submission).await {
                    sync_errors.push(e.to_string());
                }
            }
            if let Some(mut mic) = verbal_audio {
                match controller.stop(&mut mic).await {
                    Ok(media) => {
                        info!(segments = media.segments.len(), bytes = media.len(), "Verbal recording finalized");
                        match upload_and_link(&sync, &media, ArtifactKind::VerbalAudio).await {
                            Ok(uploaded) => artifact = Some(uploaded),
                            Err(e) => sync_errors.push(e.to_string()),
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Verbal recording lost");
                        sync_errors.push(e.to_string());
                    }
                }
            }
            // Queued behind any earlier update; skipped if a disqualification got there first.
            if let Err(e) = phases.record(next).await {
                sync_errors.push(e.to_string());
            }
            if let Some(display) = screen {
                if let Some(media) = finalize(&controller, display).await {
                    if let Err(e) = upload_and_link(&sync, &media, ArtifactKind::ScreenRecording).await {
                        sync_errors.push(e.to_string());
                    }
                }
            }
            let _ = reply.send(Ok(PhaseReceipt {
                phase: next,
                artifact,
                sync_error: sync_errors.into_iter().next(),
            }));
        });
    }

    #[instrument(skip(self, reply))]
    fn enable_microphone(&mut self, reply: oneshot::Sender<CoreResult<()>>) {
        let phase = self.core.phase();
        if self.core.is_terminal() {
            let _ = reply.send(Err(ProctorError::SessionTerminated {
                phase,
                location: ErrorLocation::from(Location::caller()),
            }));
            return;
        }
        if phase != Phase::Verbal {
            let _ = reply.send(Err(Self::entry_guard(phase, "microphone is only used in the verbal phase")));
            return;
        }
        if self.microphone.is_some() {
            let _ = reply.send(Ok(()));
            return;
        }
        if self.pending_microphone.is_some() {
            let _ = reply.send(Err(Self::entry_guard(phase, "microphone prompt already open")));
            return;
        }

        let controller = self.controller.clone();
        let answers = self.answers_tx.clone();
        let limit = self.settings.permission_timeout;
        let prompt = tokio::spawn(async move {
            let acquired = answer_within(Modality::Microphone, limit, controller.acquire_microphone()).await;
            let _ = answers.send(PromptAnswer::Microphone(acquired));
        });
        self.pending_microphone = Some(Pending {
            reply,
            prompt: prompt.abort_handle(),
        });
    }

    fn finish_microphone(&mut self, acquired: CoreResult<CaptureHandle>) -> CoreResult<()> {
        let mut mic = match acquired {
            Ok(mic) => mic,
            Err(e) => {
                warn!(error = %e, "Microphone not enabled");
                self.last_error = Some(e.to_string());
                self.publish();
                return Err(e);
            }
        };
        // One continuous recording; each answer resumes it, each pause closes a window.
        self.controller.start(&mut mic);
        self.controller.pause(&mut mic);
        self.microphone = Some(mic);
        self.last_error = None;
        self.publish();
        info!("Microphone ready");
        Ok(())
    }

    fn with_microphone(
        &mut self,
        action: impl FnOnce(&CaptureController, &mut CaptureHandle),
    ) -> CoreResult<()> {
        let phase = self.core.phase();
        if self.core.is_terminal() {
            return Err(ProctorError::SessionTerminated {
                phase,
                location: ErrorLocation::from(Location::caller()),
            });
        }
        match self.microphone.as_mut() {
            Some(mic) => {
                action(&self.controller, mic);
                Ok(())
            }
            None => Err(Self::entry_guard(phase, "microphone not enabled")),
        }
    }
}

/// Await a capture prompt, giving up after `limit` when one is set.
async fn answer_within(
    modality: Modality,
    limit: Option<Duration>,
    prompt: impl Future<Output = CoreResult<CaptureHandle>>,
) -> CoreResult<CaptureHandle> {
    let Some(limit) = limit else {
        return prompt.await;
    };
    match tokio::time::timeout(limit, prompt).await {
        Ok(acquired) => acquired,
        Err(_) => Err(ProctorError::PermissionDenied {
            modality,
            reason: format!("prompt unanswered after {}s", limit.as_secs()),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

async fn finalize(controller: &CaptureController, mut display: CaptureHandle) -> Option<CapturedMedia> {
    match controller.stop(&mut display).await {
        Ok(media) => Some(media),
        Err(e) => {
            warn!(error = %e, "Display recording not finalized");
            None
        }
    }
}

async fn upload_and_link(
    sync: &SyncBridge,
    media: &CapturedMedia,
    kind: ArtifactKind,
) -> CoreResult<UploadedArtifact> {
    let artifact = sync.upload(media, kind).await?;
    if let Err(e) = sync.record_artifact(&artifact).await {
        warn!(%kind, error = %e, "Artifact uploaded but not linked");
    }
    Ok(artifact)
}
