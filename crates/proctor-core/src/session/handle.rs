use crate::{
    CoreResult, Phase, ProctorError,
    flow::PhaseSubmission,
    session::SessionState,
    sync::{UploadOutcome, UploadedArtifact},
};

use std::panic::Location;

use error_location::ErrorLocation;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::warn;

/// Snapshot published after every session change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    /// Current phase.
    pub current_phase: Phase,
    /// Lifecycle state.
    pub state: SessionState,
    /// Whether capture and detectors are running.
    pub is_proctoring: bool,
    /// Message of the last failed start or capture operation.
    pub last_error: Option<String>,
    /// Whether a microphone capture is bound.
    pub microphone_ready: bool,
}

/// Result of completing a phase once its work has been persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseReceipt {
    /// Phase the session advanced to.
    pub phase: Phase,
    /// Artifact uploaded for the completed phase, if it produced one.
    pub artifact: Option<UploadedArtifact>,
    /// First persistence failure, if any; the advance stands regardless.
    pub sync_error: Option<String>,
}

/// Requests served by the session task.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Start {
        reply: oneshot::Sender<bool>,
    },
    Stop {
        reply: oneshot::Sender<Option<UploadOutcome>>,
    },
    CompletePhase {
        submission: PhaseSubmission,
        reply: oneshot::Sender<CoreResult<PhaseReceipt>>,
    },
    EnableMicrophone {
        reply: oneshot::Sender<CoreResult<()>>,
    },
    BeginAnswer {
        reply: oneshot::Sender<CoreResult<()>>,
    },
    EndAnswer {
        reply: oneshot::Sender<CoreResult<()>>,
    },
}

/// The session's public surface, passed to whatever drives the phases.
///
/// Cheap to clone. Every method is answered by the session task in order,
/// interleaved with violation handling.
#[derive(Clone)]
pub struct ProctorHandle {
    commands: mpsc::Sender<SessionCommand>,
    status: watch::Receiver<SessionStatus>,
}

impl ProctorHandle {
    pub(crate) fn new(commands: mpsc::Sender<SessionCommand>, status: watch::Receiver<SessionStatus>) -> Self {
        Self { commands, status }
    }

    #[track_caller]
    fn closed(message: &str) -> ProctorError {
        ProctorError::ChannelClosed {
            message: message.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    async fn request<T>(
        &self,
        what: &'static str,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> CoreResult<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| Self::closed(what))?;
        rx.await.map_err(|_| Self::closed(what))
    }

    /// Acquire display capture, arm detectors for the phase and go active.
    ///
    /// `false` with [`last_error`](Self::last_error) set when the prompt was
    /// refused or the screen setup failed the precheck.
    pub async fn start_proctoring(&self) -> bool {
        match self.request("start", |reply| SessionCommand::Start { reply }).await {
            Ok(started) => started,
            Err(e) => {
                warn!(error = %e, "Start request not answered");
                false
            }
        }
    }

    /// Tear everything down and upload the display recording.
    ///
    /// Idempotent: only the first call uploads; later calls return `None`.
    pub async fn stop_proctoring(&self) -> Option<UploadOutcome> {
        match self.request("stop", |reply| SessionCommand::Stop { reply }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Stop request not answered");
                None
            }
        }
    }

    /// Persist the current phase's work and advance to the next phase.
    ///
    /// The session advances as soon as the submission is accepted; the
    /// receipt arrives once uploads and backend updates have drained.
    ///
    /// # Errors
    ///
    /// `SessionTerminated` after disqualification, `InvalidTransition` when
    /// the submission is not for the current phase, `EntryGuard` when the
    /// next phase needs proctoring that is not running.
    pub async fn complete_phase(&self, submission: PhaseSubmission) -> CoreResult<PhaseReceipt> {
        self.request("complete_phase", |reply| SessionCommand::CompletePhase { submission, reply })
            .await?
    }

    /// Acquire the microphone for the verbal phase. Recording starts paused.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` if refused, `EntryGuard` outside the verbal phase.
    pub async fn enable_microphone(&self) -> CoreResult<()> {
        self.request("enable_microphone", |reply| SessionCommand::EnableMicrophone { reply })
            .await?
    }

    /// Resume the microphone recording for one answer.
    ///
    /// # Errors
    ///
    /// `EntryGuard` when no microphone is bound.
    pub async fn begin_answer(&self) -> CoreResult<()> {
        self.request("begin_answer", |reply| SessionCommand::BeginAnswer { reply })
            .await?
    }

    /// Pause the microphone recording after an answer.
    ///
    /// # Errors
    ///
    /// `EntryGuard` when no microphone is bound.
    pub async fn end_answer(&self) -> CoreResult<()> {
        self.request("end_answer", |reply| SessionCommand::EndAnswer { reply })
            .await?
    }

    /// Latest status snapshot.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Whether capture and detectors are running.
    pub fn is_proctoring(&self) -> bool {
        self.status.borrow().is_proctoring
    }

    /// Message of the last failed start or capture operation.
    pub fn last_error(&self) -> Option<String> {
        self.status.borrow().last_error.clone()
    }

    /// Current phase.
    pub fn current_phase(&self) -> Phase {
        self.status.borrow().current_phase
    }

    /// Status stream for observers.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }
}
