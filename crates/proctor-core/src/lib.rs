//! Proctor Core Library
//!
//! Integrity layer for a multi-phase online assessment: media capture,
//! violation detection, the proctoring state machine, the phase flow and
//! the upload/sync bridge. Platform facilities are reached through traits
//! ([`MediaDevices`], [`HostEnvironment`], [`Beacon`], [`Navigator`],
//! [`SubmissionBackend`], [`ObjectStorage`]) so the host decides how they
//! are provided.
//!
//! # Example
//!
//! ```no_run
//! use proctor_core::{
//!     Collaborators, GuidelinesStep, Phase, ProctorSettings, ProctoringSession, SessionContext,
//! };
//!
//! async fn run(collaborators: Collaborators) {
//!     let context = SessionContext {
//!         submission_id: "sub-1".into(),
//!         token: "link-token".into(),
//!         resume_phase: Phase::Guidelines,
//!     };
//!     let (session, handle, _gate) =
//!         ProctoringSession::new(context, collaborators, ProctorSettings::default());
//!     tokio::spawn(session.run());
//!
//!     let mut guidelines = GuidelinesStep::new(handle.clone());
//!     guidelines.on_video_ended();
//!     match guidelines.begin_assessment().await {
//!         Ok(receipt) => println!("Now in {}", receipt.phase),
//!         Err(e) => println!("Cannot begin: {e}"),
//!     }
//! }
//! ```

mod capture;
mod detect;
mod error;
mod flow;
mod phase;
mod session;
mod settings;
mod sync;
mod violation;

pub use {
    capture::{
        CaptureController, CaptureHandle, CapturedMedia, DEFAULT_CHUNK_INTERVAL, DisplaySurface,
        MediaDevices, MediaSource, Modality, RecorderState, Segment,
    },
    detect::{
        ArmContext, Beacon, BeaconPayload, BrowserSignal, ClipboardAction, ClipboardMonitor,
        DEFAULT_MULTI_MONITOR_GRACE, Detector, DetectorSet, DisplayLivenessDetector, Disposition,
        HostEnvironment, KeyChord, LEAVE_WARNING, MAX_LIVENESS_POLL, MultiMonitorDetector,
        NetworkMonitor, ScreenGeometry, ShortcutInterceptor, SignalBus, SignalGate, UnloadDetector,
        ViolationSink, VisibilityDetector, is_copy_chord, is_devtools_chord, precheck_geometry,
    },
    error::{ProctorError, Result as CoreResult},
    flow::{
        AnswerOption, ChoiceAnswer, ChoiceStep, Countdown, GuidelinesStep, ParseAnswerError,
        PhasePlan, PhaseSubmission, VerbalRecording, VerbalStage, VerbalStep, WritingResponse,
        WritingStep, WritingTask,
    },
    phase::{ParsePhaseError, Phase},
    session::{
        Collaborators, Navigator, PhaseReceipt, ProctorHandle, ProctoringSession, Reaction,
        SessionContext, SessionCore, SessionState, SessionStatus,
    },
    settings::ProctorSettings,
    sync::{
        ArtifactKind, DEFAULT_MAX_ARTIFACT_BYTES, ObjectStorage, PhaseRecorder, PhaseWriter, Retried,
        RetryPolicy, SubmissionBackend, SyncBridge, UploadOutcome, UploadRequest, UploadedArtifact,
        artifact_file_name, extension_for, with_retry,
    },
    violation::{Severity, ViolationEvent, ViolationKind, ViolationPolicy},
};

#[cfg(test)]
mod tests;
