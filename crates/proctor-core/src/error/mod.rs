use crate::{Phase, capture::Modality};

use error_location::ErrorLocation;
use thiserror::Error;

/// Proctoring errors with source location tracking.
#[derive(Error, Debug)]
pub enum ProctorError {
    /// The candidate declined a capture prompt (or dismissed it).
    #[error("Permission denied for {modality} capture: {reason} {location}")]
    PermissionDenied {
        /// Device modality that was requested.
        modality: Modality,
        /// Why the request was refused.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A display capture was granted for something other than a whole monitor.
    #[error("Unsupported display surface '{surface}', share your entire screen {location}")]
    UnsupportedSurface {
        /// Surface the candidate chose.
        surface: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A capture stream ended while it was still needed.
    #[error("Capture lost: {reason} {location}")]
    CaptureLost {
        /// Description of how the stream was lost.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The screen setup failed the multi-monitor precheck.
    #[error("Screen setup rejected: {reason} {location}")]
    GeometryViolation {
        /// Which bound was exceeded.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Object storage upload failed after all retry attempts.
    #[error("Upload failed after {attempts} attempt(s): {reason} {location}")]
    UploadFailure {
        /// Number of attempts made.
        attempts: u32,
        /// Last failure reason.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A backend report (violation, phase update, artifact link) was not delivered.
    #[error("Backend report '{endpoint}' not delivered: {reason} {location}")]
    ReportDeliveryFailure {
        /// Logical endpoint name.
        endpoint: &'static str,
        /// Failure reason.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Requested phase change does not follow the assessment order.
    #[error("Invalid phase transition {from} -> {to} {location}")]
    InvalidTransition {
        /// Phase the session is in.
        from: Phase,
        /// Phase that was requested.
        to: Phase,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The session is disqualified or finished and accepts no further work.
    #[error("Session is terminated in phase {phase} {location}")]
    SessionTerminated {
        /// Terminal phase the session is in.
        phase: Phase,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A phase entry condition is not met yet.
    #[error("Cannot enter {phase}: {reason} {location}")]
    EntryGuard {
        /// Phase whose guard failed.
        phase: Phase,
        /// Which condition is missing.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Recorder was stopped without any captured data.
    #[error("No media captured {location}")]
    NoMediaCaptured {
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Artifact exceeds the configured upload size.
    #[error("Artifact of {size} bytes exceeds the {limit} byte limit {location}")]
    ArtifactTooLarge {
        /// Artifact size in bytes.
        size: u64,
        /// Configured limit in bytes.
        limit: u64,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Media device operation failed.
    #[error("Device error: {reason} {location}")]
    DeviceError {
        /// Description of the device error.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The session task is gone.
    #[error("Session channel closed: {message} {location}")]
    ChannelClosed {
        /// What was being sent or awaited.
        message: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl ProctorError {
    /// Whether the candidate can retry or continue after this error.
    ///
    /// Lost captures and terminated sessions end the attempt; everything else
    /// either offers a retry or is merely logged.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ProctorError::CaptureLost { .. } | ProctorError::SessionTerminated { .. }
        )
    }
}

/// Result type alias using [`ProctorError`].
pub type Result<T> = std::result::Result<T, ProctorError>;
