use crate::{
    CoreResult, Phase, ProctorError,
    flow::PhaseSubmission,
    session::{PhaseReceipt, ProctorHandle},
};

use std::panic::Location;

use error_location::ErrorLocation;
use tracing::{info, instrument};

/// Overview video, then consent to proctoring.
pub struct GuidelinesStep {
    handle: ProctorHandle,
    video_ended: bool,
}

impl GuidelinesStep {
    /// Step driving `handle`.
    pub fn new(handle: ProctorHandle) -> Self {
        Self {
            handle,
            video_ended: false,
        }
    }

    /// The overview video played to the end.
    pub fn on_video_ended(&mut self) {
        self.video_ended = true;
    }

    /// Whether the candidate may press "begin".
    pub fn can_begin(&self) -> bool {
        self.video_ended
    }

    /// Start proctoring and advance to writing.
    ///
    /// # Errors
    ///
    /// `EntryGuard` while the video is still playing or when proctoring did
    /// not start (the message carries the session's last error). The
    /// candidate stays in guidelines and may retry.
    #[instrument(skip(self))]
    pub async fn begin_assessment(&mut self) -> CoreResult<PhaseReceipt> {
        let location = Location::caller();
        if !self.video_ended {
            return Err(ProctorError::EntryGuard {
                phase: Phase::Writing,
                reason: String::from("guidelines video has not finished"),
                location: ErrorLocation::from(location),
            });
        }
        if !self.handle.start_proctoring().await {
            let reason = self
                .handle
                .last_error()
                .unwrap_or_else(|| String::from("proctoring did not start"));
            return Err(ProctorError::EntryGuard {
                phase: Phase::Writing,
                reason,
                location: ErrorLocation::from(location),
            });
        }
        info!("Guidelines accepted");
        self.handle.complete_phase(PhaseSubmission::Guidelines).await
    }
}
