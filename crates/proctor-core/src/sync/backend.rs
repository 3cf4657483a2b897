use crate::{
    CoreResult, Phase, ViolationEvent,
    flow::PhaseSubmission,
    sync::{ArtifactKind, UploadRequest},
};

use async_trait::async_trait;

/// Backend submission record.
///
/// Every call is idempotent from the session's side and may be repeated
/// for the same logical event.
#[async_trait]
pub trait SubmissionBackend: Send + Sync {
    /// Move the submission record to `phase`.
    async fn update_phase(&self, submission_id: &str, phase: Phase) -> CoreResult<()>;

    /// Record a violation.
    async fn report_violation(&self, submission_id: &str, event: &ViolationEvent) -> CoreResult<()>;

    /// Link an uploaded artifact to the submission.
    async fn record_artifact_url(
        &self,
        submission_id: &str,
        kind: ArtifactKind,
        url: &str,
    ) -> CoreResult<()>;

    /// Store text and choice answers for a phase.
    async fn submit_responses(&self, submission_id: &str, submission: &PhaseSubmission) -> CoreResult<()>;
}

/// Object storage for media artifacts.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store the object and return its URL.
    async fn upload(&self, request: &UploadRequest) -> CoreResult<String>;
}
