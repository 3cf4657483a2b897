use crate::{
    CoreResult, Phase, ProctorError, ViolationEvent,
    capture::CapturedMedia,
    flow::PhaseSubmission,
    sync::{
        ArtifactKind, ObjectStorage, RetryPolicy, SubmissionBackend, UploadOutcome, UploadRequest,
        UploadedArtifact, artifact_file_name, with_retry,
    },
};

use std::{panic::Location, sync::Arc};

use chrono::Utc;
use error_location::ErrorLocation;
use tracing::{error, info, instrument, warn};

/// Moves artifacts and reports between the session and its collaborators.
///
/// Cheap to clone; background tasks hold their own copy so in-flight work
/// survives the session that started it.
#[derive(Clone)]
pub struct SyncBridge {
    submission_id: Arc<str>,
    backend: Arc<dyn SubmissionBackend>,
    storage: Arc<dyn ObjectStorage>,
    retry: RetryPolicy,
    max_artifact_bytes: u64,
}

impl SyncBridge {
    /// Bridge for one submission.
    pub fn new(
        submission_id: &str,
        backend: Arc<dyn SubmissionBackend>,
        storage: Arc<dyn ObjectStorage>,
        retry: RetryPolicy,
        max_artifact_bytes: u64,
    ) -> Self {
        Self {
            submission_id: Arc::from(submission_id),
            backend,
            storage,
            retry,
            max_artifact_bytes,
        }
    }

    /// Submission this bridge reports for.
    pub fn submission_id(&self) -> &str {
        &self.submission_id
    }

    /// Upload a finalized recording with retry.
    ///
    /// # Errors
    ///
    /// `ArtifactTooLarge` before any attempt when the artifact exceeds the
    /// limit, `UploadFailure` once the retry schedule is exhausted.
    #[instrument(skip(self, media), fields(submission_id = %self.submission_id, bytes = media.len()))]
    pub async fn upload(&self, media: &CapturedMedia, kind: ArtifactKind) -> CoreResult<UploadedArtifact> {
        let size = media.len() as u64;
        if size > self.max_artifact_bytes {
            error!(size, limit = self.max_artifact_bytes, "Artifact exceeds upload limit");
            return Err(ProctorError::ArtifactTooLarge {
                size,
                limit: self.max_artifact_bytes,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let request = UploadRequest {
            bytes: Arc::clone(&media.bytes),
            content_type: media.content_type.clone(),
            folder: kind.folder(),
            file_name: artifact_file_name(kind, &self.submission_id, &media.content_type, Utc::now()),
        };

        let storage = Arc::clone(&self.storage);
        let retried = with_retry(self.retry, "upload", |_| {
            let storage = Arc::clone(&storage);
            let request = request.clone();
            async move { storage.upload(&request).await }
        })
        .await;

        match retried.result {
            Ok(url) => {
                info!(%kind, attempts = retried.attempts, file = %request.file_name, "Artifact uploaded");
                Ok(UploadedArtifact {
                    kind,
                    url,
                    bytes: media.len(),
                    segments: media.segments.clone(),
                    attempts: retried.attempts,
                })
            }
            Err(e) => {
                error!(%kind, attempts = retried.attempts, error = %e, "Artifact upload failed");
                Err(e)
            }
        }
    }

    /// [`upload`](Self::upload) flattened into an [`UploadOutcome`].
    pub async fn upload_outcome(&self, media: &CapturedMedia, kind: ArtifactKind) -> UploadOutcome {
        match self.upload(media, kind).await {
            Ok(artifact) => UploadOutcome {
                success: true,
                url: Some(artifact.url),
                error: None,
                attempts: artifact.attempts,
            },
            Err(e) => UploadOutcome {
                success: false,
                url: None,
                attempts: match &e {
                    ProctorError::UploadFailure { attempts, .. } => *attempts,
                    _ => 0,
                },
                error: Some(e.to_string()),
            },
        }
    }

    /// Fire-and-forget violation report. Failures are logged, never retried.
    pub fn report_violation(&self, event: ViolationEvent) {
        let bridge = self.clone();
        tokio::spawn(async move {
            let kind = event.kind();
            if let Err(e) = bridge
                .backend
                .report_violation(&bridge.submission_id, &event)
                .await
            {
                warn!(%kind, error = %e, "Violation report not delivered");
            }
        });
    }

    /// Move the backend record to `phase`.
    ///
    /// Sends immediately; the session orders its updates through a
    /// [`PhaseRecorder`](crate::sync::PhaseRecorder).
    ///
    /// # Errors
    ///
    /// `ReportDeliveryFailure`; the failure is also logged.
    pub async fn record_phase(&self, phase: Phase) -> CoreResult<()> {
        self.backend
            .update_phase(&self.submission_id, phase)
            .await
            .map_err(|e| delivery_failure("phase-update", e))
    }

    /// Link an uploaded artifact to the submission.
    ///
    /// # Errors
    ///
    /// `ReportDeliveryFailure`; the failure is also logged.
    pub async fn record_artifact(&self, artifact: &UploadedArtifact) -> CoreResult<()> {
        self.backend
            .record_artifact_url(&self.submission_id, artifact.kind, &artifact.url)
            .await
            .map_err(|e| delivery_failure("artifact-url", e))
    }

    /// Store a phase's text or choice answers.
    ///
    /// # Errors
    ///
    /// `ReportDeliveryFailure`; the failure is also logged.
    pub async fn submit_responses(&self, submission: &PhaseSubmission) -> CoreResult<()> {
        self.backend
            .submit_responses(&self.submission_id, submission)
            .await
            .map_err(|e| delivery_failure("responses", e))
    }
}

#[track_caller]
fn delivery_failure(endpoint: &'static str, source: ProctorError) -> ProctorError {
    warn!(endpoint, error = %source, "Backend report not delivered");
    match source {
        already @ ProctorError::ReportDeliveryFailure { .. } => already,
        other => ProctorError::ReportDeliveryFailure {
            endpoint,
            reason: other.to_string(),
            location: ErrorLocation::from(Location::caller()),
        },
    }
}
