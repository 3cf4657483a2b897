use proctor_core::{
    ArtifactKind, CoreResult, Phase, PhaseSubmission, ProctorError, SubmissionBackend,
    ViolationEvent,
};

use std::panic::Location;

use async_trait::async_trait;
use error_location::ErrorLocation;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

/// Submission record behind `/api/test/{token}/...`.
pub struct HttpBackend {
    http: reqwest::Client,
    test_url: String,
}

impl HttpBackend {
    /// Backend for the test link `token` at `origin`.
    pub fn new(http: reqwest::Client, origin: &str, token: &str) -> Self {
        Self {
            http,
            test_url: format!("{}/api/test/{}", origin.trim_end_matches('/'), token),
        }
    }

    async fn post(&self, endpoint: &'static str, body: Value) -> CoreResult<()> {
        let location = Location::caller();
        let url = format!("{}/{}", self.test_url, endpoint);
        let failure = |reason: String| ProctorError::ReportDeliveryFailure {
            endpoint,
            reason,
            location: ErrorLocation::from(location),
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(failure(format!("HTTP {}: {}", status, text)));
        }
        debug!(endpoint, %status, "Backend call delivered");
        Ok(())
    }
}

/// `update-phase` body.
pub fn phase_body(submission_id: &str, phase: Phase) -> Value {
    json!({ "submissionId": submission_id, "phase": phase.as_str() })
}

/// `violation` body; same shape as the unload beacon.
pub fn violation_body(submission_id: &str, event: &ViolationEvent) -> Value {
    json!({
        "submissionId": submission_id,
        "violationType": event.kind().as_str(),
        "metadata": event.report_metadata(),
    })
}

/// Endpoint and body linking an uploaded artifact.
pub fn artifact_body(submission_id: &str, kind: ArtifactKind, url: &str) -> (&'static str, Value) {
    match kind {
        ArtifactKind::ScreenRecording => (
            "screen-recording",
            json!({ "submissionId": submission_id, "screenUrl": url }),
        ),
        ArtifactKind::VerbalAudio => (
            "verbal",
            json!({ "submissionId": submission_id, "audioUrl": url }),
        ),
    }
}

/// Endpoint and body for a phase's responses; `None` when it has none.
///
/// Choice answers go as a `questionId -> option` map; unanswered
/// questions are left out.
pub fn response_body(submission_id: &str, submission: &PhaseSubmission) -> Option<(&'static str, Value)> {
    let answers_map = |answers: &[proctor_core::ChoiceAnswer]| -> Map<String, Value> {
        answers
            .iter()
            .filter_map(|a| {
                a.answer
                    .map(|option| (a.question_id.clone(), Value::from(option.as_str())))
            })
            .collect()
    };

    match submission {
        PhaseSubmission::Writing(response) => Some((
            "writing",
            json!({
                "submissionId": submission_id,
                "taskNumber": response.task_number,
                "text": response.text,
            }),
        )),
        PhaseSubmission::Intelligence { answers } => Some((
            "intelligence",
            json!({ "submissionId": submission_id, "answers": answers_map(answers) }),
        )),
        PhaseSubmission::Personality { answers } => Some((
            "personality",
            json!({ "submissionId": submission_id, "answers": answers_map(answers) }),
        )),
        PhaseSubmission::Guidelines | PhaseSubmission::Verbal { .. } => None,
    }
}

#[async_trait]
impl SubmissionBackend for HttpBackend {
    #[instrument(skip(self))]
    async fn update_phase(&self, submission_id: &str, phase: Phase) -> CoreResult<()> {
        self.post("update-phase", phase_body(submission_id, phase)).await
    }

    #[instrument(skip(self, event), fields(kind = %event.kind()))]
    async fn report_violation(&self, submission_id: &str, event: &ViolationEvent) -> CoreResult<()> {
        self.post("violation", violation_body(submission_id, event)).await
    }

    #[instrument(skip(self))]
    async fn record_artifact_url(
        &self,
        submission_id: &str,
        kind: ArtifactKind,
        url: &str,
    ) -> CoreResult<()> {
        let (endpoint, body) = artifact_body(submission_id, kind, url);
        self.post(endpoint, body).await
    }

    #[instrument(skip(self, submission), fields(phase = %submission.phase()))]
    async fn submit_responses(&self, submission_id: &str, submission: &PhaseSubmission) -> CoreResult<()> {
        match response_body(submission_id, submission) {
            Some((endpoint, body)) => self.post(endpoint, body).await,
            None => Ok(()),
        }
    }
}
