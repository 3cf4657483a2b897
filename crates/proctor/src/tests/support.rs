use crate::bridge::Outbound;

use proctor_core::{
    ArtifactKind, Beacon, BeaconPayload, CoreResult, ObjectStorage, Phase, PhaseSubmission,
    SubmissionBackend, UploadRequest, ViolationEvent,
};

use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use tokio::{sync::mpsc, time};

pub(crate) const SUBMISSION_ID: &str = "sub-42";

/// Beacon that remembers payloads instead of posting them.
#[derive(Debug, Default)]
pub(crate) struct RecordingBeacon {
    pub(crate) sent: Mutex<Vec<BeaconPayload>>,
}

impl Beacon for RecordingBeacon {
    fn send(&self, payload: BeaconPayload) -> bool {
        #[allow(clippy::unwrap_used)]
        self.sent.lock().unwrap().push(payload);
        true
    }
}

/// Backend that records phase updates and accepts everything.
#[derive(Debug, Default)]
pub(crate) struct RecordingBackend {
    pub(crate) phases: Mutex<Vec<Phase>>,
}

impl RecordingBackend {
    #[allow(clippy::unwrap_used)]
    pub(crate) fn phases(&self) -> Vec<Phase> {
        self.phases.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubmissionBackend for RecordingBackend {
    async fn update_phase(&self, _submission_id: &str, phase: Phase) -> CoreResult<()> {
        #[allow(clippy::unwrap_used)]
        self.phases.lock().unwrap().push(phase);
        Ok(())
    }

    async fn report_violation(&self, _submission_id: &str, _event: &ViolationEvent) -> CoreResult<()> {
        Ok(())
    }

    async fn record_artifact_url(&self, _submission_id: &str, _kind: ArtifactKind, _url: &str) -> CoreResult<()> {
        Ok(())
    }

    async fn submit_responses(&self, _submission_id: &str, _submission: &PhaseSubmission) -> CoreResult<()> {
        Ok(())
    }
}

/// Storage that accepts every upload under a fixed URL scheme.
#[derive(Debug, Default)]
pub(crate) struct AcceptingStorage;

#[async_trait]
impl ObjectStorage for AcceptingStorage {
    async fn upload(&self, request: &UploadRequest) -> CoreResult<String> {
        Ok(format!("https://storage.test/{}/{}", request.folder, request.file_name))
    }
}

/// Receive outbound messages until one matches `wanted`; `None` on timeout or close.
pub(crate) async fn next_matching<F>(
    rx: &mut mpsc::UnboundedReceiver<Outbound>,
    wanted: F,
) -> Option<Outbound>
where
    F: Fn(&Outbound) -> bool,
{
    time::timeout(Duration::from_secs(5), async {
        while let Some(message) = rx.recv().await {
            if wanted(&message) {
                return Some(message);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}
