mod artifact;
mod backend;
mod bridge;
mod phases;
mod retry;

pub use {
    artifact::{
        ArtifactKind, DEFAULT_MAX_ARTIFACT_BYTES, UploadOutcome, UploadRequest, UploadedArtifact,
        artifact_file_name, extension_for,
    },
    backend::{ObjectStorage, SubmissionBackend},
    bridge::SyncBridge,
    phases::{PhaseRecorder, PhaseWriter},
    retry::{Retried, RetryPolicy, with_retry},
};
