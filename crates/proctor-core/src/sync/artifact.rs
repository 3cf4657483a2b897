use crate::capture::Segment;

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};

/// Upload limit used when none is configured (500 MB).
pub const DEFAULT_MAX_ARTIFACT_BYTES: u64 = 500 * 1024 * 1024;

/// Media artifacts the session uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Full-session display recording.
    ScreenRecording,
    /// Combined verbal-phase microphone recording.
    VerbalAudio,
}

impl ArtifactKind {
    /// Storage folder.
    pub fn folder(self) -> &'static str {
        match self {
            ArtifactKind::ScreenRecording => "screen-recordings",
            ArtifactKind::VerbalAudio => "audio",
        }
    }

    /// File name prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            ArtifactKind::ScreenRecording => "screen",
            ArtifactKind::VerbalAudio => "verbal",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::ScreenRecording => f.write_str("screen_recording"),
            ArtifactKind::VerbalAudio => f.write_str("verbal_audio"),
        }
    }
}

/// File extension for a content type, ignoring codec parameters.
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    match essence {
        "video/webm" | "audio/webm" => "webm",
        "video/mp4" => "mp4",
        "audio/mp4" => "m4a",
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        _ => "bin",
    }
}

/// `<prefix>_<submissionId>_<millis>_<random>.<ext>`, safe for any object store.
pub fn artifact_file_name(
    kind: ArtifactKind,
    submission_id: &str,
    content_type: &str,
    at: DateTime<Utc>,
) -> String {
    let safe_id: String = submission_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!(
        "{}_{}_{}_{}.{}",
        kind.prefix(),
        safe_id,
        at.timestamp_millis(),
        suffix,
        extension_for(content_type)
    )
}

/// One object storage write.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Artifact bytes, shared across retries.
    pub bytes: Arc<[u8]>,
    /// MIME type.
    pub content_type: String,
    /// Destination folder.
    pub folder: &'static str,
    /// Destination object name.
    pub file_name: String,
}

/// Uploaded artifact as handed back to the flow.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedArtifact {
    /// What was uploaded.
    pub kind: ArtifactKind,
    /// Storage URL.
    pub url: String,
    /// Artifact size.
    pub bytes: usize,
    /// Recording windows inside the artifact.
    pub segments: Vec<Segment>,
    /// Upload attempts it took.
    pub attempts: u32,
}

/// Summary of an upload, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadOutcome {
    /// Whether storage accepted the artifact.
    pub success: bool,
    /// Storage URL on success.
    pub url: Option<String>,
    /// Last error on failure.
    pub error: Option<String>,
    /// Attempts made.
    pub attempts: u32,
}
