use proctor_core::{CoreResult, ObjectStorage, ProctorError, UploadRequest};

use std::panic::Location;

use async_trait::async_trait;
use error_location::ErrorLocation;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct UploadReply {
    url: String,
}

/// `type` field the upload endpoint expects for a storage folder.
pub fn upload_type(folder: &str) -> &'static str {
    match folder {
        "audio" => "audio",
        "screen-recordings" => "screen",
        _ => "video",
    }
}

/// Multipart uploads to `/api/upload`.
pub struct HttpStorage {
    http: reqwest::Client,
    upload_url: String,
    submission_id: String,
}

impl HttpStorage {
    /// Storage posting to `origin` on behalf of `submission_id`.
    pub fn new(http: reqwest::Client, origin: &str, submission_id: &str) -> Self {
        Self {
            http,
            upload_url: format!("{}/api/upload", origin.trim_end_matches('/')),
            submission_id: submission_id.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for HttpStorage {
    #[instrument(skip(self, request), fields(file_name = %request.file_name, bytes = request.bytes.len()))]
    async fn upload(&self, request: &UploadRequest) -> CoreResult<String> {
        let location = Location::caller();
        let failure = |reason: String| ProctorError::UploadFailure {
            attempts: 1,
            reason,
            location: ErrorLocation::from(location),
        };

        let part = Part::bytes(request.bytes.to_vec())
            .file_name(request.file_name.clone())
            .mime_str(&request.content_type)
            .map_err(|e| failure(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("type", upload_type(request.folder))
            .text("submissionId", self.submission_id.clone());

        let response = self
            .http
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(failure(format!("HTTP {}: {}", status, text)));
        }

        let reply: UploadReply = response.json().await.map_err(|e| failure(e.to_string()))?;
        debug!(url = %reply.url, "Upload stored");
        Ok(reply.url)
    }
}
