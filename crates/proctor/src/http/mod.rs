mod backend;
mod beacon;
mod storage;

pub(crate) use {backend::HttpBackend, beacon::HttpBeacon, storage::HttpStorage};

#[cfg(test)]
pub(crate) use {
    backend::{artifact_body, phase_body, response_body, violation_body},
    storage::upload_type,
};

use crate::{AppResult, config::BackendConfig};

/// Async client shared by the backend and the storage adapter.
pub(crate) fn client(config: &BackendConfig) -> AppResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()?)
}
