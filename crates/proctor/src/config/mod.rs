mod audio_config;
mod backend_config;
#[allow(clippy::module_inception)]
mod config;
mod phases_config;
mod proctoring_config;
mod upload_config;

pub(crate) use {
    audio_config::AudioConfig, backend_config::BackendConfig, config::Config,
    phases_config::PhasesConfig, proctoring_config::ProctoringConfig, upload_config::UploadConfig,
};

pub(crate) const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub(crate) const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub(crate) fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

pub(crate) fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
