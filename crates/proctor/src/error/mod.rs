use proctor_core::ProctorError;

use std::{panic::Location, result::Result as StdResult};

use error_location::ErrorLocation;
use thiserror::Error;

/// Application-level errors for the proctor host.
///
/// All variants include `ErrorLocation` for call-site tracking.
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from the proctoring core.
    #[error("Proctoring error: {source} {location}")]
    Proctor {
        /// The underlying core error.
        #[source]
        source: ProctorError,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// Malformed or unexpected message on the browser bridge.
    #[error("Bridge error: {reason} {location}")]
    BridgeError {
        /// Human-readable reason for failure.
        reason: String,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// HTTP client construction or transport failure.
    #[error("HTTP error: {source} {location}")]
    HttpError {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// Configuration loading or saving error.
    #[error("Configuration error: {reason} {location}")]
    ConfigError {
        /// Human-readable reason for failure.
        reason: String,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// IO error from filesystem or stdio operations.
    #[error("IO error: {source} {location}")]
    IoError {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// Location where this error was created.
        location: ErrorLocation,
    },
}

impl AppError {
    /// Whether the candidate can retry the action that failed.
    ///
    /// Core errors decide for themselves; host-side failures are transient.
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Proctor { source, .. } => source.is_recoverable(),
            _ => true,
        }
    }
}

// Manual From<ProctorError> with location tracking.
// Cannot use #[from] because it does not support extra fields.
impl From<ProctorError> for AppError {
    #[track_caller]
    fn from(source: ProctorError) -> Self {
        AppError::Proctor {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<reqwest::Error> for AppError {
    #[track_caller]
    fn from(source: reqwest::Error) -> Self {
        AppError::HttpError {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<std::io::Error> for AppError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        AppError::IoError {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Convenience type alias for Results using `AppError`.
pub type Result<T> = StdResult<T, AppError>;
