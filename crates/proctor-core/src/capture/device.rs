use crate::CoreResult;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Kind of device a stream was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Screen capture.
    Display,
    /// Audio input.
    Microphone,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Display => f.write_str("display"),
            Modality::Microphone => f.write_str("microphone"),
        }
    }
}

/// What the candidate chose to share in the display picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplaySurface {
    /// A whole monitor.
    Monitor,
    /// A single application window.
    Window,
    /// A single browser tab.
    Browser,
}

impl fmt::Display for DisplaySurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplaySurface::Monitor => f.write_str("monitor"),
            DisplaySurface::Window => f.write_str("window"),
            DisplaySurface::Browser => f.write_str("browser"),
        }
    }
}

/// Grants access to capture devices.
///
/// Both requests may wait on a user prompt; implementations report a
/// dismissed prompt as [`ProctorError::PermissionDenied`](crate::ProctorError).
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Prompt for a display capture stream.
    async fn request_display(&self) -> CoreResult<Box<dyn MediaSource>>;

    /// Prompt for an audio-only capture stream.
    async fn request_microphone(&self) -> CoreResult<Box<dyn MediaSource>>;
}

/// A live device stream feeding a recorder.
///
/// The source buffers encoded data internally while capturing is enabled;
/// the recorder pulls it with [`drain`](MediaSource::drain) once per chunk
/// interval and on every pause and stop.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Device kind.
    fn modality(&self) -> Modality;

    /// Shared surface, when the platform reports it.
    fn display_surface(&self) -> Option<DisplaySurface> {
        None
    }

    /// Content type of the finalized artifact.
    fn content_type(&self) -> String;

    /// Whether every track of the stream is still live.
    fn is_live(&self) -> bool;

    /// Flips to `true` when a track ends (user revoked, device removed).
    fn ended(&self) -> watch::Receiver<bool>;

    /// Gate data production; while disabled the source discards input.
    fn set_capturing(&self, capturing: bool);

    /// Take everything produced since the previous drain.
    fn drain(&self) -> Vec<u8>;

    /// Wait until data produced before capturing was disabled has arrived.
    ///
    /// Called once when a recording is stopped, before the final drain.
    /// Implementations bound the wait themselves.
    async fn flush(&self) {}

    /// Wrap the concatenated payload into its container format.
    fn finalize(&self, payload: Vec<u8>) -> Vec<u8> {
        payload
    }

    /// Stop all tracks. Idempotent.
    fn stop(&self);
}
