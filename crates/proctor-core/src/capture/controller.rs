use crate::{
    CoreResult, ProctorError,
    capture::{CaptureHandle, CapturedMedia, DisplaySurface, MediaDevices, Modality, Segment},
};

use std::{panic::Location, sync::Arc, time::Duration};

use error_location::ErrorLocation;
use tracing::{debug, info, instrument, warn};

/// Default recorder timeslice.
pub const DEFAULT_CHUNK_INTERVAL: Duration = Duration::from_secs(1);

/// Acquires device streams and drives recorder lifecycles.
///
/// Chunking bounds data loss on abrupt termination to one `chunk_interval`.
#[derive(Clone)]
pub struct CaptureController {
    devices: Arc<dyn MediaDevices>,
    chunk_interval: Duration,
}

impl CaptureController {
    /// Controller over `devices`, flushing every `chunk_interval`.
    pub fn new(devices: Arc<dyn MediaDevices>, chunk_interval: Duration) -> Self {
        Self {
            devices,
            chunk_interval,
        }
    }

    /// Request a monitor-level display capture.
    ///
    /// Window and tab shares are rejected rather than accepted as a
    /// downgrade; the stream is stopped before the error is returned.
    #[instrument(skip(self))]
    pub async fn acquire_display_capture(&self) -> CoreResult<CaptureHandle> {
        let location = Location::caller();
        let source = self.devices.request_display().await?;

        match source.display_surface() {
            Some(DisplaySurface::Monitor) | None => {}
            Some(surface) => {
                source.stop();
                warn!(%surface, "Display capture rejected, not a full monitor");
                return Err(ProctorError::UnsupportedSurface {
                    surface: surface.to_string(),
                    location: ErrorLocation::from(location),
                });
            }
        }

        let handle = CaptureHandle::new(source);
        info!(handle = %handle.id(), "Display capture acquired");
        Ok(handle)
    }

    /// Request an audio-only capture.
    #[instrument(skip(self))]
    pub async fn acquire_microphone(&self) -> CoreResult<CaptureHandle> {
        let source = self.devices.request_microphone().await?;
        let handle = CaptureHandle::new(source);
        info!(handle = %handle.id(), "Microphone acquired");
        Ok(handle)
    }

    /// Begin recording. Starting a handle that already started is a no-op.
    pub fn start(&self, handle: &mut CaptureHandle) {
        if !handle.begin(self.chunk_interval) {
            debug!(handle = %handle.id(), state = ?handle.recorder_state(), "Start ignored");
        }
    }

    /// Pause recording. A no-op unless the recorder is recording.
    pub fn pause(&self, handle: &mut CaptureHandle) {
        if !handle.pause() {
            debug!(handle = %handle.id(), state = ?handle.recorder_state(), "Pause ignored");
        }
    }

    /// Resume recording. A no-op unless the recorder is paused.
    pub fn resume(&self, handle: &mut CaptureHandle) {
        if !handle.resume() {
            debug!(handle = %handle.id(), state = ?handle.recorder_state(), "Resume ignored");
        }
    }

    /// Stop capturing, wait for the streams' tails, then finalize the
    /// recording and release the streams.
    ///
    /// # Errors
    ///
    /// Returns `NoMediaCaptured` if the recorder never started or produced
    /// nothing. The streams are released either way.
    #[instrument(skip(self, handle), fields(handle = %handle.id()))]
    pub async fn stop(&self, handle: &mut CaptureHandle) -> CoreResult<CapturedMedia> {
        handle.halt();
        handle.flush_streams().await;
        self.finalize(handle)
    }

    #[track_caller]
    fn finalize(&self, handle: &mut CaptureHandle) -> CoreResult<CapturedMedia> {
        let location = Location::caller();
        let finished = handle.finish();
        let modality = handle.modality();

        let (chunks, segments) = match finished {
            Some(parts) => parts,
            None => {
                handle.release();
                return Err(ProctorError::NoMediaCaptured {
                    location: ErrorLocation::from(location),
                });
            }
        };

        let chunk_count = chunks.len();
        let payload: Vec<u8> = chunks.into_iter().flat_map(|c| c.bytes).collect();
        let payload_len = payload.len();
        let (bytes, content_type) = handle.finalize_payload(payload);
        handle.release();

        if payload_len == 0 {
            return Err(ProctorError::NoMediaCaptured {
                location: ErrorLocation::from(location),
            });
        }

        // Container headers shift the payload; keep segment offsets absolute.
        let header = bytes.len().saturating_sub(payload_len);
        let segments: Vec<Segment> = segments
            .into_iter()
            .map(|s| Segment {
                index: s.index,
                start: s.start + header,
                end: s.end + header,
            })
            .collect();

        info!(
            modality = %modality,
            bytes = bytes.len(),
            chunk_count,
            segment_count = segments.len(),
            "Recording finalized"
        );

        Ok(CapturedMedia {
            modality,
            bytes: Arc::from(bytes),
            content_type,
            segments,
            chunk_count,
        })
    }
}
