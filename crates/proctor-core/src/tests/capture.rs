use crate::{
    CaptureController, CaptureHandle, DisplaySurface, MediaDevices, Modality, ProctorError,
    RecorderState,
    tests::support::{FakeMediaDevices, FakeSource, Grant},
};

use std::{sync::Arc, time::Duration};

const TICK: Duration = Duration::from_millis(100);

fn controller(devices: &Arc<FakeMediaDevices>) -> CaptureController {
    CaptureController::new(Arc::clone(devices) as Arc<dyn MediaDevices>, TICK)
}

/// WHAT: A shared application window is refused and its stream stopped
/// WHY: Window shares would hide everything outside the test tab
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_window_share_when_acquiring_display_then_unsupported_surface_and_stream_stopped() {
    // Given: The picker returns a window instead of a monitor
    let devices = FakeMediaDevices::new();
    devices.set_display(Grant::Allow(DisplaySurface::Window));

    // When: Acquiring display capture
    let result = controller(&devices).acquire_display_capture().await;

    // Then: Rejected, and the granted stream is not left running
    assert!(matches!(result, Err(ProctorError::UnsupportedSurface { .. })));
    assert!(devices.last_display().unwrap().is_stopped());
}

/// WHAT: A dismissed prompt surfaces as a recoverable PermissionDenied
/// WHY: The candidate must be able to retry
#[tokio::test]
async fn given_denied_prompt_when_acquiring_microphone_then_permission_denied_is_recoverable() {
    let devices = FakeMediaDevices::new();
    devices.set_microphone(Grant::Deny);

    let result = controller(&devices).acquire_microphone().await;

    assert!(matches!(result, Err(ProctorError::PermissionDenied { .. })));
    assert!(result.err().is_some_and(|e| e.is_recoverable()));
}

/// WHAT: Chunks are flushed on every interval while recording
/// WHY: Data loss on abrupt termination is bounded to one interval
#[tokio::test(start_paused = true)]
async fn given_recording_when_intervals_elapse_then_chunks_accumulate() {
    // Given: A started recorder
    let source = FakeSource::new(Modality::Display, Some(DisplaySurface::Monitor));
    let mut handle = CaptureHandle::new(Box::new(Arc::clone(&source)));
    let devices = FakeMediaDevices::new();
    let controller = controller(&devices);
    controller.start(&mut handle);

    // When: Data arrives mid-way through each of three intervals
    tokio::time::sleep(TICK / 2).await;
    for frame in [b"aa", b"bb", b"cc"] {
        source.feed(frame);
        tokio::time::sleep(TICK).await;
    }

    // Then: Each interval produced a chunk
    assert_eq!(handle.recorder_state(), RecorderState::Recording);
    assert_eq!(handle.buffered_chunks(), 3);
}

/// WHAT: Stop flushes data that has not reached a chunk boundary yet
/// WHY: The tail of a recording must not be lost at stop
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_unflushed_tail_when_stopping_then_artifact_includes_it() {
    // Given: A recorder with one flushed chunk and one pending tail
    let source = FakeSource::new(Modality::Display, Some(DisplaySurface::Monitor));
    let mut handle = CaptureHandle::new(Box::new(Arc::clone(&source)));
    let devices = FakeMediaDevices::new();
    let controller = controller(&devices);
    controller.start(&mut handle);
    source.feed(b"head-");
    tokio::time::sleep(TICK).await;
    source.feed(b"tail");

    // When: Stopping immediately
    let media = controller.stop(&mut handle).await.unwrap();

    // Then: Both parts are present in order and the stream is released
    assert_eq!(&media.bytes[..], b"head-tail");
    assert_eq!(media.content_type, "video/webm");
    assert!(handle.is_released());
    assert!(source.is_stopped());
}

/// WHAT: Stopping waits for the device's held-back tail before finalizing
/// WHY: The last chunk is produced only after the recorder is told to stop
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_device_holding_tail_when_stopping_then_tail_flushed_into_artifact() {
    // Given: A recording whose device keeps its last bytes until flushed
    let source = FakeSource::new(Modality::Display, Some(DisplaySurface::Monitor));
    let mut handle = CaptureHandle::new(Box::new(Arc::clone(&source)));
    let devices = FakeMediaDevices::new();
    let controller = controller(&devices);
    controller.start(&mut handle);
    source.feed(b"body-");
    source.hold_tail(b"final");

    // When: Stopping
    let media = controller.stop(&mut handle).await.unwrap();

    // Then: Flushed once, tail included, capture gated off before the flush
    assert_eq!(source.flushes(), 1);
    assert_eq!(&media.bytes[..], b"body-final");
    assert!(!source.is_capturing());
}

/// WHAT: A paused recorder is finalized without asking for a tail
/// WHY: Nothing recorded after the last pause belongs in the artifact
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_paused_recorder_when_stopping_then_no_flush() {
    let source = FakeSource::new(Modality::Microphone, None);
    let mut handle = CaptureHandle::new(Box::new(Arc::clone(&source)));
    let devices = FakeMediaDevices::new();
    let controller = controller(&devices);
    controller.start(&mut handle);
    source.feed(b"answer");
    controller.pause(&mut handle);
    source.hold_tail(b"noise");

    let media = controller.stop(&mut handle).await.unwrap();

    assert_eq!(source.flushes(), 0);
    assert_eq!(&media.bytes[..], b"answer");
}

/// WHAT: Pause/resume produce ordered, non-overlapping segments
/// WHY: Verbal answers are windows in one continuous recording
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_three_windows_when_stopping_then_segments_are_ordered_and_disjoint() {
    // Given: A microphone that starts paused, as in the verbal phase
    let source = FakeSource::with_header(Modality::Microphone, b"RIFF");
    let mut handle = CaptureHandle::new(Box::new(Arc::clone(&source)));
    let devices = FakeMediaDevices::new();
    let controller = controller(&devices);
    controller.start(&mut handle);
    controller.pause(&mut handle);

    // When: Three answers are recorded, with noise in between
    for answer in [&b"one"[..], &b"three"[..], &b"fifteen"[..]] {
        source.feed(b"noise");
        controller.resume(&mut handle);
        source.feed(answer);
        tokio::time::sleep(TICK * 2).await;
        controller.pause(&mut handle);
    }
    let media = controller.stop(&mut handle).await.unwrap();

    // Then: One artifact, three windows, header-adjusted and in order
    assert_eq!(&media.bytes[..], b"RIFFonethreefifteen");
    let spans: Vec<(usize, usize)> = media.segments.iter().map(|s| (s.start, s.end)).collect();
    assert_eq!(spans, vec![(4, 7), (7, 12), (12, 19)]);
    assert!(media.segments.windows(2).all(|w| w[0].end <= w[1].start));
    assert_eq!(media.segments.iter().map(|s| s.index).collect::<Vec<_>>(), vec![0, 1, 2]);
}

/// WHAT: Pause and resume in the wrong state are no-ops
/// WHY: Misordered UI events must not crash capture
#[test]
fn given_inactive_recorder_when_pausing_or_resuming_then_nothing_changes() {
    let source = FakeSource::new(Modality::Microphone, None);
    let mut handle = CaptureHandle::new(Box::new(Arc::clone(&source)));
    let devices = FakeMediaDevices::new();
    let controller = controller(&devices);

    controller.pause(&mut handle);
    controller.resume(&mut handle);

    assert_eq!(handle.recorder_state(), RecorderState::Inactive);
    assert!(!source.is_capturing());
}

/// WHAT: Stopping a recorder that never started reports NoMediaCaptured
/// WHY: Empty artifacts must not be uploaded, yet streams must still close
#[tokio::test]
async fn given_never_started_when_stopping_then_no_media_and_released() {
    let source = FakeSource::new(Modality::Display, Some(DisplaySurface::Monitor));
    let mut handle = CaptureHandle::new(Box::new(Arc::clone(&source)));
    let devices = FakeMediaDevices::new();

    let result = controller(&devices).stop(&mut handle).await;

    assert!(matches!(result, Err(ProctorError::NoMediaCaptured { .. })));
    assert!(source.is_stopped());
}

/// WHAT: Dropping a handle stops its tracks
/// WHY: No capture may outlive its owner
#[test]
fn given_live_handle_when_dropped_then_tracks_stopped() {
    let source = FakeSource::new(Modality::Display, Some(DisplaySurface::Monitor));
    let handle = CaptureHandle::new(Box::new(Arc::clone(&source)));
    assert!(handle.is_live());

    drop(handle);

    assert!(source.is_stopped());
}
