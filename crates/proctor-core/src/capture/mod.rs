mod controller;
mod device;
mod handle;

pub use {
    controller::{CaptureController, DEFAULT_CHUNK_INTERVAL},
    device::{DisplaySurface, MediaDevices, MediaSource, Modality},
    handle::{CaptureHandle, CapturedMedia, RecorderState, Segment},
};
