//! Host microphone capture for the verbal phase.

use proctor_core::{CoreResult, MediaSource, Modality, ProctorError};

use std::{
    collections::VecDeque,
    panic::Location,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
        mpsc as std_mpsc,
    },
};

use cpal::{
    Device, Host, Stream, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use error_location::ErrorLocation;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Maximum samples held between drains (5 minutes at 48kHz mono).
/// Prevents unbounded memory growth if the recorder stops draining.
pub(crate) const MAX_BUFFER_SAMPLES: usize = 48_000 * 60 * 5;

/// Size of the canonical PCM WAV header.
pub(crate) const WAV_HEADER_LEN: usize = 44;

struct Shared {
    capturing: AtomicBool,
    live: AtomicBool,
    samples: Mutex<VecDeque<f32>>,
    ended: watch::Sender<bool>,
}

impl Shared {
    fn new() -> Self {
        let (ended, _) = watch::channel(false);
        Self {
            capturing: AtomicBool::new(false),
            live: AtomicBool::new(true),
            samples: Mutex::new(VecDeque::new()),
            ended,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<f32>> {
        // A poisoned lock still guards valid sample data.
        self.samples.lock().unwrap_or_else(|e| {
            error!("Sample buffer lock poisoned, recovering: {}", e);
            e.into_inner()
        })
    }

    fn push(&self, data: &[f32]) {
        if !self.capturing.load(Ordering::Acquire) {
            return;
        }
        let mut buf = self.lock();
        buf.extend(data.iter().copied());
        while buf.len() > MAX_BUFFER_SAMPLES {
            buf.pop_front();
        }
    }

    fn kill(&self) {
        self.live.store(false, Ordering::Release);
        self.capturing.store(false, Ordering::Release);
        self.ended.send_replace(true);
    }
}

/// Default (or configured) input device streaming PCM into the recorder.
///
/// The cpal stream is not `Send`, so it lives on a dedicated thread that
/// exits when the source is stopped or dropped.
pub struct MicrophoneSource {
    shared: Arc<Shared>,
    stop_tx: Mutex<Option<std_mpsc::Sender<()>>>,
    sample_rate: u32,
    channels: u16,
}

impl MicrophoneSource {
    /// Open the input device and start its stream, gated off.
    ///
    /// Blocks until the device is running; call from a blocking context.
    #[track_caller]
    #[instrument]
    pub fn open(device_id: Option<String>) -> CoreResult<Self> {
        let location = Location::caller();
        let shared = Arc::new(Shared::new());
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = std_mpsc::channel();

        let thread_shared = Arc::clone(&shared);
        std::thread::Builder::new()
            .name(String::from("microphone"))
            .spawn(move || run_stream(device_id, thread_shared, ready_tx, stop_rx))
            .map_err(|e| ProctorError::DeviceError {
                reason: format!("Failed to spawn microphone thread: {}", e),
                location: ErrorLocation::from(location),
            })?;

        let (sample_rate, channels) = match ready_rx.recv() {
            Ok(Ok(format)) => format,
            Ok(Err(reason)) => {
                return Err(ProctorError::DeviceError {
                    reason,
                    location: ErrorLocation::from(location),
                });
            }
            Err(_) => {
                return Err(ProctorError::DeviceError {
                    reason: String::from("Microphone thread exited before the stream started"),
                    location: ErrorLocation::from(location),
                });
            }
        };

        info!(sample_rate, channels, "Microphone opened");

        Ok(Self {
            shared,
            stop_tx: Mutex::new(Some(stop_tx)),
            sample_rate,
            channels,
        })
    }
}

impl MediaSource for MicrophoneSource {
    fn modality(&self) -> Modality {
        Modality::Microphone
    }

    fn content_type(&self) -> String {
        String::from("audio/wav")
    }

    fn is_live(&self) -> bool {
        self.shared.live.load(Ordering::Acquire)
    }

    fn ended(&self) -> watch::Receiver<bool> {
        self.shared.ended.subscribe()
    }

    fn set_capturing(&self, capturing: bool) {
        self.shared.capturing.store(capturing, Ordering::Release);
    }

    fn drain(&self) -> Vec<u8> {
        let samples: Vec<f32> = self.shared.lock().drain(..).collect();
        pcm16(&samples)
    }

    fn finalize(&self, payload: Vec<u8>) -> Vec<u8> {
        let mut out = wav_header(payload.len() as u32, self.sample_rate, self.channels);
        out.extend(payload);
        out
    }

    fn stop(&self) {
        self.shared.capturing.store(false, Ordering::Release);
        self.shared.live.store(false, Ordering::Release);
        let stop = self
            .stop_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(stop) = stop {
            let _ = stop.send(());
            debug!("Microphone stop requested");
        }
    }
}

type Ready = std_mpsc::SyncSender<Result<(u32, u16), String>>;

fn run_stream(
    device_id: Option<String>,
    shared: Arc<Shared>,
    ready: Ready,
    stop: std_mpsc::Receiver<()>,
) {
    let stream = match build_stream(device_id.as_deref(), &shared) {
        Ok((stream, sample_rate, channels)) => {
            let _ = ready.send(Ok((sample_rate, channels)));
            stream
        }
        Err(reason) => {
            let _ = ready.send(Err(reason));
            return;
        }
    };

    // Returns on an explicit stop or when the source is dropped.
    let _ = stop.recv();
    drop(stream);
    info!("Microphone stream closed");
}

fn build_stream(device_id: Option<&str>, shared: &Arc<Shared>) -> Result<(Stream, u32, u16), String> {
    let host = cpal::default_host();
    let device = select_device(&host, device_id)?;

    let supported = device
        .default_input_config()
        .map_err(|e| format!("Failed to get config: {}", e))?;
    let sample_rate = supported.sample_rate();
    let channels = supported.channels();
    let config: StreamConfig = supported.into();

    let data_shared = Arc::clone(shared);
    let err_shared = Arc::clone(shared);
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| data_shared.push(data),
            move |err| {
                error!("Microphone stream error: {}", err);
                err_shared.kill();
            },
            None,
        )
        .map_err(|e| format!("Failed to build stream: {}", e))?;

    stream
        .play()
        .map_err(|e| format!("Failed to start stream: {}", e))?;

    Ok((stream, sample_rate, channels))
}

fn select_device(host: &Host, device_id: Option<&str>) -> Result<Device, String> {
    if let Some(wanted) = device_id {
        let devices = host
            .input_devices()
            .map_err(|e| format!("Failed to list input devices: {}", e))?;
        for device in devices {
            let matches = device.id().map(|id| id.to_string() == wanted).unwrap_or(false);
            if matches {
                return Ok(device);
            }
        }
        warn!(device = wanted, "Configured microphone not found, using default");
    }
    host.default_input_device()
        .ok_or_else(|| String::from("No microphone found"))
}

/// Little-endian signed 16-bit PCM.
pub(crate) fn pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|s| ((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).to_le_bytes())
        .collect()
}

/// RIFF/WAVE header for `data_len` bytes of 16-bit PCM.
pub(crate) fn wav_header(data_len: u32, sample_rate: u32, channels: u16) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let block_align = channels * bits_per_sample / 8;
    let byte_rate = sample_rate * u32::from(block_align);

    let mut header = Vec::with_capacity(WAV_HEADER_LEN);
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&36u32.saturating_add(data_len).to_le_bytes());
    header.extend_from_slice(b"WAVE");
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes());
    header.extend_from_slice(&1u16.to_le_bytes());
    header.extend_from_slice(&channels.to_le_bytes());
    header.extend_from_slice(&sample_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&bits_per_sample.to_le_bytes());
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_len.to_le_bytes());
    header
}
