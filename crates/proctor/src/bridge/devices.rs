use crate::{
    bridge::{Outbound, Outbox},
    microphone::MicrophoneSource,
};

use proctor_core::{CoreResult, DisplaySurface, MediaDevices, MediaSource, Modality, ProctorError};

use std::{
    panic::Location,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use error_location::ErrorLocation;
use tokio::{
    sync::{oneshot, watch},
    time,
};
use tracing::{debug, error, info, instrument, trace, warn};

/// How long a stopping recorder waits for the browser to hand over its tail.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(3);

/// The browser's answer to a display picker request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayAnswer {
    /// A stream was shared.
    Granted(Option<DisplaySurface>),
    /// The picker was dismissed or refused.
    Denied(String),
}

#[derive(Debug, Default)]
struct FeedState {
    capturing: bool,
    pending: Vec<u8>,
    dead: bool,
    stopped: bool,
    /// Set while the browser is handing over its buffered tail.
    flushing: Option<oneshot::Sender<()>>,
}

/// Recorder output forwarded from the browser for one display stream.
struct DisplayFeed {
    outbox: Outbox,
    state: Mutex<FeedState>,
    ended: watch::Sender<bool>,
}

impl DisplayFeed {
    fn new(outbox: Outbox) -> Self {
        let (ended, _) = watch::channel(false);
        Self {
            outbox,
            state: Mutex::new(FeedState::default()),
            ended,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        lock_state(&self.state)
    }
}

/// Display stream living in the browser, fed through the bridge.
pub struct BridgeDisplaySource {
    feed: Arc<DisplayFeed>,
    surface: Option<DisplaySurface>,
}

#[async_trait]
impl MediaSource for BridgeDisplaySource {
    fn modality(&self) -> Modality {
        Modality::Display
    }

    fn display_surface(&self) -> Option<DisplaySurface> {
        self.surface
    }

    fn content_type(&self) -> String {
        String::from("video/webm")
    }

    fn is_live(&self) -> bool {
        let state = self.feed.lock();
        !state.dead && !state.stopped
    }

    fn ended(&self) -> watch::Receiver<bool> {
        self.feed.ended.subscribe()
    }

    fn set_capturing(&self, capturing: bool) {
        let changed = {
            let mut state = self.feed.lock();
            let changed = state.capturing != capturing && !state.stopped;
            state.capturing = capturing && !state.stopped;
            changed
        };
        if changed {
            self.feed.outbox.send(Outbound::CaptureDisplay { capturing });
        }
    }

    fn drain(&self) -> Vec<u8> {
        std::mem::take(&mut self.feed.lock().pending)
    }

    async fn flush(&self) {
        let (done, flushed) = oneshot::channel();
        {
            let mut state = self.feed.lock();
            if state.stopped {
                return;
            }
            state.flushing = Some(done);
        }
        self.feed.outbox.send(Outbound::FlushDisplay);

        match time::timeout(FLUSH_TIMEOUT, flushed).await {
            Ok(Ok(())) => debug!("Display tail received"),
            Ok(Err(_)) => debug!("Display flush abandoned"),
            Err(_) => warn!(
                timeout_secs = FLUSH_TIMEOUT.as_secs(),
                "Display tail not confirmed, finalizing without it"
            ),
        }
        self.feed.lock().flushing = None;
    }

    fn stop(&self) {
        {
            let mut state = self.feed.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
            state.capturing = false;
            state.flushing = None;
        }
        self.feed.outbox.send(Outbound::StopDisplay);
        debug!("Display stream stopped");
    }
}

/// Capture prompts answered by the browser (display) and the host (microphone).
pub struct BridgeDevices {
    outbox: Outbox,
    microphone_device: Option<String>,
    pending: Mutex<Option<oneshot::Sender<DisplayAnswer>>>,
    current: Mutex<Option<Arc<DisplayFeed>>>,
}

impl BridgeDevices {
    /// Devices prompting through `outbox`; the microphone opens `microphone_device`
    /// or the default input.
    pub fn new(outbox: Outbox, microphone_device: Option<String>) -> Self {
        Self {
            outbox,
            microphone_device,
            pending: Mutex::new(None),
            current: Mutex::new(None),
        }
    }

    /// Resolve the outstanding display request.
    pub fn answer_display(&self, answer: DisplayAnswer) {
        match lock_state(&self.pending).take() {
            Some(reply) => {
                if reply.send(answer).is_err() {
                    warn!("Display request abandoned before the answer arrived");
                }
            }
            None => warn!(?answer, "Display answer without a pending request"),
        }
    }

    /// Append recorder output to the current display stream.
    pub fn push_chunk(&self, bytes: Vec<u8>) {
        let Some(feed) = lock_state(&self.current).clone() else {
            trace!(len = bytes.len(), "Chunk without a display stream dropped");
            return;
        };
        let mut state = feed.lock();
        // The tail requested by a flush arrives after capturing was turned off.
        if (state.capturing || state.flushing.is_some()) && !state.stopped {
            state.pending.extend_from_slice(&bytes);
        }
    }

    /// The browser handed over everything recorded before the flush request.
    pub fn display_flushed(&self) {
        let Some(feed) = lock_state(&self.current).clone() else {
            debug!("Flush acknowledged without a display stream");
            return;
        };
        let waiting = feed.lock().flushing.take();
        match waiting {
            Some(done) => {
                let _ = done.send(());
            }
            None => debug!("Flush acknowledged with none pending"),
        }
    }

    /// The browser reported the shared track ended.
    pub fn display_ended(&self) {
        if let Some(feed) = lock_state(&self.current).clone() {
            feed.lock().dead = true;
            feed.ended.send_replace(true);
            info!("Display track ended in the browser");
        }
    }
}

#[async_trait]
impl MediaDevices for BridgeDevices {
    #[instrument(skip(self))]
    async fn request_display(&self) -> CoreResult<Box<dyn MediaSource>> {
        let (reply, answer) = oneshot::channel();
        if lock_state(&self.pending).replace(reply).is_some() {
            debug!("Earlier display request superseded");
        }
        self.outbox.send(Outbound::RequestDisplay);

        match answer.await {
            Ok(DisplayAnswer::Granted(surface)) => {
                let feed = Arc::new(DisplayFeed::new(self.outbox.clone()));
                *lock_state(&self.current) = Some(Arc::clone(&feed));
                info!(?surface, "Display stream granted");
                Ok(Box::new(BridgeDisplaySource { feed, surface }))
            }
            Ok(DisplayAnswer::Denied(reason)) => Err(ProctorError::PermissionDenied {
                modality: Modality::Display,
                reason,
                location: ErrorLocation::from(Location::caller()),
            }),
            Err(_) => Err(ProctorError::ChannelClosed {
                message: String::from("display request dropped"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    #[instrument(skip(self))]
    async fn request_microphone(&self) -> CoreResult<Box<dyn MediaSource>> {
        let device = self.microphone_device.clone();
        let source = tokio::task::spawn_blocking(move || MicrophoneSource::open(device))
            .await
            .map_err(|e| ProctorError::DeviceError {
                reason: format!("Microphone task failed: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })??;
        Ok(Box::new(source))
    }
}

fn lock_state<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(|e| {
        error!("Bridge state lock poisoned, recovering: {}", e);
        e.into_inner()
    })
}
