use crate::capture::{MediaSource, Modality};

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::{task::JoinHandle, time};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Maximum buffered bytes per handle (about 2 hours of 500 kbit/s video).
/// Once reached, further chunks are dropped and the loss is logged.
const MAX_BUFFERED_BYTES: usize = 512 * 1024 * 1024;

/// Recording device lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Not started, or finalized.
    Inactive,
    /// Appending chunks.
    Recording,
    /// Started but not appending.
    Paused,
}

/// One contiguous recording window (start/resume until pause/stop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Zero-based order of the window.
    pub index: usize,
    /// Byte offset into the artifact where the window begins.
    pub start: usize,
    /// Byte offset one past the window's last byte.
    pub end: usize,
}

impl Segment {
    /// Bytes captured in this window.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the window captured nothing.
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Chunk {
    pub(crate) bytes: Vec<u8>,
}

/// Finalized recording returned by [`CaptureController::stop`](crate::CaptureController::stop).
#[derive(Debug, Clone)]
pub struct CapturedMedia {
    /// Capture modality.
    pub modality: Modality,
    /// Container bytes, shared so retries upload the same buffer.
    pub bytes: Arc<[u8]>,
    /// Content type reported by the source.
    pub content_type: String,
    /// Recording windows in capture order.
    pub segments: Vec<Segment>,
    /// Number of chunks flushed during capture.
    pub chunk_count: usize,
}

impl CapturedMedia {
    /// Artifact size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the artifact holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug)]
pub(crate) struct Recorder {
    pub(crate) state: RecorderState,
    pub(crate) chunks: Vec<Chunk>,
    buffered: usize,
    open_segment: Option<usize>,
    segments: Vec<Segment>,
}

impl Recorder {
    fn new() -> Self {
        Self {
            state: RecorderState::Inactive,
            chunks: Vec::new(),
            buffered: 0,
            open_segment: None,
            segments: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        if self.buffered + bytes.len() > MAX_BUFFERED_BYTES {
            error!(
                dropped = bytes.len(),
                buffered = self.buffered,
                "Capture buffer full, dropping chunk"
            );
            return;
        }
        self.buffered += bytes.len();
        self.chunks.push(Chunk { bytes });
    }

    fn open_segment(&mut self) {
        if self.open_segment.is_none() {
            self.open_segment = Some(self.buffered);
        }
    }

    /// Windows that captured nothing are dropped.
    fn close_segment(&mut self) {
        match self.open_segment.take() {
            Some(start) if start < self.buffered => self.segments.push(Segment {
                index: self.segments.len(),
                start,
                end: self.buffered,
            }),
            _ => {}
        }
    }
}

/// Live binding between device streams and their recorder.
///
/// Owned exclusively by the proctoring session. Dropping the handle stops
/// every track and the chunk timer.
pub struct CaptureHandle {
    id: Uuid,
    modality: Modality,
    streams: Vec<Arc<dyn MediaSource>>,
    recorder: Arc<Mutex<Recorder>>,
    ticker: Option<JoinHandle<()>>,
    released: bool,
}

impl CaptureHandle {
    pub(crate) fn new(source: Box<dyn MediaSource>) -> Self {
        let modality = source.modality();
        Self {
            id: Uuid::new_v4(),
            modality,
            streams: vec![Arc::from(source)],
            recorder: Arc::new(Mutex::new(Recorder::new())),
            ticker: None,
            released: false,
        }
    }

    /// Handle identifier for log correlation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Modality of the primary stream.
    pub fn modality(&self) -> Modality {
        self.modality
    }

    /// Current recorder state.
    pub fn recorder_state(&self) -> RecorderState {
        self.lock().state
    }

    /// Chunks buffered so far.
    pub fn buffered_chunks(&self) -> usize {
        self.lock().chunks.len()
    }

    /// Whether every stream is still live.
    pub fn is_live(&self) -> bool {
        !self.released && self.streams.iter().all(|s| s.is_live())
    }

    /// Whether tracks have been stopped.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Read-only view of the primary stream for liveness monitoring.
    pub(crate) fn probe(&self) -> Option<Arc<dyn MediaSource>> {
        self.streams.first().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Recorder> {
        lock_recorder(&self.recorder)
    }

    pub(crate) fn begin(&mut self, chunk_interval: Duration) -> bool {
        {
            let mut rec = self.lock();
            if rec.state != RecorderState::Inactive || self.released {
                return false;
            }
            rec.state = RecorderState::Recording;
            rec.open_segment();
        }
        for stream in &self.streams {
            stream.set_capturing(true);
        }
        self.ticker = Some(spawn_ticker(
            Arc::clone(&self.recorder),
            self.streams.clone(),
            chunk_interval,
        ));
        info!(handle = %self.id, modality = %self.modality, "Recorder started");
        true
    }

    pub(crate) fn pause(&mut self) -> bool {
        if self.lock().state != RecorderState::Recording {
            return false;
        }
        // Gate first so everything produced up to this instant is drained.
        for stream in &self.streams {
            stream.set_capturing(false);
        }
        let mut rec = self.lock();
        flush_into(&mut rec, &self.streams);
        rec.close_segment();
        rec.state = RecorderState::Paused;
        debug!(handle = %self.id, chunks = rec.chunks.len(), "Recorder paused");
        true
    }

    pub(crate) fn resume(&mut self) -> bool {
        {
            let mut rec = self.lock();
            if rec.state != RecorderState::Paused {
                return false;
            }
            // Data produced while paused must not leak into the new window.
            for stream in &self.streams {
                let _ = stream.drain();
            }
            rec.open_segment();
            rec.state = RecorderState::Recording;
        }
        for stream in &self.streams {
            stream.set_capturing(true);
        }
        debug!(handle = %self.id, "Recorder resumed");
        true
    }

    /// Gate every stream off and stop the chunk timer; buffered data stays.
    pub(crate) fn halt(&mut self) {
        for stream in &self.streams {
            stream.set_capturing(false);
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    /// Let each stream deliver its tail. Only a recording handle waits.
    pub(crate) async fn flush_streams(&self) {
        if self.released || self.recorder_state() != RecorderState::Recording {
            return;
        }
        for stream in &self.streams {
            stream.flush().await;
        }
    }

    /// Flush pending data, close the open window and take the buffered chunks.
    pub(crate) fn finish(&mut self) -> Option<(Vec<Chunk>, Vec<Segment>)> {
        if self.lock().state == RecorderState::Inactive {
            return None;
        }
        self.halt();
        let mut rec = self.lock();
        if rec.state == RecorderState::Recording {
            flush_into(&mut rec, &self.streams);
        }
        rec.close_segment();
        rec.state = RecorderState::Inactive;
        rec.buffered = 0;
        let chunks = std::mem::take(&mut rec.chunks);
        let segments = std::mem::take(&mut rec.segments);
        Some((chunks, segments))
    }

    pub(crate) fn finalize_payload(&self, payload: Vec<u8>) -> (Vec<u8>, String) {
        match self.streams.first() {
            Some(primary) => (primary.finalize(payload), primary.content_type()),
            None => (payload, String::from("application/octet-stream")),
        }
    }

    /// Stop the chunk timer and every track. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        for stream in &self.streams {
            stream.set_capturing(false);
            stream.stop();
        }
        self.lock().state = RecorderState::Inactive;
        self.released = true;
        info!(handle = %self.id, modality = %self.modality, "Capture released");
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.release();
    }
}

fn lock_recorder(recorder: &Mutex<Recorder>) -> MutexGuard<'_, Recorder> {
    // A poisoned lock still guards valid chunk data.
    recorder.lock().unwrap_or_else(|e| {
        error!("Recorder lock poisoned, recovering: {}", e);
        e.into_inner()
    })
}

fn flush_into(rec: &mut Recorder, streams: &[Arc<dyn MediaSource>]) {
    for stream in streams {
        rec.push(stream.drain());
    }
}

fn spawn_ticker(
    recorder: Arc<Mutex<Recorder>>,
    streams: Vec<Arc<dyn MediaSource>>,
    chunk_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + chunk_interval, chunk_interval);
        loop {
            ticker.tick().await;
            let mut rec = lock_recorder(&recorder);
            match rec.state {
                RecorderState::Recording => flush_into(&mut rec, &streams),
                RecorderState::Paused => {}
                RecorderState::Inactive => break,
            }
        }
    })
}
