//! In-memory collaborators shared by the unit tests.

#![allow(clippy::unwrap_used)]

use crate::{
    ArmContext, ArtifactKind, Beacon, BeaconPayload, Collaborators, CoreResult, DisplaySurface,
    HostEnvironment, MediaDevices, MediaSource, Modality, Navigator, ObjectStorage, Phase,
    PhaseSubmission, ProctorError, ProctorHandle, ProctorSettings, ProctoringSession,
    ScreenGeometry, SessionContext, SignalBus, SignalGate, SubmissionBackend, UploadRequest,
    ViolationEvent, ViolationSink,
};

use std::{
    panic::Location,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use error_location::ErrorLocation;
use tokio::sync::{mpsc, watch};

pub(crate) const SUBMISSION_ID: &str = "sub-42";

/// Let spawned tasks run to their next suspension point.
pub(crate) async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

#[track_caller]
pub(crate) fn transient(reason: &str) -> ProctorError {
    ProctorError::DeviceError {
        reason: reason.to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}

#[derive(Debug, Default)]
struct SourceState {
    capturing: bool,
    pending: Vec<u8>,
    stopped: bool,
    dead: bool,
    tail: Vec<u8>,
    flushes: u32,
}

/// Scriptable device stream.
pub(crate) struct FakeSource {
    modality: Modality,
    surface: Option<DisplaySurface>,
    header: Vec<u8>,
    state: Mutex<SourceState>,
    ended: watch::Sender<bool>,
}

impl FakeSource {
    pub(crate) fn new(modality: Modality, surface: Option<DisplaySurface>) -> Arc<Self> {
        let (ended, _) = watch::channel(false);
        Arc::new(Self {
            modality,
            surface,
            header: Vec::new(),
            state: Mutex::new(SourceState::default()),
            ended,
        })
    }

    pub(crate) fn with_header(modality: Modality, header: &[u8]) -> Arc<Self> {
        let (ended, _) = watch::channel(false);
        Arc::new(Self {
            modality,
            surface: None,
            header: header.to_vec(),
            state: Mutex::new(SourceState::default()),
            ended,
        })
    }

    /// Device produces `bytes`; discarded unless capturing.
    pub(crate) fn feed(&self, bytes: &[u8]) {
        let mut state = self.state.lock().unwrap();
        if state.capturing && !state.stopped {
            state.pending.extend_from_slice(bytes);
        }
    }

    /// The user revoked the share.
    pub(crate) fn end_track(&self) {
        self.state.lock().unwrap().dead = true;
        self.ended.send_replace(true);
    }

    /// Stream goes inactive without a track-ended event.
    pub(crate) fn go_inactive(&self) {
        self.state.lock().unwrap().dead = true;
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.state.lock().unwrap().stopped
    }

    pub(crate) fn is_capturing(&self) -> bool {
        self.state.lock().unwrap().capturing
    }

    /// Bytes the device still holds and only hands over when flushed.
    pub(crate) fn hold_tail(&self, bytes: &[u8]) {
        self.state.lock().unwrap().tail = bytes.to_vec();
    }

    pub(crate) fn flushes(&self) -> u32 {
        self.state.lock().unwrap().flushes
    }
}

#[async_trait]
impl MediaSource for Arc<FakeSource> {
    fn modality(&self) -> Modality {
        self.modality
    }

    fn display_surface(&self) -> Option<DisplaySurface> {
        self.surface
    }

    fn content_type(&self) -> String {
        match self.modality {
            Modality::Display => String::from("video/webm"),
            Modality::Microphone => String::from("audio/webm"),
        }
    }

    fn is_live(&self) -> bool {
        let state = self.state.lock().unwrap();
        !state.stopped && !state.dead
    }

    fn ended(&self) -> watch::Receiver<bool> {
        self.ended.subscribe()
    }

    fn set_capturing(&self, capturing: bool) {
        self.state.lock().unwrap().capturing = capturing;
    }

    fn drain(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.lock().unwrap().pending)
    }

    fn finalize(&self, payload: Vec<u8>) -> Vec<u8> {
        let mut out = self.header.clone();
        out.extend(payload);
        out
    }

    async fn flush(&self) {
        let mut state = self.state.lock().unwrap();
        state.flushes += 1;
        if !state.stopped {
            let tail = std::mem::take(&mut state.tail);
            state.pending.extend(tail);
        }
    }

    fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.stopped = true;
        state.capturing = false;
    }
}

/// How a capture prompt is answered.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Grant {
    Allow(DisplaySurface),
    Deny,
    Hang,
}

pub(crate) struct FakeMediaDevices {
    display_grant: Mutex<Grant>,
    mic_grant: Mutex<Grant>,
    displays: Mutex<Vec<Arc<FakeSource>>>,
    microphones: Mutex<Vec<Arc<FakeSource>>>,
}

impl FakeMediaDevices {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            display_grant: Mutex::new(Grant::Allow(DisplaySurface::Monitor)),
            mic_grant: Mutex::new(Grant::Allow(DisplaySurface::Monitor)),
            displays: Mutex::new(Vec::new()),
            microphones: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn set_display(&self, grant: Grant) {
        *self.display_grant.lock().unwrap() = grant;
    }

    pub(crate) fn set_microphone(&self, grant: Grant) {
        *self.mic_grant.lock().unwrap() = grant;
    }

    pub(crate) fn last_display(&self) -> Option<Arc<FakeSource>> {
        self.displays.lock().unwrap().last().cloned()
    }

    pub(crate) fn last_microphone(&self) -> Option<Arc<FakeSource>> {
        self.microphones.lock().unwrap().last().cloned()
    }

    pub(crate) fn display_requests(&self) -> usize {
        self.displays.lock().unwrap().len()
    }

    async fn answer(&self, modality: Modality, grant: Grant) -> CoreResult<Box<dyn MediaSource>> {
        match grant {
            Grant::Allow(surface) => {
                let source = match modality {
                    Modality::Display => FakeSource::new(modality, Some(surface)),
                    Modality::Microphone => FakeSource::new(modality, None),
                };
                let list = match modality {
                    Modality::Display => &self.displays,
                    Modality::Microphone => &self.microphones,
                };
                list.lock().unwrap().push(Arc::clone(&source));
                Ok(Box::new(source))
            }
            Grant::Deny => Err(ProctorError::PermissionDenied {
                modality,
                reason: String::from("NotAllowedError"),
                location: ErrorLocation::from(Location::caller()),
            }),
            Grant::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl MediaDevices for FakeMediaDevices {
    async fn request_display(&self) -> CoreResult<Box<dyn MediaSource>> {
        let grant = *self.display_grant.lock().unwrap();
        self.answer(Modality::Display, grant).await
    }

    async fn request_microphone(&self) -> CoreResult<Box<dyn MediaSource>> {
        let grant = *self.mic_grant.lock().unwrap();
        self.answer(Modality::Microphone, grant).await
    }
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub(crate) phases: Mutex<Vec<Phase>>,
    pub(crate) violations: Mutex<Vec<ViolationEvent>>,
    pub(crate) artifacts: Mutex<Vec<(ArtifactKind, String)>>,
    pub(crate) responses: Mutex<Vec<PhaseSubmission>>,
    pub(crate) fail_reports: AtomicBool,
    /// Hold `update_phase` for this phase open for the given time.
    pub(crate) slow_phase: Mutex<Option<(Phase, Duration)>>,
    /// Hold every `submit_responses` open for the given time.
    pub(crate) slow_responses: Mutex<Option<Duration>>,
}

impl FakeBackend {
    pub(crate) fn slow_phase(&self, phase: Phase, delay: Duration) {
        *self.slow_phase.lock().unwrap() = Some((phase, delay));
    }

    pub(crate) fn slow_responses(&self, delay: Duration) {
        *self.slow_responses.lock().unwrap() = Some(delay);
    }

    pub(crate) fn phases(&self) -> Vec<Phase> {
        self.phases.lock().unwrap().clone()
    }

    pub(crate) fn violation_kinds(&self) -> Vec<crate::ViolationKind> {
        self.violations.lock().unwrap().iter().map(|e| e.kind()).collect()
    }

    pub(crate) fn artifacts(&self) -> Vec<(ArtifactKind, String)> {
        self.artifacts.lock().unwrap().clone()
    }

    pub(crate) fn responses(&self) -> Vec<PhaseSubmission> {
        self.responses.lock().unwrap().clone()
    }

    fn check(&self) -> CoreResult<()> {
        if self.fail_reports.load(Ordering::SeqCst) {
            return Err(transient("backend unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl SubmissionBackend for FakeBackend {
    async fn update_phase(&self, _submission_id: &str, phase: Phase) -> CoreResult<()> {
        let slow = *self.slow_phase.lock().unwrap();
        if let Some((_, delay)) = slow.filter(|(slow, _)| *slow == phase) {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        self.phases.lock().unwrap().push(phase);
        Ok(())
    }

    async fn report_violation(&self, _submission_id: &str, event: &ViolationEvent) -> CoreResult<()> {
        self.check()?;
        self.violations.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn record_artifact_url(&self, _submission_id: &str, kind: ArtifactKind, url: &str) -> CoreResult<()> {
        self.check()?;
        self.artifacts.lock().unwrap().push((kind, url.to_string()));
        Ok(())
    }

    async fn submit_responses(&self, _submission_id: &str, submission: &PhaseSubmission) -> CoreResult<()> {
        let delay = *self.slow_responses.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        self.responses.lock().unwrap().push(submission.clone());
        Ok(())
    }
}

/// Storage that fails a set number of times before accepting uploads.
#[derive(Default)]
pub(crate) struct FlakyStorage {
    failures_left: AtomicU32,
    attempts: AtomicU32,
    stored: Mutex<Vec<UploadRequest>>,
    seen: Mutex<Vec<Vec<u8>>>,
}

impl FlakyStorage {
    pub(crate) fn failing(times: u32) -> Arc<Self> {
        let storage = Self::default();
        storage.failures_left.store(times, Ordering::SeqCst);
        Arc::new(storage)
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn stored(&self) -> Vec<UploadRequest> {
        self.stored.lock().unwrap().clone()
    }

    /// Bytes presented on every attempt, failed or not.
    pub(crate) fn seen(&self) -> Vec<Vec<u8>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorage for FlakyStorage {
    async fn upload(&self, request: &UploadRequest) -> CoreResult<String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.bytes.to_vec());
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(transient("503 Service Unavailable"));
        }
        self.stored.lock().unwrap().push(request.clone());
        Ok(format!("https://storage.test/{}/{}", request.folder, request.file_name))
    }
}

pub(crate) struct FakeEnvironment {
    geometry: Mutex<ScreenGeometry>,
    online: AtomicBool,
}

impl FakeEnvironment {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            geometry: Mutex::new(ScreenGeometry::single(1920.0, 1080.0)),
            online: AtomicBool::new(true),
        })
    }

    pub(crate) fn set_geometry(&self, geometry: ScreenGeometry) {
        *self.geometry.lock().unwrap() = geometry;
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl HostEnvironment for FakeEnvironment {
    fn screen_geometry(&self) -> ScreenGeometry {
        *self.geometry.lock().unwrap()
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Geometry of a window dragged halfway onto a second display.
pub(crate) fn spanning_geometry() -> ScreenGeometry {
    ScreenGeometry {
        window_x: 1200.0,
        ..ScreenGeometry::single(1920.0, 1080.0)
    }
}

#[derive(Default)]
pub(crate) struct FakeBeacon {
    pub(crate) sent: Mutex<Vec<BeaconPayload>>,
}

impl Beacon for FakeBeacon {
    fn send(&self, payload: BeaconPayload) -> bool {
        self.sent.lock().unwrap().push(payload);
        true
    }
}

#[derive(Default)]
pub(crate) struct RecordingNavigator {
    pub(crate) visits: Mutex<Vec<Phase>>,
}

impl RecordingNavigator {
    pub(crate) fn visits(&self) -> Vec<Phase> {
        self.visits.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, phase: Phase) {
        self.visits.lock().unwrap().push(phase);
    }
}

/// Arm context over a fresh sink, plus the sink's receiving end.
pub(crate) fn arm_context(
    bus: &SignalBus,
    environment: Arc<FakeEnvironment>,
    display: Option<Arc<FakeSource>>,
) -> (ArmContext, mpsc::UnboundedReceiver<ViolationEvent>) {
    let (sink, rx) = ViolationSink::channel();
    let ctx = ArmContext {
        bus: bus.clone(),
        sink,
        environment,
        display: display.map(|d| Arc::new(d) as Arc<dyn MediaSource>),
    };
    (ctx, rx)
}

/// Settings with short timers so tests stay readable in virtual time.
pub(crate) fn test_settings() -> ProctorSettings {
    ProctorSettings {
        chunk_interval: Duration::from_millis(100),
        ..ProctorSettings::default()
    }
}

/// A running session and every fake behind it.
pub(crate) struct Harness {
    pub(crate) handle: ProctorHandle,
    pub(crate) gate: SignalGate,
    pub(crate) devices: Arc<FakeMediaDevices>,
    pub(crate) backend: Arc<FakeBackend>,
    pub(crate) storage: Arc<FlakyStorage>,
    pub(crate) environment: Arc<FakeEnvironment>,
    pub(crate) beacon: Arc<FakeBeacon>,
    pub(crate) navigator: Arc<RecordingNavigator>,
}

impl Harness {
    pub(crate) fn spawn(phase: Phase) -> Self {
        Self::spawn_with(phase, test_settings(), FlakyStorage::failing(0))
    }

    pub(crate) fn spawn_with(phase: Phase, settings: ProctorSettings, storage: Arc<FlakyStorage>) -> Self {
        let devices = FakeMediaDevices::new();
        let backend = Arc::new(FakeBackend::default());
        let environment = FakeEnvironment::new();
        let beacon = Arc::new(FakeBeacon::default());
        let navigator = Arc::new(RecordingNavigator::default());

        let collaborators = Collaborators {
            devices: devices.clone(),
            environment: environment.clone(),
            backend: backend.clone(),
            storage: storage.clone(),
            beacon: beacon.clone(),
            navigator: navigator.clone(),
        };
        let context = SessionContext {
            submission_id: SUBMISSION_ID.to_string(),
            token: String::from("link-token"),
            resume_phase: phase,
        };
        let (session, handle, gate) = ProctoringSession::new(context, collaborators, settings);
        tokio::spawn(session.run());

        Self {
            handle,
            gate,
            devices,
            backend,
            storage,
            environment,
            beacon,
            navigator,
        }
    }
}
