mod clipboard;
mod environment;
mod listener;
mod liveness;
mod monitors;
mod network;
mod shortcuts;
mod signal;
mod sink;
mod unload;
mod visibility;

pub use {
    clipboard::ClipboardMonitor,
    environment::{HostEnvironment, ScreenGeometry},
    liveness::{DisplayLivenessDetector, MAX_LIVENESS_POLL},
    monitors::{DEFAULT_MULTI_MONITOR_GRACE, MultiMonitorDetector, precheck_geometry},
    network::NetworkMonitor,
    shortcuts::{ShortcutInterceptor, is_copy_chord, is_devtools_chord},
    signal::{BrowserSignal, ClipboardAction, KeyChord, SignalBus},
    sink::ViolationSink,
    unload::{Beacon, BeaconPayload, LEAVE_WARNING, UnloadDetector},
    visibility::VisibilityDetector,
};

#[cfg(test)]
pub(crate) use {clipboard::ClipboardRule, listener::SignalRule, visibility::VisibilityRule};

use crate::{Phase, ProctorSettings, capture::MediaSource};

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{error, info};

/// Everything a detector may bind to while armed.
#[derive(Clone)]
pub struct ArmContext {
    /// Document and window signals.
    pub bus: SignalBus,
    /// Where violations go.
    pub sink: ViolationSink,
    /// Geometry and connectivity snapshots.
    pub environment: Arc<dyn HostEnvironment>,
    /// Display stream of the active capture, if any.
    pub display: Option<Arc<dyn MediaSource>>,
}

/// A violation source that can be switched on and off.
///
/// Detectors only report facts; consequences are decided by the session.
/// `disarm` must release every listener, timer and poll the detector owns.
pub trait Detector: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Start observing. Arming an armed detector is a no-op.
    fn arm(&mut self, ctx: &ArmContext);

    /// Stop observing and drop all subscriptions.
    fn disarm(&mut self);

    /// Whether the detector is currently observing.
    fn is_armed(&self) -> bool;
}

/// What the document should do with a screened signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum Disposition {
    /// Let the default action happen.
    Allow,
    /// `preventDefault()`.
    Suppress,
    /// Show the browser's leave confirmation.
    ConfirmLeave {
        /// Prompt text.
        message: String,
    },
}

/// Synchronous front door for browser signals.
///
/// Obstruction and the unload beacon have to answer before the event handler
/// returns, so they are decided here. Every signal is then published to the
/// bus for the listener-based detectors.
#[derive(Clone)]
pub struct SignalGate {
    bus: SignalBus,
    shortcuts: shortcuts::ShortcutGate,
    unload: unload::UnloadGate,
}

impl SignalGate {
    /// Screen `signal`, publish it, and return the disposition for the document.
    pub fn dispatch(&self, signal: BrowserSignal) -> Disposition {
        let disposition = match self.unload.screen(&signal) {
            Disposition::Allow => self.shortcuts.screen(&signal),
            leave => leave,
        };
        self.bus.publish(signal);
        disposition
    }

    /// Bus the gate publishes to.
    pub fn bus(&self) -> &SignalBus {
        &self.bus
    }
}

/// The full detector roster of a session.
pub struct DetectorSet {
    detectors: Vec<Box<dyn Detector>>,
    gate: SignalGate,
}

impl DetectorSet {
    /// Every detector, disarmed, publishing through `bus`.
    pub fn new(
        settings: &ProctorSettings,
        bus: SignalBus,
        submission_id: &str,
        beacon: Arc<dyn Beacon>,
    ) -> Self {
        let shortcuts = ShortcutInterceptor::new(settings.report_devtools);
        let unload = UnloadDetector::new(submission_id, beacon);
        let gate = SignalGate {
            bus,
            shortcuts: shortcuts.gate(),
            unload: unload.gate(),
        };

        let detectors: Vec<Box<dyn Detector>> = vec![
            Box::new(VisibilityDetector::default()),
            Box::new(unload),
            Box::new(DisplayLivenessDetector::new(settings.liveness_poll)),
            Box::new(MultiMonitorDetector::new(settings.multi_monitor_grace)),
            Box::new(shortcuts),
            Box::new(NetworkMonitor::default()),
            Box::new(ClipboardMonitor::new(settings.detect_copy)),
        ];

        Self { detectors, gate }
    }

    /// Gate for the host's signal handlers.
    pub fn gate(&self) -> SignalGate {
        self.gate.clone()
    }

    /// Arm everything in assessment phases, disarm everything otherwise.
    pub fn apply_phase(&mut self, phase: Phase, ctx: &ArmContext) {
        if phase.is_assessment() {
            for detector in &mut self.detectors {
                if !detector.is_armed() {
                    detector.arm(ctx);
                }
            }
        } else {
            self.disarm_all();
        }
        info!(%phase, armed = ?self.armed(), "Detectors applied");
    }

    /// Disarm every detector.
    pub fn disarm_all(&mut self) {
        for detector in &mut self.detectors {
            if detector.is_armed() {
                detector.disarm();
            }
        }
    }

    /// Names of the armed detectors.
    pub fn armed(&self) -> Vec<&'static str> {
        self.detectors
            .iter()
            .filter(|d| d.is_armed())
            .map(|d| d.name())
            .collect()
    }

    /// Whether any detector is armed.
    pub fn any_armed(&self) -> bool {
        self.detectors.iter().any(|d| d.is_armed())
    }
}

impl Drop for DetectorSet {
    fn drop(&mut self) {
        self.disarm_all();
    }
}

pub(crate) fn lock_slot<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(|e| {
        error!("Detector state lock poisoned, recovering: {}", e);
        e.into_inner()
    })
}
