use crate::{
    ViolationEvent, ViolationKind,
    detect::{ArmContext, BrowserSignal, Detector, Disposition, ViolationSink, lock_slot},
};

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Prompt shown by the browser when the candidate tries to leave.
pub const LEAVE_WARNING: &str = "Are you sure you want to leave? Your test progress will be lost and you will be disqualified.";

/// Body of a page-teardown notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconPayload {
    /// Submission the violation belongs to.
    pub submission_id: String,
    /// Violation wire name.
    pub violation_type: String,
    /// Event metadata including its timestamp.
    pub metadata: Map<String, Value>,
}

/// Delivery that survives page teardown (`navigator.sendBeacon`).
///
/// Must return without waiting for the request to finish.
pub trait Beacon: Send + Sync {
    /// Queue `payload`; `false` if the platform refused to queue it.
    fn send(&self, payload: BeaconPayload) -> bool;
}

struct ArmedUnload {
    sink: ViolationSink,
}

/// Fires `page_refresh` on navigation away, and beacons it immediately.
pub struct UnloadDetector {
    submission_id: String,
    beacon: Arc<dyn Beacon>,
    armed: Arc<Mutex<Option<ArmedUnload>>>,
}

/// Synchronous view of an [`UnloadDetector`] for the signal gate.
#[derive(Clone)]
pub(crate) struct UnloadGate {
    submission_id: String,
    beacon: Arc<dyn Beacon>,
    armed: Arc<Mutex<Option<ArmedUnload>>>,
}

impl UnloadDetector {
    /// Detector that beacons on behalf of `submission_id`.
    pub fn new(submission_id: impl Into<String>, beacon: Arc<dyn Beacon>) -> Self {
        Self {
            submission_id: submission_id.into(),
            beacon,
            armed: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn gate(&self) -> UnloadGate {
        UnloadGate {
            submission_id: self.submission_id.clone(),
            beacon: Arc::clone(&self.beacon),
            armed: Arc::clone(&self.armed),
        }
    }
}

impl UnloadGate {
    pub(crate) fn screen(&self, signal: &BrowserSignal) -> Disposition {
        if !matches!(signal, BrowserSignal::BeforeUnload) {
            return Disposition::Allow;
        }
        let guard = lock_slot(&self.armed);
        let Some(armed) = guard.as_ref() else {
            return Disposition::Allow;
        };

        let event = ViolationEvent::new(ViolationKind::PageRefresh);
        // The page may be gone before the session's own report completes.
        let queued = self.beacon.send(BeaconPayload {
            submission_id: self.submission_id.clone(),
            violation_type: event.kind().as_str().to_string(),
            metadata: event.report_metadata(),
        });
        if queued {
            info!("Unload beacon queued");
        } else {
            warn!("Unload beacon refused by platform");
        }
        armed.sink.report(event);

        Disposition::ConfirmLeave {
            message: LEAVE_WARNING.to_string(),
        }
    }
}

impl Detector for UnloadDetector {
    fn name(&self) -> &'static str {
        "unload"
    }

    fn arm(&mut self, ctx: &ArmContext) {
        *lock_slot(&self.armed) = Some(ArmedUnload {
            sink: ctx.sink.clone(),
        });
    }

    fn disarm(&mut self) {
        *lock_slot(&self.armed) = None;
    }

    fn is_armed(&self) -> bool {
        lock_slot(&self.armed).is_some()
    }
}
