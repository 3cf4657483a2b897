use crate::{
    CoreResult, ProctorError, ViolationEvent, ViolationKind,
    detect::{ArmContext, Detector, ScreenGeometry},
};

use std::{panic::Location, time::Duration};

use error_location::ErrorLocation;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Time the candidate gets to fix window placement before the check runs.
pub const DEFAULT_MULTI_MONITOR_GRACE: Duration = Duration::from_secs(10);

/// Immediate geometry check run before proctoring is allowed to start.
///
/// # Errors
///
/// Returns `GeometryViolation` when the window spans more than one display.
#[track_caller]
pub fn precheck_geometry(geometry: &ScreenGeometry) -> CoreResult<()> {
    match geometry.spanning_reason() {
        Some(reason) => Err(ProctorError::GeometryViolation {
            reason: reason.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }),
        None => Ok(()),
    }
}

pub(crate) fn multiple_monitors_event(geometry: &ScreenGeometry, reason: &str) -> ViolationEvent {
    ViolationEvent::new(ViolationKind::MultipleMonitors)
        .with("reason", reason)
        .with("screenWidth", geometry.screen_width)
        .with("screenHeight", geometry.screen_height)
        .with("availWidth", geometry.avail_width)
        .with("availHeight", geometry.avail_height)
        .with(
            "windowPosition",
            json!({ "x": geometry.window_x, "y": geometry.window_y }),
        )
}

/// Samples geometry once the grace period elapses.
pub struct MultiMonitorDetector {
    grace: Duration,
    check: Option<JoinHandle<()>>,
    armed: bool,
}

impl MultiMonitorDetector {
    /// Detector with the given grace period.
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            check: None,
            armed: false,
        }
    }
}

impl Detector for MultiMonitorDetector {
    fn name(&self) -> &'static str {
        "multi_monitor"
    }

    fn arm(&mut self, ctx: &ArmContext) {
        if self.armed {
            return;
        }
        let grace = self.grace;
        let environment = ctx.environment.clone();
        let sink = ctx.sink.clone();
        self.check = Some(tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let geometry = environment.screen_geometry();
            match geometry.spanning_reason() {
                Some(reason) => {
                    warn!(reason, "Window spans multiple displays");
                    sink.report(multiple_monitors_event(&geometry, reason));
                }
                None => info!("Multi-monitor check passed"),
            }
        }));
        self.armed = true;
    }

    fn disarm(&mut self) {
        if let Some(check) = self.check.take() {
            check.abort();
        }
        self.armed = false;
    }

    fn is_armed(&self) -> bool {
        self.armed
    }
}
