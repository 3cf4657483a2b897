use crate::{
    ViolationEvent, ViolationKind,
    capture::MediaSource,
    detect::{ArmContext, Detector},
};

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time};
use tracing::{debug, warn};

/// Upper bound on the display poll interval.
pub const MAX_LIVENESS_POLL: Duration = Duration::from_secs(2);

/// Watches the bound display capture for a dead stream or an ended track.
///
/// Reports at most once per arming: a lost screen share cannot come back.
pub struct DisplayLivenessDetector {
    poll: Duration,
    watch: Option<JoinHandle<()>>,
    armed: bool,
}

impl DisplayLivenessDetector {
    /// Detector polling every `poll`, capped at [`MAX_LIVENESS_POLL`].
    pub fn new(poll: Duration) -> Self {
        Self {
            poll: poll.min(MAX_LIVENESS_POLL),
            watch: None,
            armed: false,
        }
    }
}

impl Detector for DisplayLivenessDetector {
    fn name(&self) -> &'static str {
        "display_liveness"
    }

    fn arm(&mut self, ctx: &ArmContext) {
        if self.armed {
            return;
        }
        let Some(display) = ctx.display.clone() else {
            debug!("No display capture bound, liveness detector idle");
            self.armed = true;
            return;
        };
        let sink = ctx.sink.clone();
        let poll = self.poll;
        self.watch = Some(tokio::spawn(async move {
            if let Some(event) = watch_display(display, poll).await {
                sink.report(event);
            }
        }));
        self.armed = true;
    }

    fn disarm(&mut self) {
        if let Some(watch) = self.watch.take() {
            watch.abort();
        }
        self.armed = false;
    }

    fn is_armed(&self) -> bool {
        self.armed
    }
}

async fn watch_display(display: Arc<dyn MediaSource>, poll: Duration) -> Option<ViolationEvent> {
    let mut ended = display.ended();
    if *ended.borrow() || !display.is_live() {
        warn!("Display capture already inactive");
        return Some(stopped_event("inactive"));
    }

    let mut ticker = time::interval_at(time::Instant::now() + poll, poll);
    loop {
        tokio::select! {
            changed = ended.changed() => {
                // A dropped sender means the source is gone, which is also an end.
                if changed.is_err() || *ended.borrow() {
                    warn!("Display track ended");
                    return Some(stopped_event("track_ended"));
                }
            }
            _ = ticker.tick() => {
                if !display.is_live() {
                    warn!("Display capture no longer live");
                    return Some(stopped_event("inactive"));
                }
            }
        }
    }
}

fn stopped_event(reason: &str) -> ViolationEvent {
    ViolationEvent::new(ViolationKind::ScreenShareStopped).with("reason", reason)
}
