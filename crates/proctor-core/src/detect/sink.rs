use crate::ViolationEvent;

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Where detectors deliver violations; drained in order by the session.
#[derive(Debug, Clone)]
pub struct ViolationSink {
    tx: mpsc::UnboundedSender<ViolationEvent>,
}

impl ViolationSink {
    /// Sink plus the receiving end the session drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ViolationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Report a violation. Never blocks.
    pub fn report(&self, event: ViolationEvent) {
        let kind = event.kind();
        if self.tx.send(event).is_err() {
            warn!(%kind, "Violation dropped, session no longer listening");
        } else {
            debug!(%kind, "Violation reported");
        }
    }
}
