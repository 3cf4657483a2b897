use crate::{
    ViolationEvent,
    detect::{BrowserSignal, SignalBus, ViolationSink},
};

use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::warn;

/// Pure per-arming detector logic: one signal in, at most one violation out.
pub(crate) trait SignalRule: Send + 'static {
    fn observe(&mut self, signal: &BrowserSignal) -> Option<ViolationEvent>;
}

/// Bus subscription that feeds a [`SignalRule`] until detached.
#[derive(Default)]
pub(crate) struct Listener {
    task: Option<JoinHandle<()>>,
}

impl Listener {
    /// Subscribe before spawning so signals published right after arming are seen.
    pub(crate) fn attach<R: SignalRule>(&mut self, bus: &SignalBus, sink: ViolationSink, mut rule: R) {
        self.detach();
        let mut rx = bus.subscribe();
        self.task = Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(signal) => {
                        if let Some(event) = rule.observe(&signal) {
                            sink.report(event);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Detector lagged behind signal bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
    }

    pub(crate) fn detach(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.detach();
    }
}
