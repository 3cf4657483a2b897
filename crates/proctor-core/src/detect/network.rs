use crate::{
    ViolationEvent, ViolationKind,
    detect::{ArmContext, BrowserSignal, Detector, listener::{Listener, SignalRule}},
};

use tracing::info;

/// Fires `network_failure` on each transition to offline.
#[derive(Default)]
pub struct NetworkMonitor {
    listener: Listener,
    armed: bool,
}

pub(crate) struct NetworkRule {
    offline: bool,
}

impl NetworkRule {
    pub(crate) fn new(offline: bool) -> Self {
        Self { offline }
    }
}

pub(crate) fn network_failure_event() -> ViolationEvent {
    ViolationEvent::new(ViolationKind::NetworkFailure).with("online", false)
}

impl SignalRule for NetworkRule {
    fn observe(&mut self, signal: &BrowserSignal) -> Option<ViolationEvent> {
        match signal {
            BrowserSignal::Offline if !self.offline => {
                self.offline = true;
                Some(network_failure_event())
            }
            BrowserSignal::Online if self.offline => {
                self.offline = false;
                info!("Connectivity restored");
                None
            }
            _ => None,
        }
    }
}

impl Detector for NetworkMonitor {
    fn name(&self) -> &'static str {
        "network"
    }

    fn arm(&mut self, ctx: &ArmContext) {
        if self.armed {
            return;
        }
        let offline = !ctx.environment.is_online();
        if offline {
            ctx.sink.report(network_failure_event());
        }
        self.listener.attach(&ctx.bus, ctx.sink.clone(), NetworkRule::new(offline));
        self.armed = true;
    }

    fn disarm(&mut self) {
        self.listener.detach();
        self.armed = false;
    }

    fn is_armed(&self) -> bool {
        self.armed
    }
}
