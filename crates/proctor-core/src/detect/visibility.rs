use crate::{
    ViolationEvent, ViolationKind,
    detect::{ArmContext, BrowserSignal, Detector, listener::{Listener, SignalRule}},
};

/// Fires `tab_switch` whenever the document becomes hidden.
#[derive(Default)]
pub struct VisibilityDetector {
    listener: Listener,
    armed: bool,
}

pub(crate) struct VisibilityRule {
    count: u32,
}

impl VisibilityRule {
    pub(crate) fn new() -> Self {
        Self { count: 0 }
    }
}

impl SignalRule for VisibilityRule {
    fn observe(&mut self, signal: &BrowserSignal) -> Option<ViolationEvent> {
        match signal {
            BrowserSignal::VisibilityChanged { hidden: true } => {
                self.count += 1;
                Some(ViolationEvent::new(ViolationKind::TabSwitch).with("violationCount", self.count))
            }
            _ => None,
        }
    }
}

impl Detector for VisibilityDetector {
    fn name(&self) -> &'static str {
        "visibility"
    }

    fn arm(&mut self, ctx: &ArmContext) {
        if !self.armed {
            self.listener.attach(&ctx.bus, ctx.sink.clone(), VisibilityRule::new());
            self.armed = true;
        }
    }

    fn disarm(&mut self) {
        self.listener.detach();
        self.armed = false;
    }

    fn is_armed(&self) -> bool {
        self.armed
    }
}
