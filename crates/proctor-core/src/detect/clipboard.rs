use crate::{
    ViolationEvent, ViolationKind,
    detect::{ArmContext, BrowserSignal, ClipboardAction, Detector, listener::{Listener, SignalRule}},
};

/// Fires `copy_paste_detected` on paste, and on copy when enabled.
pub struct ClipboardMonitor {
    detect_copy: bool,
    listener: Listener,
    armed: bool,
}

impl ClipboardMonitor {
    /// Monitor that also reports copies when `detect_copy` is set.
    pub fn new(detect_copy: bool) -> Self {
        Self {
            detect_copy,
            listener: Listener::default(),
            armed: false,
        }
    }
}

pub(crate) struct ClipboardRule {
    pub(crate) detect_copy: bool,
}

impl SignalRule for ClipboardRule {
    fn observe(&mut self, signal: &BrowserSignal) -> Option<ViolationEvent> {
        let BrowserSignal::Clipboard {
            action,
            data_length,
        } = signal
        else {
            return None;
        };
        match action {
            ClipboardAction::Paste => Some(
                ViolationEvent::new(ViolationKind::CopyPasteDetected)
                    .with("action", "paste")
                    .with("dataLength", *data_length),
            ),
            ClipboardAction::Copy if self.detect_copy => {
                Some(ViolationEvent::new(ViolationKind::CopyPasteDetected).with("action", "copy"))
            }
            _ => None,
        }
    }
}

impl Detector for ClipboardMonitor {
    fn name(&self) -> &'static str {
        "clipboard"
    }

    fn arm(&mut self, ctx: &ArmContext) {
        if !self.armed {
            let rule = ClipboardRule {
                detect_copy: self.detect_copy,
            };
            self.listener.attach(&ctx.bus, ctx.sink.clone(), rule);
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
