use crate::{
    ViolationEvent, ViolationKind,
    detect::{ArmContext, BrowserSignal, Detector, Disposition, KeyChord, ViolationSink, lock_slot},
};

use std::sync::{Arc, Mutex};

use tracing::debug;

/// Developer-tools and copy shortcut obstruction.
///
/// Best-effort only: a determined candidate can open tools from the
/// browser menu. Matching chords and the context menu are suppressed while
/// armed, and optionally reported as `devtools_detected`.
pub struct ShortcutInterceptor {
    report_devtools: bool,
    armed: Arc<Mutex<Option<ViolationSink>>>,
}

/// Synchronous view of a [`ShortcutInterceptor`] for the signal gate.
#[derive(Clone)]
pub(crate) struct ShortcutGate {
    report_devtools: bool,
    armed: Arc<Mutex<Option<ViolationSink>>>,
}

impl ShortcutInterceptor {
    /// Interceptor that reports devtools attempts when `report_devtools` is set.
    pub fn new(report_devtools: bool) -> Self {
        Self {
            report_devtools,
            armed: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn gate(&self) -> ShortcutGate {
        ShortcutGate {
            report_devtools: self.report_devtools,
            armed: Arc::clone(&self.armed),
        }
    }
}

/// F12, Ctrl+Shift+I/J/C, Ctrl+U and Cmd+Option+I/J/C.
pub fn is_devtools_chord(chord: &KeyChord) -> bool {
    let key = chord.key.to_ascii_lowercase();
    match key.as_str() {
        "f12" => true,
        "i" | "j" | "c" if chord.ctrl && chord.shift => true,
        "i" | "j" | "c" if chord.meta && chord.alt => true,
        "u" if chord.ctrl || chord.meta => true,
        _ => false,
    }
}

/// PrintScreen and Ctrl/Cmd + C, V, X.
pub fn is_copy_chord(chord: &KeyChord) -> bool {
    if chord.key == "PrintScreen" {
        return true;
    }
    let key = chord.key.to_ascii_lowercase();
    (chord.ctrl || chord.meta) && !chord.shift && matches!(key.as_str(), "c" | "v" | "x")
}

impl ShortcutGate {
    pub(crate) fn screen(&self, signal: &BrowserSignal) -> Disposition {
        let guard = lock_slot(&self.armed);
        let Some(sink) = guard.as_ref() else {
            return Disposition::Allow;
        };
        match signal {
            BrowserSignal::KeyDown(chord) if is_devtools_chord(chord) => {
                debug!(key = %chord.key, "Developer tools shortcut suppressed");
                if self.report_devtools {
                    sink.report(
                        ViolationEvent::new(ViolationKind::DevtoolsDetected)
                            .with("trigger", "shortcut")
                            .with("key", chord.key.as_str()),
                    );
                }
                Disposition::Suppress
            }
            BrowserSignal::KeyDown(chord) if is_copy_chord(chord) => Disposition::Suppress,
            BrowserSignal::ContextMenu => {
                if self.report_devtools {
                    sink.report(
                        ViolationEvent::new(ViolationKind::DevtoolsDetected)
                            .with("trigger", "context_menu"),
                    );
                }
                Disposition::Suppress
            }
            BrowserSignal::Clipboard { .. } => Disposition::Suppress,
            _ => Disposition::Allow,
        }
    }
}

impl Detector for ShortcutInterceptor {
    fn name(&self) -> &'static str {
        "shortcuts"
    }

    fn arm(&mut self, ctx: &ArmContext) {
        *lock_slot(&self.armed) = Some(ctx.sink.clone());
    }

    fn disarm(&mut self) {
        *lock_slot(&self.armed) = None;
    }

    fn is_armed(&self) -> bool {
        lock_slot(&self.armed).is_some()
    }
}
