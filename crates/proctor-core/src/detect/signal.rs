use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of the signal broadcast; slow listeners skip the oldest signals.
const SIGNAL_BUS_CAPACITY: usize = 256;

/// Key press as reported by the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChord {
    /// `KeyboardEvent.key` value.
    pub key: String,
    /// Control held.
    #[serde(default)]
    pub ctrl: bool,
    /// Shift held.
    #[serde(default)]
    pub shift: bool,
    /// Alt/Option held.
    #[serde(default)]
    pub alt: bool,
    /// Meta/Command held.
    #[serde(default)]
    pub meta: bool,
}

impl KeyChord {
    /// Chord for a bare key.
    pub fn plain(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    /// Chord with Control held.
    pub fn ctrl(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: true,
            ..Self::default()
        }
    }
}

/// Clipboard operation observed by the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipboardAction {
    /// `copy` event.
    Copy,
    /// `cut` event.
    Cut,
    /// `paste` event.
    Paste,
}

/// Document and window events the detectors listen to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum BrowserSignal {
    /// `visibilitychange`.
    VisibilityChanged {
        /// `document.hidden` after the change.
        hidden: bool,
    },
    /// `beforeunload`.
    BeforeUnload,
    /// `keydown`.
    KeyDown(KeyChord),
    /// `contextmenu`.
    ContextMenu,
    /// `copy`, `cut` or `paste`.
    Clipboard {
        /// Which clipboard event.
        action: ClipboardAction,
        /// Length of the clipboard text, when readable.
        #[serde(default)]
        data_length: usize,
    },
    /// `online`.
    Online,
    /// `offline`.
    Offline,
}

/// Fan-out of browser signals to every armed detector.
#[derive(Debug, Clone)]
pub struct SignalBus {
    tx: broadcast::Sender<BrowserSignal>,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBus {
    /// Empty bus.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SIGNAL_BUS_CAPACITY);
        Self { tx }
    }

    /// Deliver `signal` to every attached listener. Returns how many saw it.
    pub fn publish(&self, signal: BrowserSignal) -> usize {
        let delivered = self.tx.send(signal).unwrap_or(0);
        trace!(delivered, "Signal published");
        delivered
    }

    /// Attached listener count.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<BrowserSignal> {
        self.tx.subscribe()
    }
}
