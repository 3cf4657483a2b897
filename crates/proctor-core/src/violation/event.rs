use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Integrity violation categories reported by the detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Document became hidden.
    TabSwitch,
    /// Display capture ended or stopped producing frames.
    ScreenShareStopped,
    /// Navigation away or tab close was attempted.
    PageRefresh,
    /// Window extends beyond a single display.
    MultipleMonitors,
    /// A developer-tools shortcut or the context menu was used.
    DevtoolsDetected,
    /// Connectivity dropped.
    NetworkFailure,
    /// Clipboard paste (or copy, when enabled) was attempted.
    CopyPasteDetected,
}

impl ViolationKind {
    /// Wire name used by the violation endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationKind::TabSwitch => "tab_switch",
            ViolationKind::ScreenShareStopped => "screen_share_stopped",
            ViolationKind::PageRefresh => "page_refresh",
            ViolationKind::MultipleMonitors => "multiple_monitors",
            ViolationKind::DevtoolsDetected => "devtools_detected",
            ViolationKind::NetworkFailure => "network_failure",
            ViolationKind::CopyPasteDetected => "copy_paste_detected",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected violation.
///
/// Built once by a detector and never changed afterwards: the builder
/// methods consume the value, and there are no setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationEvent {
    kind: ViolationKind,
    timestamp: DateTime<Utc>,
    metadata: Map<String, Value>,
}

impl ViolationEvent {
    /// New event stamped with the current time.
    pub fn new(kind: ViolationKind) -> Self {
        Self::at(kind, Utc::now())
    }

    /// New event with an explicit timestamp.
    pub fn at(kind: ViolationKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            timestamp,
            metadata: Map::new(),
        }
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Violation category.
    pub fn kind(&self) -> ViolationKind {
        self.kind
    }

    /// When the detector observed it.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Free-form detector facts.
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Metadata merged with the RFC 3339 timestamp, as posted to the backend.
    pub fn report_metadata(&self) -> Map<String, Value> {
        let mut meta = self.metadata.clone();
        meta.insert(
            "timestamp".to_string(),
            Value::String(self.timestamp.to_rfc3339()),
        );
        meta
    }
}
