use serde::{Deserialize, Serialize};

/// Microphone configuration for the verbal phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Selected input device id (None = default device).
    #[serde(default)]
    pub selected_device: Option<String>,
}
