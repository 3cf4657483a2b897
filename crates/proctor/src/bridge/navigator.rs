use crate::bridge::{Outbound, Outbox};

use proctor_core::{Navigator, Phase};

use tracing::info;

/// Asks the browser to show a phase view.
pub struct BridgeNavigator {
    outbox: Outbox,
}

impl BridgeNavigator {
    /// Navigator writing to `outbox`.
    pub fn new(outbox: Outbox) -> Self {
        Self { outbox }
    }
}

impl Navigator for BridgeNavigator {
    fn navigate(&self, phase: Phase) {
        info!(%phase, "Navigating");
        self.outbox.send(Outbound::Navigate { phase });
    }
}
