use crate::bridge::{
    BridgeDevices, BridgeEnvironment, DisplayAnswer, Inbound, Outbound, Outbox, UiEvent,
};

use proctor_core::{BrowserSignal, SignalGate};

use std::sync::Arc;

use base64::Engine;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

/// Handles platform traffic in place and passes UI events on.
///
/// Capture prompts and recorder chunks must keep flowing while the app is
/// waiting on the session, so they never queue behind UI work.
pub struct Router {
    devices: Arc<BridgeDevices>,
    environment: Arc<BridgeEnvironment>,
    gate: SignalGate,
    outbox: Outbox,
}

impl Router {
    /// Router feeding `devices`, `environment` and `gate`.
    pub fn new(
        devices: Arc<BridgeDevices>,
        environment: Arc<BridgeEnvironment>,
        gate: SignalGate,
        outbox: Outbox,
    ) -> Self {
        Self {
            devices,
            environment,
            gate,
            outbox,
        }
    }

    /// Apply `message`; returns it when it belongs to the app.
    pub fn route(&self, message: Inbound) -> Option<UiEvent> {
        match message {
            Inbound::Session { submission_id, .. } => {
                warn!(%submission_id, "Session context repeated, ignored");
            }
            Inbound::Signal { seq, signal } => {
                match signal {
                    BrowserSignal::Online => self.environment.set_online(true),
                    BrowserSignal::Offline => self.environment.set_online(false),
                    _ => {}
                }
                let disposition = self.gate.dispatch(signal);
                self.outbox.send(Outbound::Disposition { seq, disposition });
            }
            Inbound::Geometry(geometry) => self.environment.update_geometry(geometry),
            Inbound::DisplayGranted { surface } => {
                self.devices.answer_display(DisplayAnswer::Granted(surface));
            }
            Inbound::DisplayDenied { reason } => {
                self.devices.answer_display(DisplayAnswer::Denied(reason));
            }
            Inbound::DisplayChunk { data } => {
                match base64::engine::general_purpose::STANDARD.decode(data.as_bytes()) {
                    Ok(bytes) => self.devices.push_chunk(bytes),
                    Err(e) => warn!(error = %e, "Undecodable display chunk dropped"),
                }
            }
            Inbound::DisplayFlushed => self.devices.display_flushed(),
            Inbound::DisplayEnded => self.devices.display_ended(),
            Inbound::Ui(event) => return Some(event),
        }
        None
    }
}

/// Drain `inbound` through `router`, forwarding UI events to `ui`.
pub fn spawn_router(
    router: Router,
    mut inbound: mpsc::Receiver<Inbound>,
    ui: mpsc::Sender<UiEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = inbound.recv().await {
            let Some(event) = router.route(message) else {
                continue;
            };
            if ui.send(event).await.is_err() {
                debug!("App gone, router stopping");
                break;
            }
        }
        info!("Router stopped");
    })
}
