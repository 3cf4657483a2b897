use crate::{CoreResult, Phase, ProctorError, sync::SyncBridge};

use std::panic::Location;

use error_location::ErrorLocation;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument};

struct PhaseUpdate {
    phase: Phase,
    reply: Option<oneshot::Sender<CoreResult<()>>>,
}

/// Queues backend phase updates for a single writer.
///
/// The backend overwrites the stored phase with whatever arrives last, so
/// updates are sent one at a time in queue order. An update that would
/// move the record backwards, or past a terminal phase, is skipped.
#[derive(Clone)]
pub struct PhaseRecorder {
    updates: mpsc::UnboundedSender<PhaseUpdate>,
}

impl PhaseRecorder {
    /// Recorder and its writer, which must be run for updates to go out.
    ///
    /// `from` is the phase the backend already holds.
    pub fn channel(sync: SyncBridge, from: Phase) -> (Self, PhaseWriter) {
        let (updates, queue) = mpsc::unbounded_channel();
        (
            Self { updates },
            PhaseWriter {
                sync,
                queue,
                last: from,
            },
        )
    }

    /// Queue `phase` and wait until it was sent or skipped.
    ///
    /// # Errors
    ///
    /// `ReportDeliveryFailure` from the backend, `ChannelClosed` when the
    /// writer is gone.
    pub async fn record(&self, phase: Phase) -> CoreResult<()> {
        let (reply, done) = oneshot::channel();
        self.enqueue(phase, Some(reply))?;
        done.await.map_err(|_| writer_gone())?
    }

    /// Queue `phase` without waiting; a failed delivery is only logged.
    pub fn record_detached(&self, phase: Phase) {
        if self.enqueue(phase, None).is_err() {
            debug!(%phase, "Phase writer gone, update dropped");
        }
    }

    #[track_caller]
    fn enqueue(&self, phase: Phase, reply: Option<oneshot::Sender<CoreResult<()>>>) -> CoreResult<()> {
        self.updates
            .send(PhaseUpdate { phase, reply })
            .map_err(|_| writer_gone())
    }
}

/// Sends queued phase updates in order. Runs until every recorder is dropped.
pub struct PhaseWriter {
    sync: SyncBridge,
    queue: mpsc::UnboundedReceiver<PhaseUpdate>,
    last: Phase,
}

impl PhaseWriter {
    /// Drain the queue.
    #[instrument(skip(self), fields(submission_id = %self.sync.submission_id()))]
    pub async fn run(mut self) {
        while let Some(update) = self.queue.recv().await {
            let result = if !self.last.is_terminal() && update.phase.is_after(self.last) {
                let sent = self.sync.record_phase(update.phase).await;
                self.last = update.phase;
                sent
            } else {
                debug!(last = %self.last, phase = %update.phase, "Stale phase update skipped");
                Ok(())
            };
            if let Some(reply) = update.reply {
                let _ = reply.send(result);
            }
        }
        info!(last = %self.last, "Phase writer stopped");
    }
}

#[track_caller]
fn writer_gone() -> ProctorError {
    ProctorError::ChannelClosed {
        message: String::from("phase writer"),
        location: ErrorLocation::from(Location::caller()),
    }
}
