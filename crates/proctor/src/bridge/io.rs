use crate::bridge::{Inbound, Outbound};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, error, info, trace, warn};

/// Capacity of the inbound queue between the stdin reader and the app.
pub(crate) const INBOUND_CAPACITY: usize = 256;

/// Sending half of the outbound message queue.
///
/// Cloned into every collaborator that talks to the browser. Sends never
/// block; once the writer is gone messages are dropped with a debug log.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Outbox {
    /// Outbox and the receiver the writer task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue `message` for the browser.
    pub fn send(&self, message: Outbound) {
        if let Err(e) = self.tx.send(message) {
            debug!(message = ?e.0, "Bridge writer gone, message dropped");
        }
    }
}

/// Decode one inbound line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<Result<Inbound, serde_json::Error>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_str(line))
}

/// Read JSON lines from `input` until EOF, forwarding decoded messages.
///
/// Malformed lines are logged and skipped.
pub fn spawn_reader<R>(input: R, tx: mpsc::Sender<Inbound>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(input).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_line(&line) {
                    Some(Ok(message)) => {
                        trace!(?message, "Inbound");
                        if tx.send(message).await.is_err() {
                            debug!("Inbound receiver dropped, reader stopping");
                            break;
                        }
                    }
                    Some(Err(e)) => warn!(error = %e, "Malformed bridge message skipped"),
                    None => {}
                },
                Ok(None) => {
                    info!("Bridge input closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Bridge input failed");
                    break;
                }
            }
        }
    })
}

/// Write queued messages to `output` as JSON lines until every [`Outbox`] is dropped.
pub fn spawn_writer<W>(output: W, mut rx: mpsc::UnboundedReceiver<Outbound>) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut output = output;
        while let Some(message) = rx.recv().await {
            let mut line = match serde_json::to_vec(&message) {
                Ok(line) => line,
                Err(e) => {
                    error!(error = %e, "Outbound message not serializable");
                    continue;
                }
            };
            line.push(b'\n');
            if let Err(e) = output.write_all(&line).await {
                error!(error = %e, "Bridge output failed");
                break;
            }
            if let Err(e) = output.flush().await {
                error!(error = %e, "Bridge output flush failed");
                break;
            }
        }
        debug!("Bridge writer stopped");
    })
}
