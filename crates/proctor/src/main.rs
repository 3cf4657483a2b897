//! Proctor: anti-cheat host for timed candidate assessments.
//!
//! Talks line-delimited JSON with the candidate's browser over stdio and
//! reports phases, violations and recordings to the submission backend.

mod app;
mod bridge;
mod config;
mod error;
mod http;
mod microphone;
#[cfg(test)]
mod tests;

pub(crate) use {
    app::App,
    error::{AppError, Result as AppResult},
};

use crate::{
    bridge::{
        BridgeDevices, BridgeEnvironment, BridgeNavigator, INBOUND_CAPACITY, Inbound, Outbox,
        Router, spawn_reader, spawn_router, spawn_writer,
    },
    config::Config,
    http::{HttpBackend, HttpBeacon, HttpStorage},
};

use proctor_core::{Collaborators, Phase, ProctoringSession, SessionContext};

use std::{panic::Location, sync::Arc, time::Duration};

use error_location::ErrorLocation;
use tokio::{sync::mpsc, time};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Grace period for the session task and the writer after the app exits.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Environment variable selecting the log format.
const LOG_FORMAT_VAR: &str = "PROCTOR_LOG_FORMAT";

/// Application entry point.
fn main() {
    init_logging();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {:?}", e);
            std::process::exit(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {:?}", e);
            std::process::exit(1);
        }
    };

    let outcome = rt.block_on(run(config));

    // The stdin reader blocks in a read that never returns once the app is done.
    rt.shutdown_timeout(Duration::from_secs(1));

    if let Err(e) = outcome {
        error!(error = ?e, "Proctor exited with error");
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout carries the bridge protocol.
///
/// `RUST_LOG` overrides the filter and `PROCTOR_LOG_FORMAT=json` switches to
/// one JSON object per event.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("proctor=debug,proctor_core=debug"));
    let json = std::env::var(LOG_FORMAT_VAR).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.init();
    }
}

/// Wire the bridge, the backend adapters and the session, then run the app.
async fn run(config: Config) -> AppResult<()> {
    let (outbox, outbound_rx) = Outbox::channel();
    let writer = spawn_writer(tokio::io::stdout(), outbound_rx);

    let (inbound_tx, mut inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
    let _reader = spawn_reader(tokio::io::stdin(), inbound_tx);

    let context = wait_for_session(&mut inbound_rx).await?;
    info!(
        submission_id = %context.submission_id,
        phase = %context.resume_phase,
        "Session context received"
    );

    let http = http::client(&config.backend)?;
    let origin = config.backend.origin().to_string();

    let devices = Arc::new(BridgeDevices::new(
        outbox.clone(),
        config.audio.selected_device.clone(),
    ));
    let environment = Arc::new(BridgeEnvironment::default());

    let collaborators = Collaborators {
        devices: devices.clone(),
        environment: environment.clone(),
        backend: Arc::new(HttpBackend::new(http.clone(), &origin, &context.token)),
        storage: Arc::new(HttpStorage::new(http, &origin, &context.submission_id)),
        beacon: Arc::new(HttpBeacon::new(
            &origin,
            &context.token,
            config.backend.request_timeout(),
        )),
        navigator: Arc::new(BridgeNavigator::new(outbox.clone())),
    };

    let (session, handle, gate) = ProctoringSession::new(context, collaborators, config.settings());
    let session_task = tokio::spawn(session.run());

    let (ui_tx, ui_rx) = mpsc::channel(INBOUND_CAPACITY);
    let router = Router::new(devices, environment, gate, outbox.clone());
    let router_task = spawn_router(router, inbound_rx, ui_tx);

    let result = App::new(handle, outbox, ui_rx, config.plan()).run().await;
    router_task.abort();

    match time::timeout(SHUTDOWN_GRACE, session_task).await {
        Ok(Ok(())) => info!("Session finished"),
        Ok(Err(e)) => error!(error = ?e, "Session task failed"),
        Err(_) => warn!("Session did not finish in time"),
    }

    // Every outbox clone is gone once the app, router and session are.
    if time::timeout(SHUTDOWN_GRACE, writer).await.is_err() {
        warn!("Bridge writer did not drain in time");
    }

    result
}

/// Wait for the browser's session message; anything before it is dropped.
async fn wait_for_session(inbound: &mut mpsc::Receiver<Inbound>) -> AppResult<SessionContext> {
    let location = Location::caller();
    while let Some(message) = inbound.recv().await {
        match message {
            Inbound::Session {
                submission_id,
                token,
                phase,
            } => {
                return Ok(SessionContext {
                    submission_id,
                    token,
                    resume_phase: phase.unwrap_or(Phase::Guidelines),
                });
            }
            other => warn!(?other, "Message before session context dropped"),
        }
    }
    Err(AppError::BridgeError {
        reason: String::from("Bridge closed before the session context arrived"),
        location: ErrorLocation::from(location),
    })
}
