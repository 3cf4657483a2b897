use crate::{CoreResult, Phase, ProctorError, Severity, ViolationKind, ViolationPolicy};

use std::{fmt, panic::Location};

use error_location::ErrorLocation;
use serde::Serialize;

/// Proctoring lifecycle.
///
/// `Idle -> Starting -> Active -> Stopping -> Stopped`, with `Disqualified`
/// reachable from `Active` and terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Not proctoring yet.
    Idle,
    /// Waiting on the capture prompt.
    Starting,
    /// Capturing with detectors bound to the phase.
    Active,
    /// Tearing down.
    Stopping,
    /// Torn down after a normal stop.
    Stopped,
    /// Torn down by a hard violation.
    Disqualified,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Active => "active",
            SessionState::Stopping => "stopping",
            SessionState::Stopped => "stopped",
            SessionState::Disqualified => "disqualified",
        };
        f.write_str(name)
    }
}

/// How the session answers a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Not proctoring, or already terminal.
    Ignore,
    /// Soft: report and continue.
    Report,
    /// Hard: tear down and disqualify.
    Disqualify,
}

/// Phase ledger and lifecycle flags, free of I/O.
///
/// Every transition the session performs goes through here, so the
/// ordering rules hold regardless of how events interleave.
#[derive(Debug, Clone)]
pub struct SessionCore {
    phase: Phase,
    state: SessionState,
    policy: ViolationPolicy,
    terminal: bool,
}

impl SessionCore {
    /// Core positioned at `phase`, not proctoring.
    pub fn new(phase: Phase, policy: ViolationPolicy) -> Self {
        Self {
            phase,
            state: SessionState::Idle,
            policy,
            terminal: phase.is_terminal(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether capture and detectors are running.
    pub fn is_proctoring(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Set once the session is disqualified or finished.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    #[track_caller]
    fn ensure_open(&self) -> CoreResult<()> {
        if self.terminal {
            return Err(ProctorError::SessionTerminated {
                phase: self.phase,
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(())
    }

    /// Enter `Starting`. `Ok(false)` when already proctoring.
    ///
    /// # Errors
    ///
    /// `SessionTerminated` once disqualified or finished.
    #[track_caller]
    pub fn begin_start(&mut self) -> CoreResult<bool> {
        self.ensure_open()?;
        match self.state {
            SessionState::Active | SessionState::Starting | SessionState::Stopping => Ok(false),
            SessionState::Idle | SessionState::Stopped => {
                self.state = SessionState::Starting;
                Ok(true)
            }
            SessionState::Disqualified => Err(ProctorError::SessionTerminated {
                phase: self.phase,
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    /// Back to `Idle` after a refused prompt or failed precheck.
    pub fn start_failed(&mut self) {
        if self.state == SessionState::Starting {
            self.state = SessionState::Idle;
        }
    }

    /// `Starting -> Active`.
    pub fn start_succeeded(&mut self) {
        if self.state == SessionState::Starting {
            self.state = SessionState::Active;
        }
    }

    /// Move to `to`, which must directly follow the current phase.
    ///
    /// # Errors
    ///
    /// `SessionTerminated` from a terminal phase, `InvalidTransition` for a
    /// skip or a regression.
    #[track_caller]
    pub fn advance(&mut self, to: Phase) -> CoreResult<()> {
        self.ensure_open()?;
        if !self.phase.can_transition_to(to) {
            return Err(ProctorError::InvalidTransition {
                from: self.phase,
                to,
                location: ErrorLocation::from(Location::caller()),
            });
        }
        self.phase = to;
        if to.is_terminal() {
            self.terminal = true;
        }
        if to == Phase::Disqualified {
            self.state = SessionState::Disqualified;
        }
        Ok(())
    }

    /// Decide the consequence of a violation and apply it.
    ///
    /// A hard violation moves straight to `Disqualified`; everything after
    /// that is ignored.
    pub fn classify(&mut self, kind: ViolationKind) -> Reaction {
        if self.terminal || !matches!(self.state, SessionState::Active | SessionState::Starting) {
            return Reaction::Ignore;
        }
        match self.policy.severity(kind) {
            Severity::Soft => Reaction::Report,
            Severity::Hard => {
                self.phase = Phase::Disqualified;
                self.state = SessionState::Disqualified;
                self.terminal = true;
                Reaction::Disqualify
            }
        }
    }

    /// Enter `Stopping`. `false` when there is nothing to stop.
    pub fn begin_stop(&mut self) -> bool {
        if matches!(self.state, SessionState::Active | SessionState::Starting) {
            self.state = SessionState::Stopping;
            true
        } else {
            false
        }
    }

    /// `Stopping -> Stopped`.
    pub fn finish_stop(&mut self) {
        if self.state == SessionState::Stopping {
            self.state = SessionState::Stopped;
        }
    }
}
