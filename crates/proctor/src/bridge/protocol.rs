//! Line-delimited JSON messages exchanged with the candidate's browser.

use proctor_core::{
    AnswerOption, BrowserSignal, DisplaySurface, Disposition, Phase, ScreenGeometry, SessionStatus,
};

use serde::{Deserialize, Serialize};

/// Browser to host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// Test link resolved; must be the first message.
    #[serde(rename_all = "camelCase")]
    Session {
        /// Backend submission id.
        submission_id: String,
        /// Test-link token.
        token: String,
        /// Phase stored by the backend, when resuming.
        #[serde(default)]
        phase: Option<Phase>,
    },
    /// Document or window event awaiting a disposition.
    Signal {
        /// Correlates the disposition reply.
        seq: u64,
        /// The event.
        #[serde(flatten)]
        signal: BrowserSignal,
    },
    /// Fresh window/screen measurements.
    Geometry(ScreenGeometry),
    /// Display picker answered with a stream.
    DisplayGranted {
        /// Surface the candidate chose.
        #[serde(default)]
        surface: Option<DisplaySurface>,
    },
    /// Display picker dismissed or refused.
    DisplayDenied {
        /// Browser error name.
        reason: String,
    },
    /// Encoded recorder output, base64.
    DisplayChunk {
        /// Base64 payload.
        data: String,
    },
    /// Every chunk recorded before the last [`Outbound::FlushDisplay`] was sent.
    DisplayFlushed,
    /// The shared display track ended.
    DisplayEnded,
    /// Candidate interaction with the phase view.
    Ui(UiEvent),
}

/// Candidate interaction with the phase view.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UiEvent {
    /// The video currently shown played to the end.
    VideoEnded,
    /// "Begin assessment" pressed on the guidelines page.
    Begin,
    /// Writing text box changed.
    Text {
        /// Full current text.
        text: String,
    },
    /// Questions of the current choice phase, in display order.
    #[serde(rename_all = "camelCase")]
    Questions {
        /// Question identifiers.
        ids: Vec<String>,
    },
    /// Option selected for a question.
    #[serde(rename_all = "camelCase")]
    Answer {
        /// Question identifier.
        question_id: String,
        /// Chosen option.
        option: AnswerOption,
    },
    /// Manual submit of the current phase.
    Submit,
    /// Microphone access button.
    EnableMicrophone,
    /// "Next question" pressed while answering.
    NextQuestion,
}

/// Host to browser.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// Reply to a [`Inbound::Signal`].
    Disposition {
        /// Sequence number of the signal.
        seq: u64,
        /// What the document should do.
        disposition: Disposition,
    },
    /// Show the view for a phase.
    Navigate {
        /// Target phase.
        phase: Phase,
    },
    /// Open the display picker.
    RequestDisplay,
    /// Start or stop forwarding recorder chunks.
    CaptureDisplay {
        /// Whether chunks should flow.
        capturing: bool,
    },
    /// Hand over the recorder's buffered tail, then answer
    /// [`Inbound::DisplayFlushed`].
    FlushDisplay,
    /// Stop every display track.
    StopDisplay,
    /// Session snapshot.
    Status(SessionStatus),
    /// Task video chosen for the writing phase.
    WritingTask {
        /// One-based task number.
        number: u8,
        /// Video asset name.
        video: String,
    },
    /// Phase timer, `MM:SS`.
    Timer {
        /// Remaining time.
        remaining: String,
    },
    /// Verbal phase progress.
    VerbalStage {
        /// Stage name.
        stage: String,
        /// Question number, one-based, when the stage has one.
        question: Option<usize>,
    },
    /// An operation failed; the view should show `message`.
    Error {
        /// Human-readable message.
        message: String,
        /// Whether the candidate may try the action again.
        retry: bool,
    },
}
