use crate::bridge::{Inbound, Outbound, UiEvent, parse_line};

use proctor_core::{
    AnswerOption, BrowserSignal, ClipboardAction, DisplaySurface, Disposition, KeyChord, Phase,
    ScreenGeometry,
};

use serde_json::json;

/// WHAT: The session message carries the test link context and optional resume phase
/// WHY: It is the first message and seeds the whole session
#[test]
#[allow(clippy::unwrap_used)]
fn given_session_line_when_parsed_then_context_and_phase_decoded() {
    // Given: A resume into the intelligence phase
    let line = r#"{"type":"session","submissionId":"sub-1","token":"tok-9","phase":"intelligence"}"#;

    // When: Parsing
    let message = parse_line(line).unwrap().unwrap();

    // Then: Every field lands
    assert_eq!(
        message,
        Inbound::Session {
            submission_id: String::from("sub-1"),
            token: String::from("tok-9"),
            phase: Some(Phase::Intelligence),
        }
    );
}

/// WHAT: A fresh session without a phase decodes with `None`
/// WHY: New attempts start at the guidelines page
#[test]
#[allow(clippy::unwrap_used)]
fn given_session_without_phase_when_parsed_then_phase_absent() {
    let message = parse_line(r#"{"type":"session","submissionId":"s","token":"t"}"#)
        .unwrap()
        .unwrap();

    assert!(matches!(message, Inbound::Session { phase: None, .. }));
}

/// WHAT: Signal fields sit beside the sequence number in one flat object
/// WHY: The document handler sends the event as-is plus `seq`
#[test]
#[allow(clippy::unwrap_used)]
fn given_signal_lines_when_parsed_then_flattened_signal_decoded() {
    // Given: A key press, a visibility change and a paste
    let key = r#"{"type":"signal","seq":7,"signal":"key_down","key":"F12"}"#;
    let hidden = r#"{"type":"signal","seq":8,"signal":"visibility_changed","hidden":true}"#;
    let paste = r#"{"type":"signal","seq":9,"signal":"clipboard","action":"paste","data_length":12}"#;

    // When: Parsing each
    let key = parse_line(key).unwrap().unwrap();
    let hidden = parse_line(hidden).unwrap().unwrap();
    let paste = parse_line(paste).unwrap().unwrap();

    // Then: The nested signal keeps its own tag and fields
    assert_eq!(
        key,
        Inbound::Signal {
            seq: 7,
            signal: BrowserSignal::KeyDown(KeyChord::plain("F12")),
        }
    );
    assert_eq!(
        hidden,
        Inbound::Signal {
            seq: 8,
            signal: BrowserSignal::VisibilityChanged { hidden: true },
        }
    );
    assert_eq!(
        paste,
        Inbound::Signal {
            seq: 9,
            signal: BrowserSignal::Clipboard {
                action: ClipboardAction::Paste,
                data_length: 12,
            },
        }
    );
}

/// WHAT: UI events decode with camelCase fields and lowercase options
/// WHY: The phase views emit them straight from form state
#[test]
#[allow(clippy::unwrap_used)]
fn given_ui_lines_when_parsed_then_events_decoded() {
    let answer = parse_line(r#"{"type":"ui","event":"answer","questionId":"q3","option":"b"}"#)
        .unwrap()
        .unwrap();
    let questions = parse_line(r#"{"type":"ui","event":"questions","ids":["q1","q2"]}"#)
        .unwrap()
        .unwrap();
    let ended = parse_line(r#"{"type":"ui","event":"video_ended"}"#).unwrap().unwrap();

    assert_eq!(
        answer,
        Inbound::Ui(UiEvent::Answer {
            question_id: String::from("q3"),
            option: AnswerOption::B,
        })
    );
    assert_eq!(
        questions,
        Inbound::Ui(UiEvent::Questions {
            ids: vec![String::from("q1"), String::from("q2")],
        })
    );
    assert_eq!(ended, Inbound::Ui(UiEvent::VideoEnded));
}

/// WHAT: Geometry and display answers decode into their core types
/// WHY: They feed the precheck and the capture prompt directly
#[test]
#[allow(clippy::unwrap_used)]
fn given_platform_lines_when_parsed_then_geometry_and_display_decoded() {
    let geometry = parse_line(
        r#"{"type":"geometry","screenWidth":1920,"screenHeight":1080,"availWidth":1920,
            "availHeight":1040,"windowX":0,"windowY":0,"outerWidth":1920,"outerHeight":1040}"#,
    )
    .unwrap()
    .unwrap();
    let granted = parse_line(r#"{"type":"display_granted","surface":"monitor"}"#)
        .unwrap()
        .unwrap();
    let denied = parse_line(r#"{"type":"display_denied","reason":"NotAllowedError"}"#)
        .unwrap()
        .unwrap();

    assert_eq!(
        geometry,
        Inbound::Geometry(ScreenGeometry {
            screen_width: 1920.0,
            screen_height: 1080.0,
            avail_width: 1920.0,
            avail_height: 1040.0,
            window_x: 0.0,
            window_y: 0.0,
            outer_width: 1920.0,
            outer_height: 1040.0,
        })
    );
    assert_eq!(
        granted,
        Inbound::DisplayGranted {
            surface: Some(DisplaySurface::Monitor),
        }
    );
    assert_eq!(
        denied,
        Inbound::DisplayDenied {
            reason: String::from("NotAllowedError"),
        }
    );
}

/// WHAT: Blank lines are skipped and garbage is an error, not a panic
/// WHY: The reader logs bad lines and keeps going
#[test]
fn given_blank_or_malformed_line_when_parsed_then_skipped_or_error() {
    assert!(parse_line("   ").is_none());
    assert!(matches!(parse_line("{not json"), Some(Err(_))));
    assert!(matches!(parse_line(r#"{"type":"teleport"}"#), Some(Err(_))));
}

/// WHAT: Outbound messages serialize with a `type` tag and nested dispositions
/// WHY: The browser switches on `type` and reads the disposition by `seq`
#[test]
#[allow(clippy::unwrap_used)]
fn given_outbound_messages_when_serialized_then_wire_shape_matches() {
    // Given: A disposition, a navigation and a verbal stage update
    let disposition = Outbound::Disposition {
        seq: 3,
        disposition: Disposition::Suppress,
    };
    let navigate = Outbound::Navigate {
        phase: Phase::Writing,
    };
    let stage = Outbound::VerbalStage {
        stage: String::from("answering"),
        question: Some(2),
    };

    // When: Serializing
    let disposition = serde_json::to_value(&disposition).unwrap();
    let navigate = serde_json::to_value(&navigate).unwrap();
    let stage = serde_json::to_value(&stage).unwrap();
    let request = serde_json::to_value(Outbound::RequestDisplay).unwrap();

    // Then: Shapes match what the page expects
    assert_eq!(
        disposition,
        json!({ "type": "disposition", "seq": 3, "disposition": { "disposition": "suppress" } })
    );
    assert_eq!(navigate, json!({ "type": "navigate", "phase": "writing" }));
    assert_eq!(
        stage,
        json!({ "type": "verbal_stage", "stage": "answering", "question": 2 })
    );
    assert_eq!(request, json!({ "type": "request_display" }));
}

/// WHAT: The flush handshake and retryable errors have their own wire shapes
/// WHY: The page answers a flush request and decides whether to offer a retry
#[test]
#[allow(clippy::unwrap_used)]
fn given_flush_and_error_messages_when_exchanged_then_wire_shape_matches() {
    // Given: A flush request, its acknowledgement and a terminal error
    let flush = serde_json::to_value(Outbound::FlushDisplay).unwrap();
    let error = serde_json::to_value(Outbound::Error {
        message: String::from("Capture lost"),
        retry: false,
    })
    .unwrap();

    // When: The page acknowledges the flush
    let flushed = parse_line(r#"{"type":"display_flushed"}"#).unwrap().unwrap();

    // Then: Both directions match
    assert_eq!(flush, json!({ "type": "flush_display" }));
    assert_eq!(error, json!({ "type": "error", "message": "Capture lost", "retry": false }));
    assert_eq!(flushed, Inbound::DisplayFlushed);
}
