use crate::{
    BrowserSignal, ClipboardAction, ClipboardMonitor, Detector, DetectorSet, DisplayLivenessDetector,
    DisplaySurface, Disposition, KeyChord, LEAVE_WARNING, Modality, MultiMonitorDetector,
    NetworkMonitor, Phase, ProctorError, ScreenGeometry, SignalBus, ViolationKind,
    VisibilityDetector,
    detect::{ClipboardRule, SignalRule, VisibilityRule},
    is_copy_chord, is_devtools_chord, precheck_geometry,
    tests::support::{
        FakeBeacon, FakeEnvironment, FakeSource, SUBMISSION_ID, arm_context, settle,
        spanning_geometry, test_settings,
    },
};

use std::{sync::Arc, time::Duration};

use serde_json::json;

/// WHAT: Each hidden transition fires tab_switch with a running count
/// WHY: Reviewers need to know how often the candidate left the tab
#[test]
#[allow(clippy::unwrap_used)]
fn given_visibility_rule_when_document_hides_twice_then_counts_increase() {
    // Given: A fresh rule
    let mut rule = VisibilityRule::new();

    // When: Hidden, visible, hidden
    let first = rule.observe(&BrowserSignal::VisibilityChanged { hidden: true });
    let shown = rule.observe(&BrowserSignal::VisibilityChanged { hidden: false });
    let second = rule.observe(&BrowserSignal::VisibilityChanged { hidden: true });

    // Then: Two events, counted 1 and 2; becoming visible is not a violation
    assert!(shown.is_none());
    let first = first.unwrap();
    assert_eq!(first.kind(), ViolationKind::TabSwitch);
    assert_eq!(first.metadata().get("violationCount"), Some(&json!(1)));
    assert_eq!(second.unwrap().metadata().get("violationCount"), Some(&json!(2)));
}

/// WHAT: Paste always fires, copy only when configured
/// WHY: Copy detection is noisy and opt-in
#[test]
#[allow(clippy::unwrap_used)]
fn given_clipboard_rule_when_copy_and_paste_then_only_enabled_actions_fire() {
    let paste = BrowserSignal::Clipboard {
        action: ClipboardAction::Paste,
        data_length: 120,
    };
    let copy = BrowserSignal::Clipboard {
        action: ClipboardAction::Copy,
        data_length: 0,
    };

    let mut quiet = ClipboardRule { detect_copy: false };
    let mut strict = ClipboardRule { detect_copy: true };

    let event = quiet.observe(&paste).unwrap();
    assert_eq!(event.kind(), ViolationKind::CopyPasteDetected);
    assert_eq!(event.metadata().get("dataLength"), Some(&json!(120)));
    assert!(quiet.observe(&copy).is_none());
    assert!(strict.observe(&copy).is_some());
}

/// WHAT: Disarming a listener-based detector detaches it from the bus
/// WHY: Listeners must not leak across phase transitions
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_armed_visibility_detector_when_disarmed_then_signals_are_ignored() {
    // Given: An armed detector
    let bus = SignalBus::new();
    let (ctx, mut rx) = arm_context(&bus, FakeEnvironment::new(), None);
    let mut detector = VisibilityDetector::default();
    detector.arm(&ctx);
    assert_eq!(bus.listener_count(), 1);

    // When: One hidden signal while armed, one after disarming
    bus.publish(BrowserSignal::VisibilityChanged { hidden: true });
    settle().await;
    detector.disarm();
    settle().await;
    bus.publish(BrowserSignal::VisibilityChanged { hidden: true });
    settle().await;

    // Then: Only the first produced a violation and the listener is gone
    assert_eq!(rx.try_recv().unwrap().kind(), ViolationKind::TabSwitch);
    assert!(rx.try_recv().is_err());
    assert_eq!(bus.listener_count(), 0);
    assert!(!detector.is_armed());
}

/// WHAT: The multi-monitor check waits for the grace period
/// WHY: Candidates get time to fix window placement
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_spanning_window_when_grace_elapses_then_multiple_monitors_fires() {
    // Given: A window spanning two displays
    let environment = FakeEnvironment::new();
    environment.set_geometry(spanning_geometry());
    let bus = SignalBus::new();
    let (ctx, mut rx) = arm_context(&bus, environment, None);
    let mut detector = MultiMonitorDetector::new(Duration::from_secs(10));

    // When: Armed, checked just before and just after the grace period
    detector.arm(&ctx);
    tokio::time::sleep(Duration::from_secs(9)).await;
    let early = rx.try_recv();
    tokio::time::sleep(Duration::from_secs(2)).await;

    // Then: Nothing early; afterwards one event with the sampled geometry
    assert!(early.is_err());
    let event = rx.try_recv().unwrap();
    assert_eq!(event.kind(), ViolationKind::MultipleMonitors);
    assert_eq!(event.metadata().get("windowPosition"), Some(&json!({ "x": 1200.0, "y": 0.0 })));
}

/// WHAT: Fixing the window during the grace period avoids the violation
/// WHY: The grace period exists precisely for this correction
#[tokio::test(start_paused = true)]
async fn given_window_fixed_within_grace_when_check_runs_then_no_violation() {
    let environment = FakeEnvironment::new();
    environment.set_geometry(spanning_geometry());
    let bus = SignalBus::new();
    let (ctx, mut rx) = arm_context(&bus, environment.clone(), None);
    let mut detector = MultiMonitorDetector::new(Duration::from_secs(10));
    detector.arm(&ctx);

    tokio::time::sleep(Duration::from_secs(5)).await;
    environment.set_geometry(ScreenGeometry::single(1920.0, 1080.0));
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(rx.try_recv().is_err());
}

/// WHAT: The immediate precheck rejects extended desktops
/// WHY: startProctoring must refuse before the candidate enters a phase
#[test]
fn given_extended_desktop_when_prechecking_then_geometry_violation() {
    // Given: A screen reporting twice the usable width
    let geometry = ScreenGeometry {
        screen_width: 3840.0,
        ..ScreenGeometry::single(1920.0, 1080.0)
    };

    // When/Then: The precheck fails; a single display passes
    assert!(matches!(
        precheck_geometry(&geometry),
        Err(ProctorError::GeometryViolation { .. })
    ));
    assert!(precheck_geometry(&ScreenGeometry::single(1920.0, 1080.0)).is_ok());
}

/// WHAT: A revoked share fires screen_share_stopped exactly once
/// WHY: Track-ended is the primary signal for a lost display capture
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_live_display_when_track_ends_then_single_screen_share_stopped() {
    // Given: An armed liveness detector over a live display
    let display = FakeSource::new(Modality::Display, Some(DisplaySurface::Monitor));
    let bus = SignalBus::new();
    let (ctx, mut rx) = arm_context(&bus, FakeEnvironment::new(), Some(Arc::clone(&display)));
    let mut detector = DisplayLivenessDetector::new(Duration::from_secs(2));
    detector.arm(&ctx);
    settle().await;
    assert!(rx.try_recv().is_err());

    // When: The user stops sharing, and time passes
    display.end_track();
    tokio::time::sleep(Duration::from_secs(5)).await;

    // Then: One event with the track_ended reason
    let event = rx.try_recv().unwrap();
    assert_eq!(event.kind(), ViolationKind::ScreenShareStopped);
    assert_eq!(event.metadata().get("reason"), Some(&json!("track_ended")));
    assert!(rx.try_recv().is_err());
}

/// WHAT: A silently inactive stream is caught by polling
/// WHY: Some platforms end streams without a track-ended event
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_stream_goes_inactive_when_polled_then_screen_share_stopped() {
    let display = FakeSource::new(Modality::Display, Some(DisplaySurface::Monitor));
    let bus = SignalBus::new();
    let (ctx, mut rx) = arm_context(&bus, FakeEnvironment::new(), Some(Arc::clone(&display)));
    let mut detector = DisplayLivenessDetector::new(Duration::from_secs(10));
    detector.arm(&ctx);
    settle().await;

    display.go_inactive();
    tokio::time::sleep(Duration::from_millis(2100)).await;

    // Poll interval was capped at two seconds
    let event = rx.try_recv().unwrap();
    assert_eq!(event.metadata().get("reason"), Some(&json!("inactive")));
}

/// WHAT: Arming while offline reports immediately; reconnecting re-arms
/// WHY: Each drop in connectivity is a separate reviewable event
#[tokio::test]
async fn given_offline_at_arm_when_connectivity_flaps_then_each_drop_reported() {
    // Given: The candidate is already offline
    let environment = FakeEnvironment::new();
    environment.set_online(false);
    let bus = SignalBus::new();
    let (ctx, mut rx) = arm_context(&bus, environment, None);
    let mut detector = NetworkMonitor::default();

    // When: Armed, then a repeated offline, online, offline
    detector.arm(&ctx);
    for signal in [BrowserSignal::Offline, BrowserSignal::Online, BrowserSignal::Offline] {
        bus.publish(signal);
    }
    settle().await;

    // Then: The initial state and the second drop were reported
    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.kind());
    }
    assert_eq!(kinds, vec![ViolationKind::NetworkFailure, ViolationKind::NetworkFailure]);
}

/// WHAT: Developer-tools and copy chords are recognised
/// WHY: Obstruction depends on matching the known shortcuts
#[test]
fn given_known_chords_when_matching_then_classified() {
    let ctrl_shift_i = KeyChord {
        key: String::from("I"),
        ctrl: true,
        shift: true,
        ..KeyChord::default()
    };
    let cmd_option_j = KeyChord {
        key: String::from("j"),
        meta: true,
        alt: true,
        ..KeyChord::default()
    };

    assert!(is_devtools_chord(&KeyChord::plain("F12")));
    assert!(is_devtools_chord(&ctrl_shift_i));
    assert!(is_devtools_chord(&cmd_option_j));
    assert!(is_devtools_chord(&KeyChord::ctrl("u")));
    assert!(!is_devtools_chord(&KeyChord::plain("i")));
    assert!(is_copy_chord(&KeyChord::ctrl("v")));
    assert!(is_copy_chord(&KeyChord::plain("PrintScreen")));
    assert!(!is_copy_chord(&KeyChord::plain("v")));
}

fn detector_set(beacon: Arc<FakeBeacon>) -> (DetectorSet, SignalBus) {
    let bus = SignalBus::new();
    let set = DetectorSet::new(&test_settings(), bus.clone(), SUBMISSION_ID, beacon);
    (set, bus)
}

/// WHAT: Detectors arm only in assessment phases and fully detach otherwise
/// WHY: Arming is a pure function of the phase
#[tokio::test]
async fn given_detector_set_when_phases_change_then_arming_follows_phase() {
    // Given: A detector set and a context
    let (mut set, bus) = detector_set(Arc::new(FakeBeacon::default()));
    let (ctx, _rx) = arm_context(&bus, FakeEnvironment::new(), None);

    // When/Then: Guidelines arms nothing
    set.apply_phase(Phase::Guidelines, &ctx);
    assert!(!set.any_armed());

    // When/Then: Writing arms every detector
    set.apply_phase(Phase::Writing, &ctx);
    assert_eq!(set.armed().len(), 7);
    assert_eq!(bus.listener_count(), 3);

    // When/Then: Finish disarms everything and releases bus listeners
    set.apply_phase(Phase::Finish, &ctx);
    settle().await;
    assert!(!set.any_armed());
    assert_eq!(bus.listener_count(), 0);
}

/// WHAT: Armed gate suppresses shortcuts and reports devtools attempts
/// WHY: Obstruction must answer synchronously, inside the key handler
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_armed_gate_when_shortcuts_pressed_then_suppressed_and_devtools_reported() {
    // Given: An armed detector set
    let (mut set, bus) = detector_set(Arc::new(FakeBeacon::default()));
    let (ctx, mut rx) = arm_context(&bus, FakeEnvironment::new(), None);
    set.apply_phase(Phase::Intelligence, &ctx);
    let gate = set.gate();

    // When: F12, Ctrl+C and a plain letter are pressed
    let f12 = gate.dispatch(BrowserSignal::KeyDown(KeyChord::plain("F12")));
    let copy = gate.dispatch(BrowserSignal::KeyDown(KeyChord::ctrl("c")));
    let letter = gate.dispatch(BrowserSignal::KeyDown(KeyChord::plain("a")));
    let menu = gate.dispatch(BrowserSignal::ContextMenu);

    // Then: Shortcuts suppressed, typing allowed, devtools reported twice
    assert_eq!(f12, Disposition::Suppress);
    assert_eq!(copy, Disposition::Suppress);
    assert_eq!(letter, Disposition::Allow);
    assert_eq!(menu, Disposition::Suppress);
    assert_eq!(rx.try_recv().unwrap().kind(), ViolationKind::DevtoolsDetected);
    assert_eq!(rx.try_recv().unwrap().kind(), ViolationKind::DevtoolsDetected);
    assert!(rx.try_recv().is_err());
}

/// WHAT: A disarmed gate lets everything through
/// WHY: The guidelines page must behave like a normal page
#[test]
fn given_disarmed_gate_when_shortcuts_pressed_then_allowed() {
    let (set, _bus) = detector_set(Arc::new(FakeBeacon::default()));
    let gate = set.gate();

    assert_eq!(gate.dispatch(BrowserSignal::KeyDown(KeyChord::plain("F12"))), Disposition::Allow);
    assert_eq!(gate.dispatch(BrowserSignal::BeforeUnload), Disposition::Allow);
}

/// WHAT: Leaving an armed page beacons page_refresh and asks for confirmation
/// WHY: The page may be torn down before a normal report completes
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_armed_unload_when_leaving_then_beacon_sent_and_confirmation_requested() {
    // Given: Armed detectors with a recording beacon
    let beacon = Arc::new(FakeBeacon::default());
    let (mut set, bus) = detector_set(Arc::clone(&beacon));
    let (ctx, mut rx) = arm_context(&bus, FakeEnvironment::new(), None);
    set.apply_phase(Phase::Writing, &ctx);

    // When: The browser fires beforeunload
    let disposition = set.gate().dispatch(BrowserSignal::BeforeUnload);

    // Then: Confirmation, a beacon for this submission, and a sink report
    assert_eq!(
        disposition,
        Disposition::ConfirmLeave {
            message: LEAVE_WARNING.to_string()
        }
    );
    let sent = beacon.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].submission_id, SUBMISSION_ID);
    assert_eq!(sent[0].violation_type, "page_refresh");
    assert!(sent[0].metadata.contains_key("timestamp"));
    assert_eq!(rx.try_recv().unwrap().kind(), ViolationKind::PageRefresh);
}
