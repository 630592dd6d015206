// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the scan session state machine and deduplication

use pkgscan::decoder::DecodeEvent;
use pkgscan::errors::CameraError;
use pkgscan::session::{
    Effect, KeyRule, ScanSession, SessionEvent, SessionOptions, SessionState,
};
use std::time::{Duration, Instant};

fn decoded(raw: &str) -> SessionEvent {
    SessionEvent::Decoded(DecodeEvent {
        raw_text: raw.to_string(),
        at: chrono::Local::now(),
    })
}

fn started(opts: SessionOptions) -> (ScanSession, Instant) {
    let mut session = ScanSession::new(opts);
    let now = Instant::now();
    let effects = session.apply(SessionEvent::StartRequested, now);
    assert_eq!(effects, vec![Effect::AcquireCamera]);
    (session, now)
}

#[test]
fn test_full_scan_cycle() {
    let (mut session, now) = started(SessionOptions::default());
    assert_eq!(session.state(), SessionState::Scanning);

    // Accept a code, show it, auto-return after the display window
    let effects = session.apply(decoded("PKG-001,depot-7"), now);
    assert_eq!(effects, vec![Effect::PlaySuccessCue]);
    assert_eq!(session.state(), SessionState::ResultShown);
    assert_eq!(session.last_result(), Some("PKG-001,depot-7"));

    session.tick(now + Duration::from_millis(1500));
    assert_eq!(session.state(), SessionState::Scanning);
    assert_eq!(session.last_result(), None);

    // Stop releases the camera and returns to idle
    let effects = session.apply(SessionEvent::StopRequested, now + Duration::from_secs(2));
    assert_eq!(effects, vec![Effect::ReleaseCamera]);
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn test_duplicate_never_reenters_history() {
    let (mut session, now) = started(SessionOptions::default());

    session.apply(decoded("PKG-001"), now);
    session.tick(now + Duration::from_millis(1500));
    session.apply(decoded("PKG-002"), now + Duration::from_millis(1600));
    session.tick(now + Duration::from_millis(3200));

    // Re-scan the first code: rejected, history order unchanged
    let effects = session.apply(decoded("PKG-001"), now + Duration::from_millis(3300));
    assert!(effects.is_empty());
    assert_eq!(session.state(), SessionState::ErrorShown);

    let keys: Vec<&str> = session.records().iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["PKG-001", "PKG-002"]);
}

#[test]
fn test_duplicate_notice_keeps_stream_alive() {
    let (mut session, now) = started(SessionOptions::default());
    session.apply(decoded("PKG-001"), now);
    session.tick(now + Duration::from_millis(1500));

    session.apply(decoded("PKG-001"), now + Duration::from_millis(1600));
    assert_eq!(session.state(), SessionState::ErrorShown);
    assert!(session.wants_camera());

    // Auto-return to scanning, no camera re-acquisition needed
    session.tick(now + Duration::from_millis(3100));
    assert_eq!(session.state(), SessionState::Scanning);
}

#[test]
fn test_field_rule_dedup_sequence() {
    let opts = SessionOptions {
        key_rule: KeyRule::Field {
            delimiter: ',',
            index: 1,
        },
        ..SessionOptions::default()
    };
    let (mut session, now) = started(opts);

    let mut t = now;
    for raw in ["A,1", "A,1", "A,2"] {
        session.apply(decoded(raw), t);
        t += Duration::from_secs(2);
        session.tick(t);
        assert_eq!(session.state(), SessionState::Scanning);
    }

    let keys: Vec<&str> = session.records().iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["1", "2"]);
}

#[test]
fn test_malformed_payload_is_transient() {
    let opts = SessionOptions {
        key_rule: KeyRule::Field {
            delimiter: ',',
            index: 1,
        },
        ..SessionOptions::default()
    };
    let (mut session, now) = started(opts);

    let effects = session.apply(decoded("no-delimiter-here"), now);
    assert!(effects.is_empty());
    assert_eq!(session.state(), SessionState::ErrorShown);
    assert!(session.records().is_empty());
    assert!(session.wants_camera());

    session.tick(now + Duration::from_millis(1500));
    assert_eq!(session.state(), SessionState::Scanning);
}

#[test]
fn test_camera_loss_requires_explicit_retry() {
    let (mut session, now) = started(SessionOptions::default());
    session.apply(decoded("PKG-001"), now);

    let effects = session.apply(SessionEvent::CameraFailed(CameraError::Disconnected), now);
    assert_eq!(effects, vec![Effect::ReleaseCamera]);
    assert_eq!(session.state(), SessionState::ErrorShown);
    assert!(!session.wants_camera());
    assert!(session.notice().is_some_and(|n| n.fatal));
    assert_eq!(
        session.notice().map(|n| n.text.as_str()),
        Some("Camera disconnected")
    );

    // The fatal banner never auto-clears
    session.tick(now + Duration::from_secs(3600));
    assert_eq!(session.state(), SessionState::ErrorShown);

    // History survives the failure
    assert_eq!(session.records().len(), 1);

    // Retry re-acquires the camera
    let effects = session.apply(SessionEvent::StartRequested, now + Duration::from_secs(3601));
    assert_eq!(effects, vec![Effect::AcquireCamera]);
    assert_eq!(session.state(), SessionState::Scanning);
}

#[test]
fn test_stop_cancels_pending_auto_return() {
    let (mut session, now) = started(SessionOptions::default());
    session.apply(decoded("PKG-001"), now);
    assert_eq!(session.state(), SessionState::ResultShown);

    session.apply(SessionEvent::StopRequested, now + Duration::from_millis(200));
    assert_eq!(session.state(), SessionState::Idle);

    // The result window that was pending must not resume scanning
    session.tick(now + Duration::from_millis(1500));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.wants_camera());
}

#[test]
fn test_restart_clears_history_by_default() {
    let (mut session, now) = started(SessionOptions::default());
    session.apply(decoded("PKG-001"), now);
    session.apply(SessionEvent::StopRequested, now + Duration::from_secs(1));
    assert_eq!(session.records().len(), 1);

    session.apply(SessionEvent::StartRequested, now + Duration::from_secs(2));
    assert!(session.records().is_empty());

    // The same code scans fresh after the restart
    let effects = session.apply(decoded("PKG-001"), now + Duration::from_secs(3));
    assert_eq!(effects, vec![Effect::PlaySuccessCue]);
}

#[test]
fn test_restart_preserves_history_when_configured() {
    let opts = SessionOptions {
        preserve_history: true,
        ..SessionOptions::default()
    };
    let (mut session, now) = started(opts);
    session.apply(decoded("PKG-001"), now);
    session.apply(SessionEvent::StopRequested, now + Duration::from_secs(1));
    session.apply(SessionEvent::StartRequested, now + Duration::from_secs(2));

    assert_eq!(session.records().len(), 1);
    let effects = session.apply(decoded("PKG-001"), now + Duration::from_secs(3));
    assert!(effects.is_empty(), "preserved code must still be a duplicate");
}

#[test]
fn test_late_decode_event_is_dropped() {
    let (mut session, now) = started(SessionOptions::default());
    session.apply(decoded("PKG-001"), now);
    assert_eq!(session.state(), SessionState::ResultShown);

    // A decode from the poll that raced the transition must not stack
    let effects = session.apply(decoded("PKG-002"), now + Duration::from_millis(50));
    assert!(effects.is_empty());
    assert_eq!(session.records().len(), 1);
    assert_eq!(session.last_result(), Some("PKG-001"));
}

#[test]
fn test_advisory_overlays_without_state_change() {
    let (mut session, now) = started(SessionOptions::default());

    session.advise("Torch not supported on this device", now);
    assert_eq!(session.state(), SessionState::Scanning);
    assert!(session.advisory().is_some());

    // Scanning continues under the advisory
    let effects = session.apply(decoded("PKG-001"), now);
    assert_eq!(effects, vec![Effect::PlaySuccessCue]);

    session.tick(now + Duration::from_secs(10));
    assert_eq!(session.advisory(), None);
}
