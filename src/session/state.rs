// SPDX-License-Identifier: GPL-3.0-only

//! Scan session state machine
//!
//! All session mutation flows through [`ScanSession::apply`] and
//! [`ScanSession::tick`], which run on the single UI event loop thread.
//! Side effects (camera acquisition/release, the success cue) are returned
//! as [`Effect`] values and executed by the caller, keeping the machine
//! itself pure and testable without hardware.
//!
//! Auto-return timers are modeled as a stored deadline instead of real
//! timers: every transition overwrites or clears the deadline, so a stale
//! timer can never fire into newer state.

use crate::decoder::DecodeEvent;
use crate::errors::CameraError;
use crate::session::dedup::{Deduplicator, KeyRule, ScanOutcome, ScanRecord};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// UI lifecycle states. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No camera, waiting for the user to start scanning
    Idle,
    /// Camera live, decoder polling frames
    Scanning,
    /// An accepted code is on screen; auto-returns to Scanning
    ResultShown,
    /// An error banner is on screen; transient errors auto-return to
    /// Scanning, fatal ones wait for explicit user retry
    ErrorShown,
}

/// Inputs consumed by the state machine
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// User pressed start (or retry after a fatal camera error)
    StartRequested,
    /// User pressed stop/cancel
    StopRequested,
    /// The decoder produced a symbol
    Decoded(DecodeEvent),
    /// Camera acquisition or streaming failed
    CameraFailed(CameraError),
}

/// Side effects requested by a transition, executed by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Acquire the camera and start streaming frames
    AcquireCamera,
    /// Release the camera and all hardware tracks
    ReleaseCamera,
    /// Play the audible success cue
    PlaySuccessCue,
}

/// Banner shown while in `ErrorShown`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    /// Fatal notices (camera gone) do not auto-clear
    pub fatal: bool,
}

/// Session behavior knobs, derived from [`crate::config::Config`]
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Keep accepted codes across a manual stop/restart
    pub preserve_history: bool,
    /// Comparison key extraction rule
    pub key_rule: KeyRule,
    /// How long an accepted result stays on screen
    pub result_display: Duration,
    /// How long a transient error stays on screen
    pub notice_display: Duration,
    /// How long an advisory stays on screen
    pub advisory_display: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        use crate::constants::timing;
        Self {
            preserve_history: false,
            key_rule: KeyRule::default(),
            result_display: timing::RESULT_DISPLAY,
            notice_display: timing::NOTICE_DISPLAY,
            advisory_display: timing::ADVISORY_DISPLAY,
        }
    }
}

/// One scanning session: state, accepted codes, current banner, pending
/// auto-return deadline.
#[derive(Debug)]
pub struct ScanSession {
    id: Uuid,
    state: SessionState,
    dedup: Deduplicator,
    last_result: Option<String>,
    notice: Option<Notice>,
    /// When the current ResultShown/transient ErrorShown window expires
    deadline: Option<Instant>,
    /// Capability advisory (torch/focus), independent of `state`
    advisory: Option<(String, Instant)>,
    opts: SessionOptions,
}

impl ScanSession {
    /// Create an idle session
    pub fn new(opts: SessionOptions) -> Self {
        let id = Uuid::new_v4();
        info!(session = %id, "Created scan session");
        Self {
            id,
            state: SessionState::Idle,
            dedup: Deduplicator::new(opts.key_rule.clone()),
            last_result: None,
            notice: None,
            deadline: None,
            advisory: None,
            opts,
        }
    }

    /// Session identifier (used for logging and history export)
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Accepted scans in first-seen order
    pub fn records(&self) -> &[ScanRecord] {
        self.dedup.records()
    }

    /// The decoded payload currently displayed (ResultShown only)
    pub fn last_result(&self) -> Option<&str> {
        self.last_result.as_deref()
    }

    /// The error banner currently displayed (ErrorShown only)
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// The capability advisory currently displayed, if any
    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_ref().map(|(text, _)| text.as_str())
    }

    /// Whether the camera should currently be held open.
    ///
    /// The stream stays alive through the transient ResultShown/ErrorShown
    /// windows so scanning resumes without re-acquisition; only Idle and
    /// fatal errors release it.
    pub fn wants_camera(&self) -> bool {
        match self.state {
            SessionState::Idle => false,
            SessionState::Scanning | SessionState::ResultShown => true,
            SessionState::ErrorShown => !self.notice_is_fatal(),
        }
    }

    fn notice_is_fatal(&self) -> bool {
        self.notice.as_ref().map(|n| n.fatal).unwrap_or(false)
    }

    /// Single mutation entry point. Returns the effects the caller must run.
    pub fn apply(&mut self, event: SessionEvent, now: Instant) -> Vec<Effect> {
        match event {
            SessionEvent::StartRequested => self.on_start(),
            SessionEvent::StopRequested => self.on_stop(),
            SessionEvent::Decoded(ev) => self.on_decoded(ev, now),
            SessionEvent::CameraFailed(error) => self.on_camera_failed(error),
        }
    }

    /// Expire the pending display window and advisory. Call once per loop
    /// iteration; cheap when nothing is pending.
    pub fn tick(&mut self, now: Instant) {
        if let Some((_, until)) = &self.advisory
            && now >= *until
        {
            self.advisory = None;
        }

        let Some(deadline) = self.deadline else {
            return;
        };
        if now < deadline {
            return;
        }
        self.deadline = None;

        match self.state {
            SessionState::ResultShown => {
                debug!(session = %self.id, "Result window elapsed, resuming scan");
                self.last_result = None;
                self.state = SessionState::Scanning;
            }
            SessionState::ErrorShown if !self.notice_is_fatal() => {
                debug!(session = %self.id, "Notice window elapsed, resuming scan");
                self.notice = None;
                self.state = SessionState::Scanning;
            }
            // Fatal errors have no deadline; anything else is a stale
            // deadline already invalidated by a transition.
            _ => {}
        }
    }

    /// Post a capability advisory (torch/focus unsupported). Advisory text
    /// is displayed alongside whatever state is active and never changes it.
    pub fn advise(&mut self, text: impl Into<String>, now: Instant) {
        let text = text.into();
        debug!(session = %self.id, advisory = %text, "Capability advisory");
        self.advisory = Some((text, now + self.opts.advisory_display));
    }

    fn on_start(&mut self) -> Vec<Effect> {
        match self.state {
            SessionState::Idle => {
                self.begin_scanning();
                vec![Effect::AcquireCamera]
            }
            SessionState::ErrorShown if self.notice_is_fatal() => {
                // Explicit retry after camera loss
                self.begin_scanning();
                vec![Effect::AcquireCamera]
            }
            SessionState::ErrorShown => {
                // Transient notice: camera is still live, just resume early
                self.notice = None;
                self.deadline = None;
                self.state = SessionState::Scanning;
                vec![]
            }
            _ => vec![],
        }
    }

    fn begin_scanning(&mut self) {
        if !self.opts.preserve_history {
            self.dedup.clear();
        }
        self.last_result = None;
        self.notice = None;
        self.deadline = None;
        self.state = SessionState::Scanning;
        info!(session = %self.id, preserve_history = self.opts.preserve_history, "Scanning started");
    }

    fn on_stop(&mut self) -> Vec<Effect> {
        if self.state == SessionState::Idle {
            return vec![];
        }
        info!(session = %self.id, scanned = self.dedup.len(), "Scanning stopped");
        self.state = SessionState::Idle;
        self.last_result = None;
        self.notice = None;
        self.deadline = None;
        vec![Effect::ReleaseCamera]
    }

    fn on_decoded(&mut self, event: DecodeEvent, now: Instant) -> Vec<Effect> {
        // Decode events are only meaningful while scanning; a late event
        // from a previous poll is dropped.
        if self.state != SessionState::Scanning {
            return vec![];
        }

        match self.dedup.accept(&event) {
            ScanOutcome::Accepted { key } => {
                info!(session = %self.id, key = %key, "Code accepted");
                self.last_result = Some(event.raw_text);
                self.state = SessionState::ResultShown;
                self.deadline = Some(now + self.opts.result_display);
                vec![Effect::PlaySuccessCue]
            }
            ScanOutcome::Duplicate { key } => {
                self.show_transient(format!("Already scanned: {}", key), now);
                vec![]
            }
            ScanOutcome::Malformed(e) => {
                self.show_transient(format!("Unreadable code: {}", e), now);
                vec![]
            }
        }
    }

    fn show_transient(&mut self, text: String, now: Instant) {
        self.notice = Some(Notice { text, fatal: false });
        self.state = SessionState::ErrorShown;
        self.deadline = Some(now + self.opts.notice_display);
    }

    fn on_camera_failed(&mut self, error: CameraError) -> Vec<Effect> {
        info!(session = %self.id, error = %error, "Camera failed");
        self.notice = Some(Notice {
            text: error.to_string(),
            fatal: true,
        });
        self.last_result = None;
        self.state = SessionState::ErrorShown;
        // No deadline: fatal errors wait for explicit user action
        self.deadline = None;
        vec![Effect::ReleaseCamera]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn event(raw: &str) -> SessionEvent {
        SessionEvent::Decoded(DecodeEvent {
            raw_text: raw.to_string(),
            at: Local::now(),
        })
    }

    fn session() -> ScanSession {
        ScanSession::new(SessionOptions::default())
    }

    #[test]
    fn test_start_acquires_camera() {
        let mut s = session();
        let now = Instant::now();
        let effects = s.apply(SessionEvent::StartRequested, now);
        assert_eq!(effects, vec![Effect::AcquireCamera]);
        assert_eq!(s.state(), SessionState::Scanning);
    }

    #[test]
    fn test_accept_then_auto_return() {
        let mut s = session();
        let now = Instant::now();
        s.apply(SessionEvent::StartRequested, now);

        let effects = s.apply(event("PKG-1"), now);
        assert_eq!(effects, vec![Effect::PlaySuccessCue]);
        assert_eq!(s.state(), SessionState::ResultShown);
        assert_eq!(s.last_result(), Some("PKG-1"));

        // Window not yet elapsed
        s.tick(now + Duration::from_millis(1499));
        assert_eq!(s.state(), SessionState::ResultShown);

        s.tick(now + Duration::from_millis(1500));
        assert_eq!(s.state(), SessionState::Scanning);
        assert_eq!(s.last_result(), None);
    }

    #[test]
    fn test_duplicate_is_transient_and_keeps_camera() {
        let mut s = session();
        let now = Instant::now();
        s.apply(SessionEvent::StartRequested, now);
        s.apply(event("PKG-1"), now);
        s.tick(now + Duration::from_millis(1500));

        let effects = s.apply(event("PKG-1"), now + Duration::from_millis(1600));
        assert!(effects.is_empty());
        assert_eq!(s.state(), SessionState::ErrorShown);
        assert!(s.wants_camera(), "duplicate must not interrupt the stream");

        s.tick(now + Duration::from_millis(3100));
        assert_eq!(s.state(), SessionState::Scanning);
        assert_eq!(s.records().len(), 1);
    }

    #[test]
    fn test_decode_ignored_outside_scanning() {
        let mut s = session();
        let now = Instant::now();
        assert!(s.apply(event("PKG-1"), now).is_empty());
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.records().is_empty());
    }

    #[test]
    fn test_camera_failure_is_fatal() {
        let mut s = session();
        let now = Instant::now();
        s.apply(SessionEvent::StartRequested, now);
        s.apply(event("PKG-1"), now);

        let effects = s.apply(SessionEvent::CameraFailed(CameraError::Disconnected), now);
        assert_eq!(effects, vec![Effect::ReleaseCamera]);
        assert_eq!(s.state(), SessionState::ErrorShown);
        assert!(!s.wants_camera());
        // No auto-clear, ever
        s.tick(now + Duration::from_secs(60));
        assert_eq!(s.state(), SessionState::ErrorShown);
        // Accepted codes survive the failure
        assert_eq!(s.records().len(), 1);
    }

    #[test]
    fn test_retry_after_fatal_error() {
        let mut s = session();
        let now = Instant::now();
        s.apply(SessionEvent::StartRequested, now);
        s.apply(
            SessionEvent::CameraFailed(CameraError::Unavailable("busy".to_string())),
            now,
        );

        let effects = s.apply(SessionEvent::StartRequested, now);
        assert_eq!(effects, vec![Effect::AcquireCamera]);
        assert_eq!(s.state(), SessionState::Scanning);
        assert!(s.notice().is_none());
    }

    #[test]
    fn test_stale_deadline_cannot_fire_into_new_state() {
        let mut s = session();
        let now = Instant::now();
        s.apply(SessionEvent::StartRequested, now);
        s.apply(event("PKG-1"), now);
        assert_eq!(s.state(), SessionState::ResultShown);

        // User stops before the result window elapses; the pending
        // deadline is cancelled with the transition.
        s.apply(SessionEvent::StopRequested, now + Duration::from_millis(100));
        assert_eq!(s.state(), SessionState::Idle);
        s.tick(now + Duration::from_secs(10));
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn test_history_reset_vs_preserved_on_restart() {
        let now = Instant::now();

        let mut reset = session();
        reset.apply(SessionEvent::StartRequested, now);
        reset.apply(event("PKG-1"), now);
        reset.apply(SessionEvent::StopRequested, now);
        reset.apply(SessionEvent::StartRequested, now);
        assert!(reset.records().is_empty());

        let mut kept = ScanSession::new(SessionOptions {
            preserve_history: true,
            ..SessionOptions::default()
        });
        kept.apply(SessionEvent::StartRequested, now);
        kept.apply(event("PKG-1"), now);
        kept.apply(SessionEvent::StopRequested, now);
        kept.apply(SessionEvent::StartRequested, now);
        assert_eq!(kept.records().len(), 1);
    }

    #[test]
    fn test_advisory_does_not_change_state() {
        let mut s = session();
        let now = Instant::now();
        s.apply(SessionEvent::StartRequested, now);
        s.apply(event("PKG-1"), now);
        s.tick(now + Duration::from_millis(1500));

        s.advise("Torch not supported on this device", now);
        assert_eq!(s.state(), SessionState::Scanning);
        assert_eq!(s.records().len(), 1);
        assert_eq!(s.advisory(), Some("Torch not supported on this device"));

        s.tick(now + Duration::from_secs(10));
        assert_eq!(s.advisory(), None);
        assert_eq!(s.state(), SessionState::Scanning);
    }
}
