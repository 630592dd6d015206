// SPDX-License-Identifier: GPL-3.0-only

//! Scan session logic: deduplication and the UI state machine

pub mod dedup;
pub mod state;

pub use dedup::{Deduplicator, KeyRule, ScanOutcome, ScanRecord};
pub use state::{Effect, Notice, ScanSession, SessionEvent, SessionOptions, SessionState};
