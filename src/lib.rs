// SPDX-License-Identifier: GPL-3.0-only

//! pkgscan - terminal QR and barcode scanner for package tracking
//!
//! Scans codes from a live camera feed, deduplicates them within a
//! session, and shows each accepted code with its package status.
//!
//! # Architecture
//!
//! - [`session`]: deduplication and the scanning state machine (pure,
//!   hardware-free)
//! - [`backends`]: camera capture, torch and focus control
//! - [`decoder`]: frame-to-text symbol decoding
//! - [`terminal`]: the interactive UI event loop
//! - [`config`]: user configuration handling
//! - [`storage`]: scan history export

pub mod backends;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod errors;
pub mod feedback;
pub mod session;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use config::Config;
pub use decoder::DecodeEvent;
pub use errors::{ScanError, ScanResult};
pub use session::{Effect, ScanSession, SessionEvent, SessionState};
