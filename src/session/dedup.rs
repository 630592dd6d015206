// SPDX-License-Identifier: GPL-3.0-only

//! Scan deduplication
//!
//! Maintains the set of codes already accepted in the current session and
//! decides accept/reject for each decode event. Key extraction is a
//! validated rule rather than a blind positional split: payloads that do
//! not match the configured rule are rejected as malformed instead of
//! producing empty or panicking keys.

use crate::decoder::DecodeEvent;
use crate::errors::PayloadError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// How the comparison key is extracted from a decoded payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum KeyRule {
    /// The entire raw text is the key
    #[default]
    FullText,
    /// A delimiter-separated field is the key (e.g. split on ',' take index 1)
    Field { delimiter: char, index: usize },
}

impl KeyRule {
    /// Extract the comparison key from a raw payload.
    ///
    /// `Field` rules validate that the delimited field exists and is
    /// non-empty after trimming; `FullText` only requires a non-empty
    /// payload.
    pub fn extract<'a>(&self, raw: &'a str) -> Result<&'a str, PayloadError> {
        match self {
            KeyRule::FullText => {
                let key = raw.trim();
                if key.is_empty() {
                    return Err(PayloadError::EmptyKey { index: 0 });
                }
                Ok(key)
            }
            KeyRule::Field { delimiter, index } => {
                let mut fields = raw.split(*delimiter);
                let Some(field) = fields.nth(*index) else {
                    let found = raw.split(*delimiter).count();
                    return Err(PayloadError::MissingField {
                        index: *index,
                        found,
                    });
                };
                let key = field.trim();
                if key.is_empty() {
                    return Err(PayloadError::EmptyKey { index: *index });
                }
                Ok(key)
            }
        }
    }
}

/// One accepted scan, in scan order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    /// Comparison key extracted by the configured rule
    pub key: String,
    /// Full decoded payload
    pub raw_text: String,
    /// When the symbol was decoded
    pub scanned_at: DateTime<Local>,
}

/// Outcome of submitting one decode event to the deduplicator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// New code, appended to the session history
    Accepted { key: String },
    /// Key already present in this session; history unchanged
    Duplicate { key: String },
    /// Key extraction failed; history unchanged
    Malformed(PayloadError),
}

/// Per-session deduplicator.
///
/// `accept` is the only mutation entry point, so the check-and-insert is
/// atomic as long as the caller drives it from a single thread (which the
/// terminal event loop does).
#[derive(Debug)]
pub struct Deduplicator {
    rule: KeyRule,
    records: Vec<ScanRecord>,
    keys: HashSet<String>,
}

impl Deduplicator {
    /// Create an empty deduplicator with the given key rule
    pub fn new(rule: KeyRule) -> Self {
        Self {
            rule,
            records: Vec::new(),
            keys: HashSet::new(),
        }
    }

    /// Check-and-insert for one decode event
    pub fn accept(&mut self, event: &DecodeEvent) -> ScanOutcome {
        let key = match self.rule.extract(&event.raw_text) {
            Ok(key) => key.to_string(),
            Err(e) => {
                debug!(raw = %event.raw_text, error = %e, "Rejecting malformed payload");
                return ScanOutcome::Malformed(e);
            }
        };

        if self.keys.contains(&key) {
            debug!(key = %key, "Rejecting duplicate code");
            return ScanOutcome::Duplicate { key };
        }

        self.keys.insert(key.clone());
        self.records.push(ScanRecord {
            key: key.clone(),
            raw_text: event.raw_text.clone(),
            scanned_at: event.at,
        });

        ScanOutcome::Accepted { key }
    }

    /// Accepted scans in first-seen order
    pub fn records(&self) -> &[ScanRecord] {
        &self.records
    }

    /// Accepted keys in first-seen order
    pub fn keys_in_order(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.key.as_str()).collect()
    }

    /// Number of accepted codes
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no codes have been accepted yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Forget all accepted codes (manual session restart without history)
    pub fn clear(&mut self) {
        self.records.clear();
        self.keys.clear();
    }
}
