// SPDX-License-Identifier: GPL-3.0-only

//! Scan history export
//!
//! Writes the accepted scans of a session to a timestamped JSON file in
//! the user data directory. Export is explicit (the `e` key); nothing is
//! persisted automatically.

use crate::errors::{ScanError, ScanResult};
use crate::session::ScanRecord;
use chrono::Local;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

#[derive(Serialize)]
struct ExportedScan<'a> {
    key: &'a str,
    raw_text: &'a str,
    scanned_at: String,
}

#[derive(Serialize)]
struct ExportedHistory<'a> {
    session_id: String,
    exported_at: String,
    scans: Vec<ExportedScan<'a>>,
}

/// Directory scan exports are written to, created on demand
pub fn data_dir() -> ScanResult<PathBuf> {
    let dir = dirs::data_dir()
        .ok_or_else(|| ScanError::Storage("No data directory available".to_string()))?
        .join("pkgscan");
    std::fs::create_dir_all(&dir)
        .map_err(|e| ScanError::Storage(format!("Cannot create {}: {}", dir.display(), e)))?;
    Ok(dir)
}

/// Write the session's scan history as JSON, returning the file path
pub fn save_history(session_id: Uuid, records: &[ScanRecord]) -> ScanResult<PathBuf> {
    let now = Local::now();
    let path = data_dir()?.join(format!("scans_{}.json", now.format("%Y%m%d_%H%M%S")));

    let export = ExportedHistory {
        session_id: session_id.to_string(),
        exported_at: now.to_rfc3339(),
        scans: records
            .iter()
            .map(|r| ExportedScan {
                key: &r.key,
                raw_text: &r.raw_text,
                scanned_at: r.scanned_at.to_rfc3339(),
            })
            .collect(),
    };

    let json = serde_json::to_string_pretty(&export)
        .map_err(|e| ScanError::Storage(format!("Serialization failed: {}", e)))?;
    std::fs::write(&path, json)
        .map_err(|e| ScanError::Storage(format!("Cannot write {}: {}", path.display(), e)))?;

    info!(path = %path.display(), scans = records.len(), "Exported scan history");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    #[test]
    fn test_export_serialization_shape() {
        let records = vec![ScanRecord {
            key: "PKG-1".to_string(),
            raw_text: "PKG-1,depot".to_string(),
            scanned_at: Local::now(),
        }];
        let export = ExportedHistory {
            session_id: Uuid::nil().to_string(),
            exported_at: Local::now().to_rfc3339(),
            scans: records
                .iter()
                .map(|r| ExportedScan {
                    key: &r.key,
                    raw_text: &r.raw_text,
                    scanned_at: r.scanned_at.to_rfc3339(),
                })
                .collect(),
        };
        let json = serde_json::to_string(&export).unwrap();
        assert!(json.contains("\"key\":\"PKG-1\""));
        assert!(json.contains("\"raw_text\":\"PKG-1,depot\""));
        assert!(json.contains("00000000-0000-0000-0000-000000000000"));
    }
}
