// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner application

use std::fmt;

/// Result type alias using ScanError
pub type ScanResult<T> = Result<T, ScanError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum ScanError {
    /// Camera-related errors (fatal to the current session)
    Camera(CameraError),
    /// Device capability errors (torch/focus; advisory, never fatal)
    Capability(CapabilityError),
    /// Payload key-extraction errors (transient, auto-recovering)
    Payload(PayloadError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Camera-specific errors.
///
/// All variants are fatal to the running scan session: the stream is gone
/// and the user must explicitly retry.
#[derive(Debug, Clone)]
pub enum CameraError {
    /// Camera could not be acquired (permissions, busy, constraints)
    Unavailable(String),
    /// Camera disconnected during operation
    Disconnected,
}

/// Device capability errors.
///
/// Best-effort controls: failure is reported as a notice and never alters
/// the scanning state.
#[derive(Debug, Clone)]
pub enum CapabilityError {
    /// No controllable torch/flash LED on this device
    TorchUnsupported,
    /// Torch hardware exists but the write failed
    TorchFailed(String),
    /// No focus control on this device
    FocusUnsupported,
    /// Focus control exists but the request failed
    FocusFailed(String),
}

/// Payload key-extraction errors.
///
/// Produced when a configured field rule cannot extract a valid comparison
/// key from a decoded symbol. Handled like a duplicate: transient notice,
/// scanning continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// The payload has fewer delimited fields than the configured index
    MissingField {
        /// Configured field index
        index: usize,
        /// Number of fields actually present
        found: usize,
    },
    /// The configured field exists but is empty
    EmptyKey { index: usize },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Camera(e) => write!(f, "Camera error: {}", e),
            ScanError::Capability(e) => write!(f, "Capability error: {}", e),
            ScanError::Payload(e) => write!(f, "Payload error: {}", e),
            ScanError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ScanError::Storage(msg) => write!(f, "Storage error: {}", msg),
            ScanError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::Unavailable(msg) => write!(f, "Camera unavailable: {}", msg),
            CameraError::Disconnected => write!(f, "Camera disconnected"),
        }
    }
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityError::TorchUnsupported => write!(f, "Torch not supported on this device"),
            CapabilityError::TorchFailed(msg) => write!(f, "Torch control failed: {}", msg),
            CapabilityError::FocusUnsupported => write!(f, "Focus not supported on this device"),
            CapabilityError::FocusFailed(msg) => write!(f, "Focus request failed: {}", msg),
        }
    }
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::MissingField { index, found } => write!(
                f,
                "Payload field {} not present ({} fields found)",
                index, found
            ),
            PayloadError::EmptyKey { index } => {
                write!(f, "Payload field {} is empty", index)
            }
        }
    }
}

impl std::error::Error for ScanError {}
impl std::error::Error for CameraError {}
impl std::error::Error for CapabilityError {}
impl std::error::Error for PayloadError {}

// Conversions from sub-errors to ScanError
impl From<CameraError> for ScanError {
    fn from(err: CameraError) -> Self {
        ScanError::Camera(err)
    }
}

impl From<CapabilityError> for ScanError {
    fn from(err: CapabilityError) -> Self {
        ScanError::Capability(err)
    }
}

impl From<PayloadError> for ScanError {
    fn from(err: PayloadError) -> Self {
        ScanError::Payload(err)
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::Storage(err.to_string())
    }
}
