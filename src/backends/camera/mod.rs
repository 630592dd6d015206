// SPDX-License-Identifier: GPL-3.0-only

//! Camera capture backend
//!
//! A [`CameraSession`] exclusively owns the GStreamer capture pipeline for
//! one scanning session: it is created by `start`, delivers RGBA frames
//! through a bounded channel, and releases all hardware tracks on `stop`
//! (idempotent, also run on drop). Torch and focus reach the hardware
//! through their own narrow controllers and never touch the frame path.

pub mod enumeration;
pub mod focus;
pub mod pipeline;
pub mod torch;

pub use enumeration::enumerate_cameras;
pub use focus::FocusController;
pub use torch::TorchController;

use crate::constants::capture;
use pipeline::CapturePipeline;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Liveness flag shared between the capture callbacks and the session.
///
/// The appsink callbacks run on a GStreamer streaming thread; the session
/// polls from the UI thread, so the flag is the only cross-thread state.
#[derive(Debug, Clone, Default)]
pub struct StreamHealth {
    lost: Arc<AtomicBool>,
}

impl StreamHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the stream has died (sample error, EOS, or bus error)
    pub fn mark_lost(&self) {
        self.lost.store(true, Ordering::Release);
    }

    /// Whether the stream is still expected to deliver frames
    pub fn is_live(&self) -> bool {
        !self.lost.load(Ordering::Acquire)
    }
}

/// A camera device discovered through the GStreamer device monitor
#[derive(Debug, Clone)]
pub struct CameraDevice {
    /// Human-readable name
    pub name: String,
    /// Source API ("pipewire", "v4l2", or empty for auto-selection)
    pub api: String,
    /// API-specific target (PipeWire object serial or /dev/videoN);
    /// empty lets the source element auto-select
    pub target: String,
    /// V4L2 device node, when known. Needed for focus control.
    pub v4l2_path: Option<String>,
}

impl CameraDevice {
    /// Placeholder device that lets the capture source auto-select
    pub fn auto() -> Self {
        Self {
            name: "Default Camera".to_string(),
            api: String::new(),
            target: String::new(),
            v4l2_path: None,
        }
    }
}

/// Resolution hints for pipeline negotiation
#[derive(Debug, Clone, Copy)]
pub struct ResolutionHints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for ResolutionHints {
    fn default() -> Self {
        Self {
            ideal_width: capture::IDEAL_WIDTH,
            ideal_height: capture::IDEAL_HEIGHT,
            min_width: capture::MIN_WIDTH,
            min_height: capture::MIN_HEIGHT,
        }
    }
}

/// A single RGBA frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// RGBA pixel data
    pub data: Arc<[u8]>,
    /// When the frame left the pipeline (for latency diagnostics)
    pub captured_at: Instant,
}

/// Frame receiver for the capture stream
pub type FrameReceiver = futures::channel::mpsc::Receiver<CameraFrame>;

/// Frame sender for the capture stream
pub type FrameSender = futures::channel::mpsc::Sender<CameraFrame>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone)]
pub enum BackendError {
    /// GStreamer or the capture source is not available on this system
    NotAvailable(String),
    /// Failed to bring the pipeline up
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// Owns the live capture stream for one scanning session
pub struct CameraSession {
    pipeline: Option<CapturePipeline>,
    receiver: FrameReceiver,
    device: CameraDevice,
}

impl CameraSession {
    /// Acquire the camera and start streaming frames.
    ///
    /// Fails with `BackendError` when the device cannot be opened
    /// (permissions, busy, unsatisfiable constraints); the caller surfaces
    /// this as a fatal session error.
    pub fn start(device: &CameraDevice, hints: ResolutionHints) -> BackendResult<Self> {
        let (sender, receiver) = futures::channel::mpsc::channel(capture::FRAME_CHANNEL_CAPACITY);
        let pipeline = CapturePipeline::new(device, hints, sender)?;
        info!(device = %device.name, "Camera session started");
        Ok(Self {
            pipeline: Some(pipeline),
            receiver,
            device: device.clone(),
        })
    }

    /// The device this session was opened on
    pub fn device(&self) -> &CameraDevice {
        &self.device
    }

    /// Whether the pipeline is held and the stream is still alive.
    ///
    /// A device that disappears mid-stream (unplugged, claimed by another
    /// process) stops delivering without any call into this session; the
    /// pipeline reports that through its health flag and bus, and the
    /// caller surfaces it as a camera failure.
    pub fn is_active(&self) -> bool {
        self.pipeline.as_ref().is_some_and(|p| p.is_healthy())
    }

    /// Drain the frame channel, returning only the newest frame.
    ///
    /// The scanner never wants stale frames; anything older than the most
    /// recent delivery is dropped here.
    pub fn latest_frame(&mut self) -> Option<CameraFrame> {
        let mut latest = None;
        while let Ok(Some(frame)) = self.receiver.try_next() {
            latest = Some(frame);
        }
        latest
    }

    /// Release all underlying hardware tracks.
    ///
    /// Idempotent: safe to call repeatedly and safe even if `start` never
    /// produced a live pipeline (the pipeline slot is simply empty).
    pub fn stop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.stop();
            info!(device = %self.device.name, "Camera session stopped");
        } else {
            debug!(device = %self.device.name, "Camera session already stopped");
        }
        // Drop anything still queued so a later start cannot observe
        // frames from the released stream.
        while let Ok(Some(_)) = self.receiver.try_next() {}
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_health_shared_across_clones() {
        let health = StreamHealth::new();
        let callback_side = health.clone();
        assert!(health.is_live());

        // The streaming thread's clone flips the session's view
        callback_side.mark_lost();
        assert!(!health.is_live());
    }
}
