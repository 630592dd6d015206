// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer capture pipeline
//!
//! Builds a `pipewiresrc`/`v4l2src` pipeline that converts everything to
//! RGBA and hands frames to an appsink callback, which forwards them over
//! a bounded channel. All format negotiation and decoding is GStreamer's
//! problem; this module only configures the pipeline and copies frames out.

use super::{
    BackendError, BackendResult, CameraDevice, CameraFrame, FrameSender, ResolutionHints,
    StreamHealth,
};
use crate::constants::timing;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Live capture pipeline feeding RGBA frames into a channel
pub struct CapturePipeline {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
    health: StreamHealth,
}

impl CapturePipeline {
    /// Create and start a capture pipeline for the given device
    pub fn new(
        device: &CameraDevice,
        hints: ResolutionHints,
        frame_sender: FrameSender,
    ) -> BackendResult<Self> {
        gstreamer::init().map_err(|e| BackendError::NotAvailable(e.to_string()))?;

        let description = build_pipeline_description(device, hints);
        info!(device = %device.name, pipeline = %description, "Creating capture pipeline");

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| {
                BackendError::InitializationFailed("Parsed element is not a pipeline".to_string())
            })?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| {
                BackendError::InitializationFailed("Failed to get appsink".to_string())
            })?
            .dynamic_cast::<AppSink>()
            .map_err(|_| {
                BackendError::InitializationFailed("Failed to cast appsink".to_string())
            })?;

        // Lowest latency: never block the camera on a slow consumer
        appsink.set_property("sync", false);
        appsink.set_property("max-buffers", 2u32);
        appsink.set_property("drop", true);
        appsink.set_property("enable-last-sample", false);

        let health = StreamHealth::new();
        let sample_health = health.clone();
        let eos_health = health.clone();

        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let frame_start = Instant::now();
                    let frame_num = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);

                    let sample = appsink.pull_sample().map_err(|e| {
                        error!(frame = frame_num, error = ?e, "Failed to pull sample");
                        sample_health.mark_lost();
                        gstreamer::FlowError::Eos
                    })?;

                    // Returning FlowError kills the stream, so every error
                    // branch also flips the health flag.
                    let fail = |health: &StreamHealth| {
                        health.mark_lost();
                        gstreamer::FlowError::Error
                    };
                    let buffer = sample.buffer().ok_or_else(|| fail(&sample_health))?;
                    let caps = sample.caps().ok_or_else(|| fail(&sample_health))?;
                    let video_info =
                        VideoInfo::from_caps(caps).map_err(|_| fail(&sample_health))?;
                    let map = buffer.map_readable().map_err(|_| fail(&sample_health))?;

                    let frame = CameraFrame {
                        width: video_info.width(),
                        height: video_info.height(),
                        stride: video_info.stride()[0] as u32,
                        data: Arc::from(map.as_slice()),
                        captured_at: frame_start,
                    };

                    // Non-blocking send; dropping a frame is fine, the
                    // consumer only ever wants the newest one.
                    let mut sender = frame_sender.clone();
                    if let Err(e) = sender.try_send(frame)
                        && frame_num % 60 == 0
                    {
                        debug!(frame = frame_num, error = ?e, "Frame dropped (channel full)");
                    }

                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .eos(move |_| {
                    warn!("Capture stream ended");
                    eos_health.mark_lost();
                })
                .build(),
        );

        pipeline.set_state(gstreamer::State::Playing).map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to start pipeline: {}", e))
        })?;

        // Wait for the state change so acquisition failures surface here,
        // not as a silent black preview.
        let (result, state, _pending) = pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::START_TIMEOUT_SECS,
        ));
        if result.is_err() || state != gstreamer::State::Playing {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(BackendError::InitializationFailed(format!(
                "Pipeline did not reach PLAYING (state: {:?})",
                state
            )));
        }

        info!(device = %device.name, "Capture pipeline playing");
        Ok(Self {
            pipeline,
            appsink,
            health,
        })
    }

    /// Whether the stream is still delivering frames.
    ///
    /// Checks the callback-side health flag and drains pipeline bus errors:
    /// a source that dies mid-stream (device unplugged) posts an error on
    /// the bus rather than failing a sample callback.
    pub fn is_healthy(&self) -> bool {
        if !self.health.is_live() {
            return false;
        }

        if let Some(bus) = self.pipeline.bus() {
            while let Some(msg) = bus.pop_filtered(&[
                gstreamer::MessageType::Error,
                gstreamer::MessageType::Eos,
            ]) {
                match msg.view() {
                    gstreamer::MessageView::Error(err) => {
                        error!(error = %err.error(), "Capture pipeline error");
                    }
                    _ => warn!("Capture pipeline reached end of stream"),
                }
                self.health.mark_lost();
            }
        }

        self.health.is_live()
    }

    /// Stop the pipeline and release the device
    pub fn stop(self) {
        debug!("Stopping capture pipeline");

        // Clear callbacks first so no sample handler runs during teardown
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());

        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(error = %e, "Failed to stop pipeline");
            return;
        }

        // Wait for the device to actually be released so an immediate
        // restart does not race the old stream.
        let (result, state, _) = self
            .pipeline
            .state(gstreamer::ClockTime::from_seconds(timing::STOP_TIMEOUT_SECS));
        match result {
            Ok(_) => info!(state = ?state, "Capture pipeline stopped"),
            Err(e) => debug!(error = ?e, state = ?state, "Pipeline stop had issues"),
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}

/// Build the gst-launch description for a device.
///
/// `videoscale` makes the requested resolution always satisfiable, so the
/// ideal hint is applied directly; the minimum hint only matters when the
/// ideal is not configured.
fn build_pipeline_description(device: &CameraDevice, hints: ResolutionHints) -> String {
    let source = match device.api.as_str() {
        "pipewire" if !device.target.is_empty() => {
            format!("pipewiresrc target-object={}", device.target)
        }
        "v4l2" if !device.target.is_empty() => {
            format!("v4l2src device={}", device.target)
        }
        _ => {
            // Auto-selection: prefer PipeWire when present
            if gstreamer::ElementFactory::find("pipewiresrc").is_some() {
                "pipewiresrc".to_string()
            } else if gstreamer::ElementFactory::find("v4l2src").is_some() {
                "v4l2src".to_string()
            } else {
                "autovideosrc".to_string()
            }
        }
    };

    let (width, height) = if hints.ideal_width > 0 && hints.ideal_height > 0 {
        (hints.ideal_width, hints.ideal_height)
    } else {
        (hints.min_width, hints.min_height)
    };

    format!(
        "{} ! videoconvert ! videoscale ! \
         video/x-raw,format=RGBA,width={},height={} ! \
         appsink name=sink",
        source, width, height
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_description_for_v4l2_device() {
        let device = CameraDevice {
            name: "Test".to_string(),
            api: "v4l2".to_string(),
            target: "/dev/video2".to_string(),
            v4l2_path: Some("/dev/video2".to_string()),
        };
        let desc = build_pipeline_description(&device, ResolutionHints::default());
        assert!(desc.starts_with("v4l2src device=/dev/video2 !"));
        assert!(desc.contains("format=RGBA"));
        assert!(desc.contains("width=1280,height=720"));
        assert!(desc.ends_with("appsink name=sink"));
    }

    #[test]
    fn test_pipeline_description_for_pipewire_device() {
        let device = CameraDevice {
            name: "Test".to_string(),
            api: "pipewire".to_string(),
            target: "51".to_string(),
            v4l2_path: None,
        };
        let desc = build_pipeline_description(&device, ResolutionHints::default());
        assert!(desc.starts_with("pipewiresrc target-object=51 !"));
    }

    #[test]
    fn test_pipeline_description_falls_back_to_minimum_hint() {
        let device = CameraDevice {
            name: "Test".to_string(),
            api: "v4l2".to_string(),
            target: "/dev/video0".to_string(),
            v4l2_path: None,
        };
        let hints = ResolutionHints {
            ideal_width: 0,
            ideal_height: 0,
            min_width: 640,
            min_height: 480,
        };
        let desc = build_pipeline_description(&device, hints);
        assert!(desc.contains("width=640,height=480"));
    }
}
