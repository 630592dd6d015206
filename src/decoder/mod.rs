// SPDX-License-Identifier: GPL-3.0-only

//! Symbol decoding
//!
//! Frame-to-text decoding is delegated to the rqrr crate; this module only
//! converts camera frames into the grayscale image rqrr expects and wraps
//! its output in a [`DecodeEvent`]. A frame without a symbol is not an
//! error, it simply produces nothing.

use crate::backends::camera::CameraFrame;
use crate::constants::decode;
use crate::errors::{ScanError, ScanResult};
use chrono::{DateTime, Local};
use image::GrayImage;
use std::path::Path;
use tracing::{debug, trace};

/// One successful frame-to-text decoding result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeEvent {
    /// Raw decoded payload
    pub raw_text: String,
    /// When the symbol was decoded
    pub at: DateTime<Local>,
}

/// A source of decode events, polled by the UI loop at a fixed cadence.
///
/// Implementations return at most one event per invocation; `None` means
/// no symbol was found in the frame.
pub trait SymbolDecoder {
    fn decode_frame(&mut self, frame: &CameraFrame) -> Option<DecodeEvent>;
}

/// QR decoder backed by rqrr.
///
/// Frames are converted to grayscale and downscaled before detection to
/// keep the per-poll cost well under the poll interval.
pub struct QrDecoder {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDecoder {
    /// Create a decoder with the default processing resolution
    pub fn new() -> Self {
        Self {
            max_dimension: decode::MAX_DIMENSION,
        }
    }

    /// Create a decoder with a custom maximum processing dimension
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

impl SymbolDecoder for QrDecoder {
    fn decode_frame(&mut self, frame: &CameraFrame) -> Option<DecodeEvent> {
        let start = std::time::Instant::now();
        let gray = frame_to_gray(frame, self.max_dimension);

        let mut prepared = rqrr::PreparedImage::prepare(gray);
        let grids = prepared.detect_grids();
        trace!(
            count = grids.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Decode poll"
        );

        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) => {
                    debug!(content = %content, "Decoded symbol");
                    return Some(DecodeEvent {
                        raw_text: content,
                        at: Local::now(),
                    });
                }
                Err(e) => {
                    // Grid detected but unreadable (damage, motion blur);
                    // treated the same as no detection.
                    debug!(error = %e, "Failed to decode detected grid");
                }
            }
        }

        None
    }
}

/// Decode all symbols in a still image file (the `decode` subcommand)
pub fn decode_image_file(path: &Path) -> ScanResult<Vec<String>> {
    let img = image::open(path)
        .map_err(|e| ScanError::Other(format!("Cannot open {}: {}", path.display(), e)))?
        .to_luma8();

    let mut prepared = rqrr::PreparedImage::prepare(img);
    let mut contents = Vec::new();
    for grid in prepared.detect_grids() {
        match grid.decode() {
            Ok((_meta, content)) => contents.push(content),
            Err(e) => debug!(error = %e, "Skipping undecodable grid"),
        }
    }
    Ok(contents)
}

/// Convert an RGBA camera frame to grayscale, downscaling if either
/// dimension exceeds `max_dimension`. Stride padding is handled during
/// sampling, so no intermediate copy is made.
fn frame_to_gray(frame: &CameraFrame, max_dimension: u32) -> GrayImage {
    let (dst_width, dst_height) = if frame.width > max_dimension || frame.height > max_dimension {
        let scale = (frame.width as f32 / max_dimension as f32)
            .max(frame.height as f32 / max_dimension as f32);
        (
            ((frame.width as f32 / scale) as u32).max(1),
            ((frame.height as f32 / scale) as u32).max(1),
        )
    } else {
        (frame.width, frame.height)
    };

    let x_ratio = frame.width as f32 / dst_width as f32;
    let y_ratio = frame.height as f32 / dst_height as f32;
    let stride = frame.stride as usize;
    let data = &frame.data;

    GrayImage::from_fn(dst_width, dst_height, |x, y| {
        let src_x = ((x as f32 * x_ratio) as usize).min(frame.width as usize - 1);
        let src_y = ((y as f32 * y_ratio) as usize).min(frame.height as usize - 1);
        let idx = src_y * stride + src_x * 4;
        if idx + 2 >= data.len() {
            return image::Luma([0]);
        }
        // BT.601 luma weights, integer arithmetic
        let r = data[idx] as u32;
        let g = data[idx + 1] as u32;
        let b = data[idx + 2] as u32;
        image::Luma([((77 * r + 150 * g + 29 * b) >> 8) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn solid_frame(width: u32, height: u32, rgba: [u8; 4]) -> CameraFrame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&rgba);
        }
        CameraFrame {
            width,
            height,
            stride: width * 4,
            data: Arc::from(data.as_slice()),
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_frame_to_gray_dimensions() {
        let frame = solid_frame(8, 4, [255, 255, 255, 255]);
        let gray = frame_to_gray(&frame, 640);
        assert_eq!(gray.dimensions(), (8, 4));
        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn test_frame_to_gray_downscales() {
        let frame = solid_frame(200, 100, [0, 0, 0, 255]);
        let gray = frame_to_gray(&frame, 50);
        assert_eq!(gray.dimensions(), (50, 25));
        assert_eq!(gray.get_pixel(10, 10).0[0], 0);
    }

    #[test]
    fn test_frame_to_gray_handles_stride_padding() {
        // 2x2 frame with 4 bytes of padding per row
        let data: Vec<u8> = vec![
            255, 255, 255, 255, 0, 0, 0, 255, // row 0 pixels
            9, 9, 9, 9, // row 0 padding
            0, 0, 0, 255, 255, 255, 255, 255, // row 1 pixels
            9, 9, 9, 9, // row 1 padding
        ];
        let frame = CameraFrame {
            width: 2,
            height: 2,
            stride: 12,
            data: Arc::from(data.as_slice()),
            captured_at: Instant::now(),
        };
        let gray = frame_to_gray(&frame, 640);
        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
        assert_eq!(gray.get_pixel(1, 0).0[0], 0);
        assert_eq!(gray.get_pixel(0, 1).0[0], 0);
        assert_eq!(gray.get_pixel(1, 1).0[0], 255);
    }

    #[test]
    fn test_blank_frame_decodes_nothing() {
        let mut decoder = QrDecoder::new();
        let frame = solid_frame(64, 64, [255, 255, 255, 255]);
        assert!(decoder.decode_frame(&frame).is_none());
    }
}
