// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! Non-interactive entry points: listing cameras and decoding symbols from
//! a still image file.

use pkgscan::backends::camera::enumerate_cameras;
use pkgscan::decoder::decode_image_file;
use std::path::Path;

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let cameras = enumerate_cameras();

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        let api = if camera.api.is_empty() {
            "auto"
        } else {
            &camera.api
        };
        println!("  [{}] {} ({})", index, camera.name, api);
        if let Some(path) = &camera.v4l2_path {
            println!("      device: {}", path);
        }
    }

    Ok(())
}

/// Decode all symbols in an image file and print them one per line
pub fn decode_image(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let contents = decode_image_file(path)?;

    if contents.is_empty() {
        return Err(format!("No decodable symbols in {}", path.display()).into());
    }

    for content in contents {
        println!("{}", content);
    }

    Ok(())
}
