// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use pkgscan::Config;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "pkgscan")]
#[command(about = "Terminal QR and barcode scanner for package tracking")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Camera to use (substring match against 'pkgscan list' names)
    #[arg(short, long)]
    camera: Option<String>,

    /// Keep scanned codes across stop/restart within the session
    #[arg(long)]
    keep_history: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Decode symbols from an image file
    Decode {
        /// Image file to decode
        image: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=pkgscan=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let args = Cli::parse();

    match args.command {
        Some(Commands::List) => cli::list_cameras(),
        Some(Commands::Decode { image }) => cli::decode_image(&image),
        None => {
            let mut config = Config::load();
            if args.camera.is_some() {
                config.preferred_camera = args.camera;
            }
            if args.keep_history {
                config.preserve_history = true;
            }
            pkgscan::terminal::run(config)
        }
    }
}
