// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Seqplay CLI
//!
//! Plays recorded camera sequences into the frame-log engine.
//!
//! ## Usage
//!
//! ```sh
//! # Play a sequence at recorded speed
//! seqplay run --files seq/images.zip --calib seq/camera.txt --speed 1
//!
//! # Play backwards, as fast as possible, with a preset
//! seqplay run --files seq/images --calib seq/camera.txt --reverse --preset 2
//!
//! # Summarize a sequence
//! seqplay inspect info seq/images.zip
//!
//! # Summarize an inertial log
//! seqplay inspect imu seq/imu.txt seq/imu_calib.txt
//! ```

mod cmd;
mod common;

use std::process;

use clap::{Parser, Subcommand};
use cmd::{InspectCmd, RunCmd};
use common::Result;

/// Seqplay - sequence playback for visual odometry
///
/// Reads a directory or zip archive of frames, undistorts them and feeds
/// them to the engine at the recorded frame rate.
#[derive(Parser, Clone)]
#[command(name = "seqplay")]
#[command(about = "Dataset ingestion and real-time playback for visual odometry", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "ArcheBase")]
struct Cli {
    /// Only log warnings and errors
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Clone)]
enum Commands {
    /// Play a sequence into the engine
    Run(RunCmd),

    /// Inspect sequence contents (info, imu)
    #[command(subcommand)]
    Inspect(InspectCmd),
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    common::init_logging(cli.quiet);
    common::install_interrupt_handler()?;

    match cli.command {
        Commands::Run(cmd) => cmd.run(),
        Commands::Inspect(cmd) => cmd.run(),
    }
}

fn main() {
    let result = run();

    if let Err(e) = result {
        common::log_fatal(&e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
