// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Inspect command - show sequence and inertial log information.

use std::path::PathBuf;

use clap::Subcommand;
use serde_json::json;

use crate::common::{format_duration, format_timestamp, Result};
use seqplay::calib::GeometricCalibration;
use seqplay::core::ImageSize;
use seqplay::io::{open_backend, InertialStream, StorageBackend, TimestampExposureLedger};

/// Frame size assumed for archive buffers when no calibration is given.
const FALLBACK_SIZE: ImageSize = ImageSize {
    width: 1280,
    height: 1024,
};

/// Inspect sequence contents.
#[derive(Subcommand, Clone, Debug)]
pub enum InspectCmd {
    /// Show backend, entry and ledger information
    Info {
        /// Image directory or .zip archive
        #[arg(value_name = "PATH")]
        input: PathBuf,

        /// Geometric calibration, used to size archive buffers
        #[arg(long, value_name = "FILE")]
        calib: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show inertial log information
    Imu {
        /// Inertial measurement log
        #[arg(value_name = "LOG")]
        log: PathBuf,

        /// Inertial calibration
        #[arg(value_name = "CALIB")]
        calib: PathBuf,
    },
}

impl InspectCmd {
    pub fn run(self) -> Result<()> {
        match self {
            InspectCmd::Info { input, calib, json } => cmd_info(input, calib, json),
            InspectCmd::Imu { log, calib } => cmd_imu(log, calib),
        }
    }
}

/// Cmd: Show sequence info
fn cmd_info(input: PathBuf, calib: Option<PathBuf>, as_json: bool) -> Result<()> {
    let frame_size = match &calib {
        Some(path) => GeometricCalibration::read(path)?.original_size,
        None => FALLBACK_SIZE,
    };
    let backend = open_backend(&input, frame_size)?;
    let ledger = TimestampExposureLedger::load(&input, backend.len())?;

    let entries = backend.entries();
    let first = entries.first().map(|e| e.name.as_str());
    let last = entries.last().map(|e| e.name.as_str());
    let span = ledger
        .timestamps()
        .first()
        .zip(ledger.timestamps().last())
        .map(|(a, b)| (b - a).abs());

    if as_json {
        let value = json!({
            "path": input.display().to_string(),
            "backend": backend.kind().as_str(),
            "entries": backend.len(),
            "first": first,
            "last": last,
            "timestamps": ledger.has_timestamps(),
            "exposures": ledger.has_exposures(),
            "duration": span,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("=== {} ===", input.display());
    println!("Backend: {}", backend.kind());
    println!("Entries: {}", backend.len());
    if let (Some(first), Some(last)) = (first, last) {
        println!("First: {first}");
        println!("Last: {last}");
    }

    println!();
    if ledger.has_timestamps() {
        let timestamps = ledger.timestamps();
        if let (Some(&start), Some(&end)) = (timestamps.first(), timestamps.last()) {
            println!("Start: {}", format_timestamp(start));
            println!("End: {}", format_timestamp(end));
            println!(
                "Duration: {}",
                format_duration(((end - start).abs() * 1e9) as u64)
            );
        }
        println!(
            "Exposures: {}",
            if ledger.has_exposures() { "yes" } else { "no" }
        );
    } else {
        println!("Timestamps: none (synthetic 25 fps timing)");
    }

    Ok(())
}

/// Cmd: Show inertial log info
fn cmd_imu(log: PathBuf, calib: PathBuf) -> Result<()> {
    let stream = InertialStream::load(&log, &calib)?;
    let samples = stream.samples();

    println!("=== {} ===", log.display());
    println!("Samples: {}", samples.len());
    if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
        let span = last.timestamp - first.timestamp;
        println!("Start: {}", format_timestamp(first.timestamp));
        println!("End: {}", format_timestamp(last.timestamp));
        println!("Duration: {}", format_duration((span.max(0.0) * 1e9) as u64));
        if span > 0.0 && samples.len() > 1 {
            println!("Rate: {:.1} Hz", (samples.len() - 1) as f64 / span);
        }
    }

    let c = stream.calibration();
    println!();
    println!("Calibration:");
    println!(
        "  translation: [{:.4}, {:.4}, {:.4}]",
        c.translation.x, c.translation.y, c.translation.z
    );
    println!("  gyro covariance: {:.3e}", c.gyro_covariance[(0, 0)]);
    println!("  accel covariance: {:.3e}", c.accel_covariance[(0, 0)]);
    println!("  gyro random walk: {:.3e}", c.gyro_random_walk[(0, 0)]);
    println!("  accel random walk: {:.3e}", c.accel_random_walk[(0, 0)]);

    Ok(())
}
