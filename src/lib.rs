// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Seqplay
//!
//! Dataset ingestion and real-time playback for visual odometry.
//!
//! A recorded sequence (a directory or `.zip` archive of frames plus a
//! `times.txt` ledger) is read, undistorted and photometrically corrected,
//! then fed to a downstream engine at the recorded frame rate.
//!
//! ## Architecture
//!
//! - `io/` - storage backends, the timestamp/exposure ledger, inertial logs
//! - `calib/` - geometric and photometric calibration, undistortion
//! - `frame/` - decoding and materialization of frames
//! - `engine/` - the downstream engine seam and the bundled frame-log engine
//! - `playback/` - configuration, plan, scheduler and recovery
//!
//! ## Example: Playing a sequence
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use seqplay::calib::{CalibrationBinding, CalibrationPaths};
//! use seqplay::engine::{DownstreamEngine, EngineSettings, FrameLogConfig, FrameLogEngine};
//! use seqplay::frame::{CodecDecoder, ImageMaterializer};
//! use seqplay::io::{open_backend, StorageBackend, TimestampExposureLedger};
//! use seqplay::playback::{
//!     ControlSignals, PlaybackConfig, PlaybackPlan, PlaybackScheduler, RecoveryController,
//!     SystemClock,
//! };
//!
//! let config = PlaybackConfig::new()
//!     .with_files("sequence_01/images.zip")
//!     .with_calib("sequence_01/camera.txt");
//! let calibration = CalibrationBinding::open(
//!     &CalibrationPaths::new("sequence_01/camera.txt"),
//!     config.calibration_options(),
//! )?;
//! let backend = open_backend("sequence_01/images.zip", calibration.original_size())?;
//! let ledger = TimestampExposureLedger::load("sequence_01/images.zip", backend.len())?;
//! let plan = PlaybackPlan::build(&ledger, backend.len(), 0, backend.len(), false, 1.0);
//!
//! let settings = EngineSettings::new(calibration.global_calibration());
//! let mut source = ImageMaterializer::new(
//!     backend,
//!     calibration,
//!     ledger,
//!     Box::new(CodecDecoder::new()),
//!     config.encoding(),
//! )?;
//!
//! let signals = Arc::new(ControlSignals::new());
//! let factory = |s: &EngineSettings| -> seqplay::Result<Box<dyn DownstreamEngine>> {
//!     Ok(Box::new(FrameLogEngine::new(s, FrameLogConfig::default())?))
//! };
//! let mut recovery =
//!     RecoveryController::new(Box::new(factory), settings, Vec::new(), signals.clone())?;
//! let report = PlaybackScheduler::new(&plan, SystemClock::new(), signals)
//!     .run(&mut source, &mut recovery, &mut |_, _| {})?;
//! println!("{}", report.summary);
//! recovery.shutdown();
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

// Re-export core types for convenience
pub use core::{
    BitDepth, ColorMode, ErrorCategory, ImageSize, PixelEncoding, PlaybackError, Result,
};

// Sequence ingestion
pub mod io;

// Calibration and undistortion
pub mod calib;

// Frame decoding and materialization
pub mod frame;

// Downstream engine seam
pub mod engine;

// Playback scheduling and recovery
pub mod playback;

// Re-export key types
pub use calib::{CalibrationBinding, GlobalCalibration, Undistorter};
pub use engine::{DownstreamEngine, EngineFactory, EngineSettings, OutputObserver};
pub use frame::{FrameSource, ImageMaterializer, MaterializedImage};
pub use io::{StorageBackend, TimestampExposureLedger};
pub use playback::{PlaybackConfig, PlaybackPlan, PlaybackScheduler, RecoveryController};
