// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Real-time playback of a sequence into a downstream engine.
//!
//! - [`config`] - run configuration, presets and photometric modes
//! - [`plan`] - which frames play, in which order, and when
//! - [`scheduler`] - the paced playback loop
//! - [`recovery`] - engine ownership and rebuilds
//! - [`control`] - reset, pause and liveness signals
//! - [`stats`] - throughput summary and timing log

pub mod config;
pub mod control;
pub mod plan;
pub mod recovery;
pub mod scheduler;
pub mod stats;

pub use config::{
    DatasetPaths, EngineOptions, PhotometricMode, PlaybackConfig, PlaybackOptions, Preset,
};
pub use control::{ControlSignals, LivenessFlag};
pub use plan::{PlannedFrame, PlaybackPlan};
pub use recovery::{RecoveryAction, RecoveryController};
pub use scheduler::{
    pace, Clock, ManualClock, Pace, PlaybackOutcome, PlaybackReport, PlaybackScheduler,
    SchedulerOptions, SystemClock, PAUSE_POLL_INTERVAL,
};
pub use stats::{write_timing_log, PlaybackSummary};
