// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Run statistics and the timing log.

use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tracing::info;

use super::plan::PlaybackPlan;
use crate::Result;

/// Throughput of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackSummary {
    /// Entry index span between the first and last planned frame
    pub frames: usize,
    /// Sequence time between the first and last planned frame
    pub sequence_seconds: f64,
    /// Process CPU time in milliseconds
    pub single_core_ms: f64,
    /// Wall time in milliseconds, including the initializer offset
    pub multi_core_ms: f64,
}

impl PlaybackSummary {
    /// Build a summary from a plan and measured times.
    ///
    /// An empty plan yields a zero summary.
    pub fn new(
        plan: &PlaybackPlan,
        cpu: Duration,
        wall: Duration,
        initializer_offset: f64,
    ) -> Self {
        let (first, last) = match (plan.frames().first(), plan.frames().last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Self::default(),
        };
        Self {
            frames: first.index.abs_diff(last.index),
            sequence_seconds: (first.timestamp - last.timestamp).abs(),
            single_core_ms: cpu.as_secs_f64() * 1000.0,
            multi_core_ms: initializer_offset * 1000.0 + wall.as_secs_f64() * 1000.0,
        }
    }

    /// Frames per second of sequence time.
    pub fn fps(&self) -> f64 {
        ratio(self.frames as f64, self.sequence_seconds)
    }

    /// CPU milliseconds per frame.
    pub fn single_core_ms_per_frame(&self) -> f64 {
        ratio(self.single_core_ms, self.frames as f64)
    }

    /// Wall milliseconds per frame.
    pub fn multi_core_ms_per_frame(&self) -> f64 {
        ratio(self.multi_core_ms, self.frames as f64)
    }

    /// Real-time factor against CPU time.
    pub fn single_core_realtime(&self) -> f64 {
        ratio(1000.0 * self.sequence_seconds, self.single_core_ms)
    }

    /// Real-time factor against wall time.
    pub fn multi_core_realtime(&self) -> f64 {
        ratio(1000.0 * self.sequence_seconds, self.multi_core_ms)
    }

    /// Emit the summary as a structured log event.
    pub fn log(&self) {
        info!(
            frames = self.frames,
            fps = self.fps(),
            single_ms = self.single_core_ms_per_frame(),
            multi_ms = self.multi_core_ms_per_frame(),
            single_rt = self.single_core_realtime(),
            multi_rt = self.multi_core_realtime(),
            "playback summary"
        );
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

impl fmt::Display for PlaybackSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "======================")?;
        writeln!(f, "{} Frames ({:.1} fps)", self.frames, self.fps())?;
        writeln!(
            f,
            "{:.2}ms per frame (single core);",
            self.single_core_ms_per_frame()
        )?;
        writeln!(
            f,
            "{:.2}ms per frame (multi core);",
            self.multi_core_ms_per_frame()
        )?;
        writeln!(f, "{:.3}x (single core);", self.single_core_realtime())?;
        writeln!(f, "{:.3}x (multi core);", self.multi_core_realtime())?;
        write!(f, "======================")
    }
}

/// Write the timing log: CPU and wall milliseconds, each per entry.
///
/// Previous content is replaced. Missing parent directories are created.
pub fn write_timing_log(path: &Path, cpu: Duration, wall: Duration, entry_count: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let per = |d: Duration| ratio(d.as_nanos() as f64 / 1_000_000.0, entry_count as f64);
    let mut file = File::create(path)?;
    writeln!(file, "{} {}", per(cpu), per(wall))?;
    Ok(())
}
