// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Real-time playback loop.
//!
//! Each planned frame is due at its plan offset. A frame that is early is
//! waited for; a frame that is more than half a second late (plus 0.1 s on
//! odd positions) is dropped. Timing restarts from every frame seen before
//! the engine initializes, so initialization does not count as lag.

use std::cell::Cell;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::control::{ControlSignals, LivenessFlag};
use super::plan::PlaybackPlan;
use super::recovery::{RecoveryAction, RecoveryController};
use super::stats::{write_timing_log, PlaybackSummary};
use crate::frame::{FrameSource, MaterializedImage};
use crate::Result;

/// Poll interval while paused.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Lateness tolerated before a frame is dropped.
pub const DROP_TOLERANCE: f64 = 0.5;

/// Time source of the scheduler.
pub trait Clock {
    /// Wall time since an arbitrary origin.
    fn wall(&self) -> Duration;

    /// CPU time consumed by the process.
    fn cpu(&self) -> Duration;

    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn wall(&self) -> Duration {
        (**self).wall()
    }

    fn cpu(&self) -> Duration {
        (**self).cpu()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// The process clocks.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Start a clock at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn wall(&self) -> Duration {
        self.origin.elapsed()
    }

    #[cfg(unix)]
    fn cpu(&self) -> Duration {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: `ts` is a valid, writable timespec.
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_PROCESS_CPUTIME_ID, &mut ts) };
        if rc != 0 {
            return self.wall();
        }
        Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
    }

    #[cfg(not(unix))]
    fn cpu(&self) -> Duration {
        self.wall()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that only moves when told to; sleeping advances it.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    /// A clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }
}

impl Clock for ManualClock {
    fn wall(&self) -> Duration {
        self.now.get()
    }

    fn cpu(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Pacing decision for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pace {
    /// Early; wait this long before delivering
    Wait(Duration),
    /// Deliver now
    OnTime,
    /// Too late; skip the frame
    Drop,
}

/// Decide how to handle a frame due at `scheduled` when `elapsed` seconds
/// of playback have passed.
///
/// A wait too long to represent is skipped and the frame delivered now.
pub fn pace(elapsed: f64, scheduled: f64, position: usize) -> Pace {
    if elapsed < scheduled {
        match Duration::try_from_secs_f64(scheduled - elapsed) {
            Ok(wait) => Pace::Wait(wait),
            Err(_) => {
                warn!(position, elapsed, scheduled, "frame scheduled out of reach, not waiting");
                Pace::OnTime
            }
        }
    } else if elapsed > scheduled + DROP_TOLERANCE + 0.1 * (position % 2) as f64 {
        Pace::Drop
    } else {
        Pace::OnTime
    }
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Every planned frame was handled
    Completed,
    /// The engine lost tracking
    Lost,
    /// The visualization consumer went away
    ViewerClosed,
}

/// Counters and timing of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackReport {
    /// Why playback stopped
    pub outcome: PlaybackOutcome,
    /// Frames handed to the engine
    pub delivered: usize,
    /// Frames skipped for being late
    pub dropped: usize,
    /// Engine rebuilds
    pub restarts: usize,
    /// Plan offset at which timing last restarted
    pub initializer_offset: f64,
    /// CPU time from the last timing restart to the end of the drain
    pub cpu: Duration,
    /// Wall time from the last timing restart to the end of the drain
    pub wall: Duration,
    /// Throughput figures
    pub summary: PlaybackSummary,
}

/// Scheduler options beyond the plan.
#[derive(Debug, Clone, Default)]
pub struct SchedulerOptions {
    /// Materialize every frame before timing begins
    pub preload: bool,
    /// Engine result log
    pub result_path: Option<PathBuf>,
    /// Timing log
    pub timing_log: Option<PathBuf>,
}

/// Drives a plan through the recovery controller.
pub struct PlaybackScheduler<'a, C: Clock> {
    plan: &'a PlaybackPlan,
    clock: C,
    signals: Arc<ControlSignals>,
    liveness: Option<LivenessFlag>,
    options: SchedulerOptions,
}

impl<'a, C: Clock> PlaybackScheduler<'a, C> {
    /// Create a scheduler for `plan`.
    pub fn new(plan: &'a PlaybackPlan, clock: C, signals: Arc<ControlSignals>) -> Self {
        Self {
            plan,
            clock,
            signals,
            liveness: None,
            options: SchedulerOptions::default(),
        }
    }

    /// Stop when this visualization consumer dies.
    pub fn with_liveness(mut self, liveness: LivenessFlag) -> Self {
        self.liveness = Some(liveness);
        self
    }

    /// Set the options.
    pub fn with_options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    /// Materialize every planned frame, reporting `(done, total)`.
    pub fn preload<S>(
        &self,
        source: &mut S,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<Vec<Option<MaterializedImage>>>
    where
        S: FrameSource + ?Sized,
    {
        let total = self.plan.len();
        let mut frames = Vec::with_capacity(total);
        for (done, planned) in self.plan.iter().enumerate() {
            frames.push(Some(source.materialize(planned.index)?));
            progress(done + 1, total);
        }
        info!(frames = total, "preloaded frames");
        Ok(frames)
    }

    /// Play the plan, drain the engine and write the logs.
    pub fn run<S>(
        &mut self,
        source: &mut S,
        recovery: &mut RecoveryController,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<PlaybackReport>
    where
        S: FrameSource + ?Sized,
    {
        let mut preloaded = if self.options.preload {
            Some(self.preload(source, progress)?)
        } else {
            None
        };

        let speed = self.plan.speed();
        let mut start_wall = self.clock.wall();
        let mut start_cpu = self.clock.cpu();
        let mut initializer_offset = 0.0;
        let mut outcome = PlaybackOutcome::Completed;
        let (mut delivered, mut dropped, mut restarts) = (0, 0, 0);

        for (position, planned) in self.plan.iter().enumerate() {
            while self.signals.is_paused() {
                self.clock.sleep(PAUSE_POLL_INTERVAL);
            }

            if !recovery.engine().is_initialized() {
                start_wall = self.clock.wall();
                start_cpu = self.clock.cpu();
                initializer_offset = planned.offset;
            }

            let preloaded_frame = preloaded
                .as_mut()
                .and_then(|frames| frames.get_mut(position))
                .and_then(Option::take);
            let image = match preloaded_frame {
                Some(image) => image,
                None => source.materialize(planned.index)?,
            };

            let mut skip = false;
            if speed != 0.0 {
                let elapsed =
                    initializer_offset + (self.clock.wall() - start_wall).as_secs_f64();
                match pace(elapsed, planned.offset, position) {
                    Pace::Wait(wait) => self.clock.sleep(wait),
                    Pace::OnTime => {}
                    Pace::Drop => skip = true,
                }
            }

            if skip {
                dropped += 1;
                debug!(position, index = planned.index, "dropped late frame");
            } else {
                recovery.deliver(&image, planned.index)?;
                delivered += 1;
            }
            drop(image);
            if !self.options.preload {
                progress(position + 1, self.plan.len());
            }

            if self.liveness.as_ref().is_some_and(|l| !l.is_alive()) {
                info!(position, "visualization closed, stopping playback");
                outcome = PlaybackOutcome::ViewerClosed;
                break;
            }

            match recovery.after_frame(position)? {
                RecoveryAction::Continue => {}
                RecoveryAction::Restarted => restarts += 1,
                RecoveryAction::Lost => {
                    outcome = PlaybackOutcome::Lost;
                    break;
                }
            }
        }

        recovery.engine_mut().block_until_mapping_finished()?;
        let cpu = self.clock.cpu().saturating_sub(start_cpu);
        let wall = self.clock.wall().saturating_sub(start_wall);

        if let Some(path) = &self.options.result_path {
            recovery.engine().write_result(path)?;
        }

        if dropped > 0 {
            warn!(dropped, delivered, "frames dropped to keep up with playback speed");
        }

        let summary = PlaybackSummary::new(self.plan, cpu, wall, initializer_offset);
        summary.log();

        if let Some(path) = &self.options.timing_log {
            write_timing_log(path, cpu, wall, source.frame_count())?;
        }

        Ok(PlaybackReport {
            outcome,
            delivered,
            dropped,
            restarts,
            initializer_offset,
            cpu,
            wall,
            summary,
        })
    }
}
