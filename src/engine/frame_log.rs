// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Texture-tracking engine that logs per-frame statistics.
//!
//! Tracking runs on the caller thread: the engine initializes after a run
//! of textured frames, fails initialization on a flat frame before that,
//! and is lost after a run of flat frames once initialized. Publishing to
//! observers and keeping the result records ("mapping") runs on a worker
//! thread when the settings allow asynchronous operation.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{DownstreamEngine, EngineSettings, InertialSettings, SharedObserver};
use crate::frame::MaterializedImage;
use crate::{PlaybackError, Result};

/// Thresholds of the texture tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameLogConfig {
    /// Consecutive textured frames needed to initialize
    pub init_frames: usize,
    /// Mean gradient below which a frame counts as flat
    pub min_gradient: f32,
    /// Consecutive flat frames after which tracking is lost
    pub lost_after: usize,
}

impl Default for FrameLogConfig {
    fn default() -> Self {
        Self {
            init_frames: 5,
            min_gradient: 1.0,
            lost_after: 30,
        }
    }
}

/// One line of the result log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRecord {
    /// Frame id handed to the engine
    pub id: usize,
    /// Capture time in seconds
    pub timestamp: f64,
    /// Exposure in milliseconds
    pub exposure: f32,
    /// Mean intensity
    pub mean: f32,
    /// Mean gradient
    pub gradient: f32,
    /// Inertial samples up to this frame
    pub inertial_samples: usize,
}

impl FrameRecord {
    fn to_line(self) -> String {
        format!(
            "{} {:.6} {:.3} {:.3} {:.3} {}",
            self.id, self.timestamp, self.exposure, self.mean, self.gradient, self.inertial_samples
        )
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct TrackState {
    textured_run: usize,
    flat_run: usize,
    initialized: bool,
    init_failed: bool,
    lost: bool,
}

enum MappingJob {
    Frame {
        record: FrameRecord,
        image: Box<MaterializedImage>,
        observers: Vec<SharedObserver>,
    },
    Flush(Sender<Vec<FrameRecord>>),
}

struct MappingWorker {
    jobs: Sender<MappingJob>,
    handle: JoinHandle<()>,
}

/// Engine shipped with the crate.
pub struct FrameLogEngine {
    config: FrameLogConfig,
    inertial: Option<InertialSettings>,
    state: TrackState,
    observers: Vec<SharedObserver>,
    records: Vec<FrameRecord>,
    worker: Option<MappingWorker>,
}

impl FrameLogEngine {
    /// Build an engine; starts the mapping worker when running asynchronously.
    pub fn new(settings: &EngineSettings, config: FrameLogConfig) -> Result<Self> {
        let worker = if settings.runs_async() {
            Some(spawn_worker()?)
        } else {
            None
        };
        info!(
            size = %settings.calibration.size,
            fx = settings.calibration.fx(),
            asynchronous = worker.is_some(),
            inertial = settings.inertial.is_some(),
            photometric = settings.gamma.is_some(),
            "frame log engine ready"
        );
        Ok(Self {
            config,
            inertial: settings.inertial.clone(),
            state: TrackState::default(),
            observers: Vec::new(),
            records: Vec::new(),
            worker,
        })
    }

    /// Records kept so far on this thread.
    ///
    /// With a mapping worker, call
    /// [`block_until_mapping_finished`](DownstreamEngine::block_until_mapping_finished)
    /// first.
    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    fn track(&mut self, gradient: f32) {
        let textured = gradient >= self.config.min_gradient;
        let state = &mut self.state;

        if !state.initialized {
            if textured {
                state.textured_run += 1;
                if state.textured_run >= self.config.init_frames {
                    state.initialized = true;
                    info!(frames = state.textured_run, "engine initialized");
                }
            } else {
                state.init_failed = true;
                warn!(gradient, "initialization failed on a flat frame");
            }
            return;
        }

        if textured {
            state.flat_run = 0;
        } else {
            state.flat_run += 1;
            if state.flat_run >= self.config.lost_after {
                state.lost = true;
                warn!(frames = state.flat_run, "tracking lost");
            }
        }
    }
}

fn spawn_worker() -> Result<MappingWorker> {
    let (jobs, queue) = unbounded::<MappingJob>();
    let handle = std::thread::Builder::new()
        .name("mapping".to_string())
        .spawn(move || run_worker(queue, Vec::new()))?;
    Ok(MappingWorker { jobs, handle })
}

fn run_worker(queue: Receiver<MappingJob>, mut records: Vec<FrameRecord>) {
    while let Ok(job) = queue.recv() {
        match job {
            MappingJob::Frame {
                record,
                image,
                observers,
            } => {
                records.push(record);
                for observer in &observers {
                    observer.publish_frame(&image, record.id);
                }
            }
            MappingJob::Flush(reply) => {
                let _ = reply.send(std::mem::take(&mut records));
            }
        }
    }
}

impl DownstreamEngine for FrameLogEngine {
    fn add_active_frame(&mut self, image: &MaterializedImage, id: usize) -> Result<()> {
        if self.state.init_failed || self.state.lost {
            return Ok(());
        }

        let gradient = image.mean_gradient();
        self.track(gradient);
        if !self.state.initialized {
            return Ok(());
        }

        let record = FrameRecord {
            id,
            timestamp: image.timestamp(),
            exposure: image.exposure(),
            mean: image.mean_intensity(),
            gradient,
            inertial_samples: self
                .inertial
                .as_ref()
                .map_or(0, |imu| imu.stream.count_until(image.timestamp())),
        };
        debug!(id, gradient, "frame tracked");

        match &self.worker {
            Some(worker) => worker
                .jobs
                .send(MappingJob::Frame {
                    record,
                    image: Box::new(image.clone()),
                    observers: self.observers.clone(),
                })
                .map_err(|_| PlaybackError::engine("mapping worker stopped"))?,
            None => {
                self.records.push(record);
                for observer in &self.observers {
                    observer.publish_frame(image, id);
                }
            }
        }
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state.initialized
    }

    fn init_failed(&self) -> bool {
        self.state.init_failed
    }

    fn is_lost(&self) -> bool {
        self.state.lost
    }

    fn block_until_mapping_finished(&mut self) -> Result<()> {
        if let Some(worker) = &self.worker {
            let (reply, done) = bounded(1);
            worker
                .jobs
                .send(MappingJob::Flush(reply))
                .map_err(|_| PlaybackError::engine("mapping worker stopped"))?;
            let drained = done
                .recv()
                .map_err(|_| PlaybackError::engine("mapping worker stopped"))?;
            self.records.extend(drained);
        }
        Ok(())
    }

    fn write_result(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for record in &self.records {
            writeln!(out, "{}", record.to_line())?;
        }
        out.flush()?;
        info!(path = %path.display(), frames = self.records.len(), "result written");
        Ok(())
    }

    fn set_observers(&mut self, observers: Vec<SharedObserver>) {
        self.observers = observers;
    }

    fn observers(&self) -> &[SharedObserver] {
        &self.observers
    }
}

impl Drop for FrameLogEngine {
    fn drop(&mut self) {
        if let Some(MappingWorker { jobs, handle }) = self.worker.take() {
            drop(jobs);
            if handle.join().is_err() {
                warn!("mapping worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calib::GlobalCalibration;
    use crate::core::ImageSize;
    use crate::engine::OutputObserver;
    use nalgebra::Matrix3;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn settings(linearize: bool) -> EngineSettings {
        let mut settings = EngineSettings::new(GlobalCalibration {
            size: ImageSize::new(2, 2),
            intrinsics: Matrix3::identity(),
        });
        settings.linearize_operation = linearize;
        settings
    }

    fn textured(timestamp: f64) -> MaterializedImage {
        MaterializedImage::new(ImageSize::new(2, 2), vec![0.0, 50.0, 50.0, 0.0], 1.0, timestamp)
    }

    fn flat() -> MaterializedImage {
        MaterializedImage::new(ImageSize::new(2, 2), vec![9.0; 4], 1.0, 0.0)
    }

    fn config() -> FrameLogConfig {
        FrameLogConfig {
            init_frames: 2,
            min_gradient: 1.0,
            lost_after: 2,
        }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl OutputObserver for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        fn publish_frame(&self, _image: &MaterializedImage, _id: usize) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn reset(&self) {}
        fn join(&self) {}
    }

    #[test]
    fn test_initializes_after_textured_run() {
        let mut engine = FrameLogEngine::new(&settings(true), config()).unwrap();
        engine.add_active_frame(&textured(0.0), 0).unwrap();
        assert!(!engine.is_initialized());
        engine.add_active_frame(&textured(0.1), 1).unwrap();
        assert!(engine.is_initialized());
        assert!(!engine.init_failed());
        assert_eq!(engine.records().len(), 1);
    }

    #[test]
    fn test_flat_frame_fails_initialization() {
        let mut engine = FrameLogEngine::new(&settings(true), config()).unwrap();
        engine.add_active_frame(&flat(), 0).unwrap();
        assert!(engine.init_failed());
        engine.add_active_frame(&textured(0.0), 1).unwrap();
        engine.add_active_frame(&textured(0.1), 2).unwrap();
        assert!(!engine.is_initialized());
    }

    #[test]
    fn test_lost_after_flat_run() {
        let mut engine = FrameLogEngine::new(&settings(true), config()).unwrap();
        for id in 0..2 {
            engine.add_active_frame(&textured(id as f64), id).unwrap();
        }
        engine.add_active_frame(&flat(), 2).unwrap();
        assert!(!engine.is_lost());
        engine.add_active_frame(&flat(), 3).unwrap();
        assert!(engine.is_lost());
    }

    #[test]
    fn test_async_mapping_flush_and_result() {
        let mut engine = FrameLogEngine::new(&settings(false), config()).unwrap();
        let observer = Arc::new(Counting::default());
        engine.set_observers(vec![observer.clone() as SharedObserver]);
        for id in 0..4 {
            engine.add_active_frame(&textured(id as f64 * 0.5), id).unwrap();
        }
        engine.block_until_mapping_finished().unwrap();
        assert_eq!(engine.records().len(), 3);
        assert_eq!(observer.0.load(Ordering::SeqCst), 3);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.txt");
        engine.write_result(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("1 0.500000 1.000 25.000"));
    }
}
