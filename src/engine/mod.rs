// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Downstream engine seam.
//!
//! Playback talks to the perception engine only through
//! [`DownstreamEngine`], builds it through an [`EngineFactory`] and hands
//! results to [`OutputObserver`]s. [`FrameLogEngine`] is the engine shipped
//! with this crate; it tracks scene texture and logs per-frame statistics.

pub mod frame_log;
pub mod sample;

pub use frame_log::{FrameLogConfig, FrameLogEngine, FrameRecord};
pub use sample::SampleObserver;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::calib::GlobalCalibration;
use crate::frame::MaterializedImage;
use crate::io::inertial::InertialStream;
use crate::Result;

/// Consumer of engine output, shared between engine generations.
pub trait OutputObserver: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// A frame was processed.
    fn publish_frame(&self, image: &MaterializedImage, id: usize);

    /// The engine is about to be rebuilt; drop any accumulated state.
    fn reset(&self);

    /// Wait until the observer has drained its work.
    fn join(&self);
}

/// Observer handle attached to every engine generation.
pub type SharedObserver = Arc<dyn OutputObserver>;

/// The perception engine as seen by playback.
pub trait DownstreamEngine: Send {
    /// Feed one frame.
    fn add_active_frame(&mut self, image: &MaterializedImage, id: usize) -> Result<()>;

    /// Check if initialization has completed.
    fn is_initialized(&self) -> bool;

    /// Check if initialization has failed and the engine is stuck.
    fn init_failed(&self) -> bool;

    /// Check if tracking has been lost for good.
    fn is_lost(&self) -> bool;

    /// Block until background work has finished.
    fn block_until_mapping_finished(&mut self) -> Result<()>;

    /// Write the result log.
    fn write_result(&self, path: &Path) -> Result<()>;

    /// Replace the attached observers.
    fn set_observers(&mut self, observers: Vec<SharedObserver>);

    /// Attached observers.
    fn observers(&self) -> &[SharedObserver];
}

/// Builds engines from settings; used for the first engine and every rebuild.
pub trait EngineFactory: Send {
    /// Build a fresh engine.
    fn build(&self, settings: &EngineSettings) -> Result<Box<dyn DownstreamEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn(&EngineSettings) -> Result<Box<dyn DownstreamEngine>> + Send,
{
    fn build(&self, settings: &EngineSettings) -> Result<Box<dyn DownstreamEngine>> {
        self(settings)
    }
}

/// Tunables forwarded to the engine.
///
/// Presets and the photometric mode write into this value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineTuning {
    /// Target number of active points
    pub desired_point_density: f32,
    /// Target number of candidate points
    pub desired_immature_density: f32,
    /// Minimum number of keyframes in the window
    pub min_frames: u32,
    /// Maximum number of keyframes in the window
    pub max_frames: u32,
    /// Minimum optimization iterations
    pub min_opt_iterations: u32,
    /// Maximum optimization iterations
    pub max_opt_iterations: u32,
    /// Photometric calibration level (0 off, 1 response, 2 response and vignette)
    pub photometric_calibration: u8,
    /// Affine brightness prior weight for `a`; negative fixes it
    pub affine_opt_mode_a: f64,
    /// Affine brightness prior weight for `b`; negative fixes it
    pub affine_opt_mode_b: f64,
    /// Added to the gradient histogram threshold
    pub min_grad_hist_add: f32,
    /// Write engine logs
    pub logging: bool,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            desired_point_density: 2000.0,
            desired_immature_density: 1500.0,
            min_frames: 5,
            max_frames: 7,
            min_opt_iterations: 1,
            max_opt_iterations: 6,
            photometric_calibration: 2,
            affine_opt_mode_a: 1e12,
            affine_opt_mode_b: 1e8,
            min_grad_hist_add: 7.0,
            logging: true,
        }
    }
}

/// Inertial data and weights handed to the engine.
#[derive(Debug, Clone)]
pub struct InertialSettings {
    /// Samples and calibration
    pub stream: Arc<InertialStream>,
    /// Inertial residual weight in the window optimization
    pub weight: f64,
    /// Inertial residual weight in the tracker
    pub weight_tracker: f64,
    /// Use inertial residuals
    pub use_imu: bool,
    /// Use inertial residuals while tracking
    pub track: bool,
}

/// Everything an engine is built from.
///
/// Kept by the recovery controller so rebuilt engines are configured the
/// same way as the first one.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Output camera
    pub calibration: GlobalCalibration,
    /// Inverse response, if photometric calibration was loaded
    pub gamma: Option<Vec<f32>>,
    /// Process every frame synchronously on the caller thread
    pub linearize_operation: bool,
    /// Allow background threads
    pub multi_threading: bool,
    /// Enable loop closure
    pub loop_closure: bool,
    /// Vocabulary used by loop closure
    pub vocabulary: Option<PathBuf>,
    /// Tunables
    pub tuning: EngineTuning,
    /// Inertial data, when both inertial files were given
    pub inertial: Option<InertialSettings>,
}

impl EngineSettings {
    /// Settings for a camera with default tunables.
    pub fn new(calibration: GlobalCalibration) -> Self {
        Self {
            calibration,
            gamma: None,
            linearize_operation: true,
            multi_threading: true,
            loop_closure: false,
            vocabulary: None,
            tuning: EngineTuning::default(),
            inertial: None,
        }
    }

    /// Check if frames are handed to a background worker.
    pub fn runs_async(&self) -> bool {
        self.multi_threading && !self.linearize_operation
    }
}
