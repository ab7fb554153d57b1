// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Playback configuration.
//!
//! One [`PlaybackConfig`] value is built from defaults, an optional TOML
//! file and command line flags, in that order, and passed by reference.
//! Presets and the photometric mode are resolved from it on demand.
//!
//! ```toml
//! [paths]
//! files = "mav0/cam0/data.zip"
//! calib = "camera.txt"
//!
//! [playback]
//! speed = 1.0
//! reverse = false
//!
//! [engine]
//! preset = 0
//! mode = 1
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calib::{CalibrationOptions, PhotometricLevel};
use crate::core::{BitDepth, ColorMode, ImageSize, PixelEncoding};
use crate::engine::{EngineTuning, FrameLogConfig};
use crate::{PlaybackError, Result};

/// Default end of the playback range.
pub const DEFAULT_END: usize = 100_000;

/// Output size of the reduced presets.
pub const REDUCED_OUTPUT_SIZE: ImageSize = ImageSize {
    width: 424,
    height: 320,
};

/// Named bundles of speed and engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Preset {
    /// Full settings, no real-time enforcement
    #[default]
    Default,
    /// Full settings at 1x real time
    RealTime,
    /// Reduced settings, no real-time enforcement
    Fast,
    /// Reduced settings at 5x real time, preloaded
    FastRealTime,
}

impl Preset {
    /// Playback speed the preset implies.
    pub fn speed(&self) -> f64 {
        match self {
            Preset::Default | Preset::Fast => 0.0,
            Preset::RealTime => 1.0,
            Preset::FastRealTime => 5.0,
        }
    }

    /// Check if the preset preloads all frames.
    pub fn preload(&self) -> bool {
        matches!(self, Preset::FastRealTime)
    }

    /// Check if the preset uses the reduced engine settings.
    pub fn is_reduced(&self) -> bool {
        matches!(self, Preset::Fast | Preset::FastRealTime)
    }

    /// Human readable summary.
    pub fn description(&self) -> &'static str {
        match self {
            Preset::Default => {
                "DEFAULT settings: 2000 active points, 5-7 active frames, \
                 1-6 LM iterations per keyframe, original resolution, no real-time enforcement"
            }
            Preset::RealTime => {
                "DEFAULT settings: 2000 active points, 5-7 active frames, \
                 1-6 LM iterations per keyframe, original resolution, 1x real-time enforcement"
            }
            Preset::Fast => {
                "FAST settings: 800 active points, 4-6 active frames, \
                 1-4 LM iterations per keyframe, 424x320 resolution, no real-time enforcement"
            }
            Preset::FastRealTime => {
                "FAST settings: 800 active points, 4-6 active frames, \
                 1-4 LM iterations per keyframe, 424x320 resolution, 5x real-time enforcement"
            }
        }
    }

    fn apply(&self, tuning: &mut EngineTuning) {
        if self.is_reduced() {
            tuning.desired_immature_density = 600.0;
            tuning.desired_point_density = 800.0;
            tuning.min_frames = 4;
            tuning.max_frames = 6;
            tuning.min_opt_iterations = 1;
            tuning.max_opt_iterations = 4;
            tuning.logging = false;
        }
    }
}

impl TryFrom<u8> for Preset {
    type Error = PlaybackError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Preset::Default),
            1 => Ok(Preset::RealTime),
            2 => Ok(Preset::Fast),
            3 => Ok(Preset::FastRealTime),
            other => Err(PlaybackError::config(format!(
                "unknown preset {other}, expected 0-3"
            ))),
        }
    }
}

impl From<Preset> for u8 {
    fn from(preset: Preset) -> u8 {
        match preset {
            Preset::Default => 0,
            Preset::RealTime => 1,
            Preset::Fast => 2,
            Preset::FastRealTime => 3,
        }
    }
}

/// How intensities are corrected and how brightness is modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PhotometricMode {
    /// Use the response and vignette calibration
    Calibrated,
    /// No photometric calibration, brightness parameters free
    #[default]
    Uncalibrated,
    /// No photometric calibration, brightness parameters fixed
    Perfect,
}

impl PhotometricMode {
    /// Correction level for the undistorter.
    pub fn level(&self) -> PhotometricLevel {
        match self {
            PhotometricMode::Calibrated => PhotometricLevel::ResponseAndVignette,
            PhotometricMode::Uncalibrated | PhotometricMode::Perfect => PhotometricLevel::Off,
        }
    }

    /// Human readable summary.
    pub fn description(&self) -> &'static str {
        match self {
            PhotometricMode::Calibrated => "photometric mode with calibration",
            PhotometricMode::Uncalibrated => "photometric mode without calibration",
            PhotometricMode::Perfect => "photometric mode with perfect images",
        }
    }

    fn apply(&self, tuning: &mut EngineTuning) {
        match self {
            PhotometricMode::Calibrated => {}
            PhotometricMode::Uncalibrated => {
                tuning.photometric_calibration = 0;
                tuning.affine_opt_mode_a = 0.0;
                tuning.affine_opt_mode_b = 0.0;
            }
            PhotometricMode::Perfect => {
                tuning.photometric_calibration = 0;
                tuning.affine_opt_mode_a = -1.0;
                tuning.affine_opt_mode_b = -1.0;
                tuning.min_grad_hist_add = 3.0;
            }
        }
    }
}

impl TryFrom<u8> for PhotometricMode {
    type Error = PlaybackError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(PhotometricMode::Calibrated),
            1 => Ok(PhotometricMode::Uncalibrated),
            2 => Ok(PhotometricMode::Perfect),
            other => Err(PlaybackError::config(format!(
                "unknown mode {other}, expected 0-2"
            ))),
        }
    }
}

impl From<PhotometricMode> for u8 {
    fn from(mode: PhotometricMode) -> u8 {
        match mode {
            PhotometricMode::Calibrated => 0,
            PhotometricMode::Uncalibrated => 1,
            PhotometricMode::Perfect => 2,
        }
    }
}

/// Input files of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetPaths {
    /// Image directory or `.zip` archive
    pub files: Option<PathBuf>,
    /// Geometric calibration
    pub calib: Option<PathBuf>,
    /// Inverse response
    pub gamma: Option<PathBuf>,
    /// Vignette image
    pub vignette: Option<PathBuf>,
    /// Inertial measurement log
    pub imu: Option<PathBuf>,
    /// Inertial calibration
    pub imu_calib: Option<PathBuf>,
    /// Loop closure vocabulary
    pub vocab: Option<PathBuf>,
}

impl DatasetPaths {
    /// Inertial log and calibration, when both are set.
    pub fn inertial(&self) -> Option<(&Path, &Path)> {
        match (&self.imu, &self.imu_calib) {
            (Some(log), Some(calib)) => Some((log.as_path(), calib.as_path())),
            _ => None,
        }
    }
}

/// How frames are played.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackOptions {
    /// First entry of the range
    pub start: usize,
    /// End of the range, exclusive
    pub end: usize,
    /// Play the range backwards
    pub reverse: bool,
    /// Materialize every frame before timing begins
    pub preload: bool,
    /// Speed factor; `None` takes the preset's, 0 disables pacing
    pub speed: Option<f64>,
    /// Frames are 16-bit
    pub sixteen_bit: bool,
    /// Channel layout of the frames
    pub color: ColorMode,
    /// Engine result log
    pub result: PathBuf,
    /// Timing log, written when engine logging is on
    pub timing_log: PathBuf,
    /// Recreate the `images_out` directory
    pub save: bool,
    /// Show the progress display
    pub gui: bool,
    /// Attach the sample output observer
    pub sample_output: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            start: 0,
            end: DEFAULT_END,
            reverse: false,
            preload: false,
            speed: None,
            sixteen_bit: false,
            color: ColorMode::Mono,
            result: PathBuf::from("result.txt"),
            timing_log: PathBuf::from("logs/time.txt"),
            save: false,
            gui: true,
            sample_output: false,
        }
    }
}

/// Engine-facing options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Setting bundle
    pub preset: Preset,
    /// Photometric mode
    pub mode: PhotometricMode,
    /// Enable loop closure
    pub loop_closure: bool,
    /// Allow engine background threads
    pub multi_threading: bool,
    /// Disable engine logging
    pub nolog: bool,
    /// Inertial weight in the window optimization
    pub imu_weight: f64,
    /// Inertial weight in the tracker
    pub imu_weight_tracker: f64,
    /// Tunables before preset and mode are applied
    pub tuning: EngineTuning,
    /// Thresholds of the shipped engine
    pub tracker: FrameLogConfig,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            preset: Preset::Default,
            mode: PhotometricMode::Uncalibrated,
            loop_closure: false,
            multi_threading: true,
            nolog: false,
            imu_weight: 5.0,
            imu_weight_tracker: 0.5,
            tuning: EngineTuning::default(),
            tracker: FrameLogConfig::default(),
        }
    }
}

/// Complete configuration of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Input files
    pub paths: DatasetPaths,
    /// Playback behavior
    pub playback: PlaybackOptions,
    /// Engine options
    pub engine: EngineOptions,
}

impl PlaybackConfig {
    /// Create a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TOML configuration file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|e| match e {
            PlaybackError::Configuration { message } => {
                PlaybackError::config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Parse TOML configuration text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| PlaybackError::config(e.to_string()))
    }

    /// Set the image source.
    pub fn with_files<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.paths.files = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the geometric calibration.
    pub fn with_calib<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.paths.calib = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the playback speed.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.playback.speed = Some(speed);
        self
    }

    /// Set the playback range.
    pub fn with_range(mut self, start: usize, end: usize) -> Self {
        self.playback.start = start;
        self.playback.end = end;
        self
    }

    /// Play backwards.
    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.playback.reverse = reverse;
        self
    }

    /// Set the preset.
    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.engine.preset = preset;
        self
    }

    /// Set the photometric mode.
    pub fn with_mode(mut self, mode: PhotometricMode) -> Self {
        self.engine.mode = mode;
        self
    }

    /// Reject values no run can use.
    pub fn validate(&self) -> Result<()> {
        let speed = self.speed();
        if !speed.is_finite() || speed < 0.0 {
            return Err(PlaybackError::config(format!(
                "speed must be a non-negative number, got {speed}"
            )));
        }
        if self.engine.mode == PhotometricMode::Calibrated && self.paths.gamma.is_none() {
            return Err(PlaybackError::config(
                "photometric mode 0 requires a gamma calibration",
            ));
        }
        self.encoding().validate()
    }

    /// Effective speed: explicit value, else the preset's.
    pub fn speed(&self) -> f64 {
        self.playback.speed.unwrap_or_else(|| self.engine.preset.speed())
    }

    /// Check if frames are preloaded.
    pub fn preload(&self) -> bool {
        self.playback.preload || self.engine.preset.preload()
    }

    /// Check if engine logging and the timing log are on.
    pub fn logging(&self) -> bool {
        self.engine_tuning().logging
    }

    /// Pixel encoding of the frames.
    pub fn encoding(&self) -> PixelEncoding {
        let depth = if self.playback.sixteen_bit {
            BitDepth::Sixteen
        } else {
            BitDepth::Eight
        };
        PixelEncoding::new(depth, self.playback.color)
    }

    /// Output size forced by the preset, if any.
    pub fn output_size_override(&self) -> Option<ImageSize> {
        self.engine.preset.is_reduced().then_some(REDUCED_OUTPUT_SIZE)
    }

    /// Options for binding the calibration.
    pub fn calibration_options(&self) -> CalibrationOptions {
        CalibrationOptions {
            photometric_level: self.engine.mode.level(),
            output_size: self.output_size_override(),
        }
    }

    /// Tunables with preset and photometric mode applied.
    pub fn engine_tuning(&self) -> EngineTuning {
        let mut tuning = self.engine.tuning.clone();
        self.engine.preset.apply(&mut tuning);
        self.engine.mode.apply(&mut tuning);
        if self.engine.nolog {
            tuning.logging = false;
        }
        tuning
    }

    /// Log the resolved settings.
    pub fn log_summary(&self) {
        info!(
            preset = u8::from(self.engine.preset),
            speed = self.speed(),
            preload = self.preload(),
            reverse = self.playback.reverse,
            start = self.playback.start,
            end = self.playback.end,
            encoding = %self.encoding(),
            mode = self.engine.mode.description(),
            "playback configuration"
        );
    }
}
