// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Camera calibration binding.
//!
//! [`CalibrationBinding`] owns the undistortion pipeline of a sequence and
//! is the only source of output dimensions and intrinsics. The pipeline is
//! abstracted by [`Undistorter`]; [`PinholeUndistorter`] is the shipped
//! implementation.

pub mod photometric;
pub mod pinhole;

pub use photometric::{PhotometricLevel, PhotometricModel};
pub use pinhole::{CameraModel, GeometricCalibration, Intrinsics, PinholeUndistorter};

use std::path::PathBuf;

use nalgebra::Matrix3;

use crate::core::ImageSize;
use crate::frame::{MaterializedImage, RawPixels};
use crate::Result;

/// Geometric and photometric undistortion of raw frames.
pub trait Undistorter: Send {
    /// Size of the recorded frames.
    fn original_size(&self) -> ImageSize;

    /// Camera parameters as written in the calibration file.
    fn original_parameters(&self) -> &[f64];

    /// Size of the produced images.
    fn output_size(&self) -> ImageSize;

    /// Camera matrix of the produced images.
    fn output_intrinsics(&self) -> Matrix3<f64>;

    /// Normalized inverse response, if photometric calibration was loaded.
    fn photometric_gamma(&self) -> Option<&[f32]>;

    /// Correct and resample one intensity frame.
    ///
    /// `gain` scales raw values before the response lookup. A frame built
    /// with `color_source` set accepts a later [`Undistorter::undistort_color`].
    fn undistort(
        &self,
        raw: RawPixels<'_>,
        exposure: f32,
        timestamp: f64,
        gain: f32,
        color_source: bool,
    ) -> Result<MaterializedImage>;

    /// Correct and resample the red, green and blue planes into `image`.
    fn undistort_color(
        &self,
        planes: [&[u8]; 3],
        image: &mut MaterializedImage,
        exposure: f32,
        timestamp: f64,
    ) -> Result<()>;
}

/// Calibration files of a sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalibrationPaths {
    /// Geometric calibration (required)
    pub geometric: PathBuf,
    /// Inverse response
    pub gamma: Option<PathBuf>,
    /// Vignette image
    pub vignette: Option<PathBuf>,
}

impl CalibrationPaths {
    /// Paths with only the geometric calibration set.
    pub fn new(geometric: impl Into<PathBuf>) -> Self {
        Self {
            geometric: geometric.into(),
            ..Self::default()
        }
    }

    /// Set the inverse response file.
    pub fn with_gamma(mut self, gamma: Option<PathBuf>) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set the vignette file.
    pub fn with_vignette(mut self, vignette: Option<PathBuf>) -> Self {
        self.vignette = vignette;
        self
    }
}

/// Options applied while binding a calibration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CalibrationOptions {
    /// Photometric correction level
    pub photometric_level: PhotometricLevel,
    /// Output size replacing the one in the calibration file
    pub output_size: Option<ImageSize>,
}

/// Camera model handed to the engine at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalCalibration {
    /// Image size
    pub size: ImageSize,
    /// Camera matrix
    pub intrinsics: Matrix3<f64>,
}

impl GlobalCalibration {
    /// Focal length along x.
    pub fn fx(&self) -> f64 {
        self.intrinsics[(0, 0)]
    }

    /// Focal length along y.
    pub fn fy(&self) -> f64 {
        self.intrinsics[(1, 1)]
    }

    /// Principal point x.
    pub fn cx(&self) -> f64 {
        self.intrinsics[(0, 2)]
    }

    /// Principal point y.
    pub fn cy(&self) -> f64 {
        self.intrinsics[(1, 2)]
    }
}

/// Binds a sequence to its undistortion pipeline.
pub struct CalibrationBinding {
    undistorter: Box<dyn Undistorter>,
}

impl CalibrationBinding {
    /// Load the calibration files and build a [`PinholeUndistorter`].
    pub fn open(paths: &CalibrationPaths, options: CalibrationOptions) -> Result<Self> {
        let geometry = GeometricCalibration::read(&paths.geometric)?;
        let photometric = PhotometricModel::load(
            paths.gamma.as_deref(),
            paths.vignette.as_deref(),
            geometry.original_size,
            options.photometric_level,
        )?;
        let undistorter = PinholeUndistorter::new(geometry, photometric, options.output_size);
        Ok(Self::new(Box::new(undistorter)))
    }

    /// Wrap an existing undistorter.
    pub fn new(undistorter: Box<dyn Undistorter>) -> Self {
        Self { undistorter }
    }

    /// Size of the recorded frames.
    pub fn original_size(&self) -> ImageSize {
        self.undistorter.original_size()
    }

    /// Camera parameters as written in the calibration file.
    pub fn original_parameters(&self) -> &[f64] {
        self.undistorter.original_parameters()
    }

    /// Size of the produced images.
    pub fn output_size(&self) -> ImageSize {
        self.undistorter.output_size()
    }

    /// Camera matrix of the produced images.
    pub fn output_intrinsics(&self) -> Matrix3<f64> {
        self.undistorter.output_intrinsics()
    }

    /// Inverse response; `None` without photometric calibration.
    pub fn photometric_gamma(&self) -> Option<&[f32]> {
        self.undistorter.photometric_gamma()
    }

    /// Output camera for the engine.
    pub fn global_calibration(&self) -> GlobalCalibration {
        GlobalCalibration {
            size: self.output_size(),
            intrinsics: self.output_intrinsics(),
        }
    }

    /// The undistortion pipeline.
    pub fn undistorter(&self) -> &dyn Undistorter {
        self.undistorter.as_ref()
    }
}

impl std::fmt::Debug for CalibrationBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationBinding")
            .field("original_size", &self.original_size())
            .field("output_size", &self.output_size())
            .field("photometric", &self.photometric_gamma().is_some())
            .finish()
    }
}
