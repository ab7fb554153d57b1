// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Inertial measurement stream and its static calibration.
//!
//! The measurement log is a CSV-like text file: one header line, then one
//! sample per line as `timestamp_ns, gx, gy, gz, ax, ay, az`. Values may be
//! separated by commas, whitespace or any other single symbol.
//!
//! The calibration file holds the inertial-to-camera transform and four
//! noise densities:
//!
//! ```text
//! r00 r01 r02 t0
//! r10 r11 r12 t1
//! r20 r21 r22 t2
//! <skipped line>
//! gyro_noise
//! accel_noise
//! gyro_random_walk
//! accel_random_walk
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use nalgebra::{Matrix3, Vector3};
use tracing::{info, warn};

use crate::{PlaybackError, Result};

/// Reference integration interval used to turn noise densities into
/// discrete covariances.
pub const NOISE_REFERENCE_INTERVAL: f64 = 0.005;

/// One inertial measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InertialSample {
    /// Time in seconds
    pub timestamp: f64,
    /// Angular velocity
    pub gyro: Vector3<f64>,
    /// Linear acceleration
    pub accel: Vector3<f64>,
}

/// Static calibration of the inertial sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct InertialCalibration {
    /// Rotation from the inertial frame to the camera frame
    pub rotation: Matrix3<f64>,
    /// Translation from the inertial frame to the camera frame
    pub translation: Vector3<f64>,
    /// Gyroscope measurement covariance
    pub gyro_covariance: Matrix3<f64>,
    /// Accelerometer measurement covariance
    pub accel_covariance: Matrix3<f64>,
    /// Gyroscope bias random walk
    pub gyro_random_walk: Matrix3<f64>,
    /// Accelerometer bias random walk
    pub accel_random_walk: Matrix3<f64>,
}

impl InertialCalibration {
    /// Build a calibration from the transform and the four noise scalars.
    pub fn from_noise(
        rotation: Matrix3<f64>,
        translation: Vector3<f64>,
        noise: [f64; 4],
    ) -> Self {
        let identity = Matrix3::<f64>::identity();
        Self {
            rotation,
            translation,
            gyro_covariance: identity * (noise[0] * noise[0] / NOISE_REFERENCE_INTERVAL),
            accel_covariance: identity * (noise[1] * noise[1] / NOISE_REFERENCE_INTERVAL),
            gyro_random_walk: identity * (noise[2] * noise[2]),
            accel_random_walk: identity * (noise[3] * noise[3]),
        }
    }

    /// Map a point from the inertial frame into the camera frame.
    pub fn transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * point + self.translation
    }
}

/// Inertial samples together with their calibration.
#[derive(Debug, Clone)]
pub struct InertialStream {
    samples: Vec<InertialSample>,
    calibration: InertialCalibration,
}

impl InertialStream {
    /// Read both the measurement log and the calibration file.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(log_path: P, calib_path: Q) -> Result<Self> {
        let samples = read_samples(log_path.as_ref())?;
        let calibration = read_calibration(calib_path.as_ref())?;
        info!(
            samples = samples.len(),
            first = samples.first().map(|s| s.timestamp),
            last = samples.last().map(|s| s.timestamp),
            "loaded inertial stream"
        );
        Ok(Self::new(samples, calibration))
    }

    /// Create a stream from parts.
    pub fn new(samples: Vec<InertialSample>, calibration: InertialCalibration) -> Self {
        Self {
            samples,
            calibration,
        }
    }

    /// All samples in file order.
    pub fn samples(&self) -> &[InertialSample] {
        &self.samples
    }

    /// Static calibration.
    pub fn calibration(&self) -> &InertialCalibration {
        &self.calibration
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples with a timestamp at or before `timestamp`.
    ///
    /// Samples are assumed time-ordered, as they are in the log.
    pub fn count_until(&self, timestamp: f64) -> usize {
        self.samples.partition_point(|s| s.timestamp <= timestamp)
    }
}

/// Read the measurement log at `path`.
pub fn read_samples(path: &Path) -> Result<Vec<InertialSample>> {
    let file = File::open(path)?;
    parse_samples(BufReader::new(file), &path.display().to_string())
}

/// Parse measurement lines; the first line is a header and is discarded.
pub fn parse_samples<R: BufRead>(reader: R, context: &str) -> Result<Vec<InertialSample>> {
    let mut samples = Vec::new();
    for (line_no, line) in reader.lines().enumerate().skip(1) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let values = numbers_in(&line);
        if values.len() < 7 {
            warn!(
                file = context,
                line = line_no + 1,
                values = values.len(),
                "skipping short inertial sample"
            );
            continue;
        }
        samples.push(InertialSample {
            timestamp: values[0] / 1e9,
            gyro: Vector3::new(values[1], values[2], values[3]),
            accel: Vector3::new(values[4], values[5], values[6]),
        });
    }
    Ok(samples)
}

/// Read the calibration file at `path`.
pub fn read_calibration(path: &Path) -> Result<InertialCalibration> {
    let file = File::open(path)?;
    parse_calibration(BufReader::new(file), &path.display().to_string())
}

/// Parse the calibration layout described in the module docs.
pub fn parse_calibration<R: BufRead>(reader: R, context: &str) -> Result<InertialCalibration> {
    let mut lines = reader.lines();
    let mut rotation = Matrix3::<f64>::zeros();
    let mut translation = Vector3::<f64>::zeros();

    let mut row = 0;
    while row < 3 {
        let line = lines
            .next()
            .ok_or_else(|| PlaybackError::parse(context, format!("missing transform row {row}")))??;
        if line.trim().is_empty() {
            continue;
        }
        let values = numbers_in(&line);
        if values.len() < 4 {
            return Err(PlaybackError::parse(
                context,
                format!("transform row {row} needs 4 values, found {}", values.len()),
            ));
        }
        for col in 0..3 {
            rotation[(row, col)] = values[col];
        }
        translation[row] = values[3];
        row += 1;
    }

    // Separator between the transform and the noise block
    lines.next().transpose()?;

    let mut noise = [0.0; 4];
    let mut filled = 0;
    while filled < 4 {
        let line = lines.next().ok_or_else(|| {
            PlaybackError::parse(context, format!("missing noise value {filled}"))
        })??;
        if line.trim().is_empty() {
            continue;
        }
        noise[filled] = *numbers_in(&line).first().ok_or_else(|| {
            PlaybackError::parse(context, format!("noise value {filled} is not a number"))
        })?;
        filled += 1;
    }

    Ok(InertialCalibration::from_noise(rotation, translation, noise))
}

/// Extract every number on a line, treating any other character as a separator.
fn numbers_in(line: &str) -> Vec<f64> {
    line.split(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
        .filter(|token| !token.is_empty())
        .filter_map(|token| token.parse::<f64>().ok())
        .collect()
}
