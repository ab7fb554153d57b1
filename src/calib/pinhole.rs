// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Pinhole / radial-tangential undistorter.
//!
//! Calibration file layout:
//!
//! ```text
//! Pinhole fx fy cx cy 0        | RadTan fx fy cx cy k1 k2 p1 p2 | fx fy cx cy 0
//! in_width in_height
//! none | crop | full | fx fy cx cy 0
//! out_width out_height
//! ```
//!
//! Intrinsics with `cx < 1 && cy < 1` are relative to the image size.

use std::path::Path;

use nalgebra::Matrix3;
use tracing::{debug, info};

use super::photometric::PhotometricModel;
use super::Undistorter;
use crate::core::ImageSize;
use crate::frame::{ColorPlanes, MaterializedImage, RawPixels};
use crate::{PlaybackError, Result};

/// Focal lengths and principal point in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    /// Focal length along x
    pub fx: f64,
    /// Focal length along y
    pub fy: f64,
    /// Principal point x
    pub cx: f64,
    /// Principal point y
    pub cy: f64,
}

impl Intrinsics {
    /// Create intrinsics from pixel values.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Convert relative intrinsics to pixels for `size`.
    ///
    /// Values are taken as relative only when both `cx` and `cy` are below 1.
    pub fn resolve_relative(self, size: ImageSize) -> Self {
        if self.cx < 1.0 && self.cy < 1.0 {
            let w = size.width as f64;
            let h = size.height as f64;
            Self {
                fx: self.fx * w,
                fy: self.fy * h,
                cx: self.cx * w - 0.5,
                cy: self.cy * h - 0.5,
            }
        } else {
            self
        }
    }

    /// Rescale pixel intrinsics from one image size to another.
    pub fn scaled(self, from: ImageSize, to: ImageSize) -> Self {
        if from == to {
            return self;
        }
        let sx = to.width as f64 / from.width as f64;
        let sy = to.height as f64 / from.height as f64;
        Self {
            fx: self.fx * sx,
            fy: self.fy * sy,
            cx: (self.cx + 0.5) * sx - 0.5,
            cy: (self.cy + 0.5) * sy - 0.5,
        }
    }

    /// 3x3 camera matrix.
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }
}

/// Lens distortion of the input camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraModel {
    /// No distortion
    Pinhole,
    /// Radial-tangential distortion
    RadTan {
        /// First radial coefficient
        k1: f64,
        /// Second radial coefficient
        k2: f64,
        /// First tangential coefficient
        p1: f64,
        /// Second tangential coefficient
        p2: f64,
    },
}

impl CameraModel {
    /// Map an undistorted normalized point to its distorted position.
    pub fn distort(&self, x: f64, y: f64) -> (f64, f64) {
        match *self {
            CameraModel::Pinhole => (x, y),
            CameraModel::RadTan { k1, k2, p1, p2 } => {
                let r2 = x * x + y * y;
                let radial = 1.0 + k1 * r2 + k2 * r2 * r2;
                let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
                let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
                (xd, yd)
            }
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            CameraModel::Pinhole => "pinhole",
            CameraModel::RadTan { .. } => "radtan",
        }
    }
}

/// Requested output camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rectification {
    /// Keep the input camera
    None,
    /// Crop to valid pixels
    Crop,
    /// Keep the full field of view
    Full,
    /// Explicit output intrinsics, possibly relative
    Explicit(Intrinsics),
}

/// Parsed geometric calibration file.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometricCalibration {
    /// Distortion model
    pub model: CameraModel,
    /// Input intrinsics in pixels
    pub intrinsics: Intrinsics,
    /// Numbers of the first line, as written
    pub parameters: Vec<f64>,
    /// Size of the recorded frames
    pub original_size: ImageSize,
    /// Output camera request
    pub rectification: Rectification,
    /// Output size from the file
    pub output_size: ImageSize,
}

impl GeometricCalibration {
    /// Read and parse a calibration file.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PlaybackError::calibration(path, e.to_string()))?;
        Self::parse(&text).map_err(|reason| PlaybackError::calibration(path, reason))
    }

    /// Parse calibration text.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let first = lines.next().ok_or("empty calibration file")?;
        let (model, intrinsics, parameters) = parse_camera_line(first)?;

        let original_size = parse_size(lines.next().ok_or("missing input size line")?)?;
        let intrinsics = intrinsics.resolve_relative(original_size);

        let rect_line = lines.next().ok_or("missing rectification line")?;
        let rectification = match rect_line.trim() {
            "none" => Rectification::None,
            "crop" => Rectification::Crop,
            "full" => Rectification::Full,
            other => {
                let values = parse_numbers(other)?;
                if values.len() < 4 {
                    return Err(format!("unknown rectification '{other}'"));
                }
                Rectification::Explicit(Intrinsics::new(
                    values[0], values[1], values[2], values[3],
                ))
            }
        };

        let output_size = parse_size(lines.next().ok_or("missing output size line")?)?;

        Ok(Self {
            model,
            intrinsics,
            parameters,
            original_size,
            rectification,
            output_size,
        })
    }
}

fn parse_camera_line(line: &str) -> std::result::Result<(CameraModel, Intrinsics, Vec<f64>), String> {
    let mut tokens = line.split_whitespace().peekable();
    let name = match tokens.peek() {
        Some(t) if t.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) => tokens.next(),
        _ => None,
    };
    let values = tokens
        .map(|t| t.parse::<f64>().map_err(|_| format!("'{t}' is not a number")))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let need = |n: usize| {
        if values.len() < n {
            Err(format!("camera line needs {n} values, found {}", values.len()))
        } else {
            Ok(())
        }
    };

    let model = match name {
        Some("Pinhole") => {
            need(4)?;
            CameraModel::Pinhole
        }
        Some("RadTan") => {
            need(8)?;
            CameraModel::RadTan {
                k1: values[4],
                k2: values[5],
                p1: values[6],
                p2: values[7],
            }
        }
        Some(other) => return Err(format!("unsupported camera model '{other}'")),
        None => {
            need(5)?;
            if values[4] != 0.0 {
                return Err("FOV distortion is not supported".to_string());
            }
            CameraModel::Pinhole
        }
    };

    let intrinsics = Intrinsics::new(values[0], values[1], values[2], values[3]);
    Ok((model, intrinsics, values))
}

fn parse_numbers(line: &str) -> std::result::Result<Vec<f64>, String> {
    line.split_whitespace()
        .map(|t| t.parse::<f64>().map_err(|_| format!("'{t}' is not a number")))
        .collect()
}

fn parse_size(line: &str) -> std::result::Result<ImageSize, String> {
    let mut tokens = line.split_whitespace().map(|t| t.parse::<usize>());
    match (tokens.next(), tokens.next()) {
        (Some(Ok(w)), Some(Ok(h))) if w > 0 && h > 0 => Ok(ImageSize::new(w, h)),
        _ => Err(format!("'{}' is not an image size", line.trim())),
    }
}

/// Undistorter for pinhole and radial-tangential cameras with optional
/// photometric correction.
#[derive(Debug, Clone)]
pub struct PinholeUndistorter {
    geometry: GeometricCalibration,
    output_size: ImageSize,
    output_intrinsics: Intrinsics,
    /// Source position for every output pixel; `None` copies the input
    remap: Option<Vec<[f32; 2]>>,
    photometric: PhotometricModel,
}

impl PinholeUndistorter {
    /// Build the undistorter.
    ///
    /// `output_override` replaces the output size from the file; output
    /// intrinsics are rescaled accordingly.
    pub fn new(
        geometry: GeometricCalibration,
        photometric: PhotometricModel,
        output_override: Option<ImageSize>,
    ) -> Self {
        let output_size = output_override.unwrap_or(geometry.output_size);
        let input = geometry.intrinsics;
        let original = geometry.original_size;

        let output_intrinsics = match geometry.rectification {
            Rectification::None => input.scaled(original, output_size),
            Rectification::Crop | Rectification::Full => {
                info!(
                    mode = ?geometry.rectification,
                    "output camera derived from the scaled input camera"
                );
                input.scaled(original, output_size)
            }
            Rectification::Explicit(k) => k
                .resolve_relative(geometry.output_size)
                .scaled(geometry.output_size, output_size),
        };

        let passthrough = geometry.model == CameraModel::Pinhole
            && output_size == original
            && output_intrinsics == input;
        let remap = if passthrough {
            None
        } else {
            Some(build_remap(
                geometry.model,
                input,
                output_intrinsics,
                output_size,
            ))
        };

        info!(
            model = geometry.model.as_str(),
            input = %original,
            output = %output_size,
            passthrough,
            "undistorter ready"
        );

        Self {
            geometry,
            output_size,
            output_intrinsics,
            remap,
            photometric,
        }
    }

    /// Photometric model in use.
    pub fn photometric(&self) -> &PhotometricModel {
        &self.photometric
    }

    /// Check if frames are copied without resampling.
    pub fn is_passthrough(&self) -> bool {
        self.remap.is_none()
    }

    fn check_len(&self, len: usize) -> Result<()> {
        let expected = self.geometry.original_size.area();
        if len != expected {
            return Err(PlaybackError::decode(
                "frame",
                format!(
                    "{len} pixels, calibration expects {} ({expected})",
                    self.geometry.original_size
                ),
            ));
        }
        Ok(())
    }

    fn remap_plane(&self, plane: Vec<f32>) -> Vec<f32> {
        match &self.remap {
            None => plane,
            Some(map) => {
                let size = self.geometry.original_size;
                map.iter()
                    .map(|&[x, y]| sample_bilinear(&plane, size, x, y))
                    .collect()
            }
        }
    }
}

impl Undistorter for PinholeUndistorter {
    fn original_size(&self) -> ImageSize {
        self.geometry.original_size
    }

    fn original_parameters(&self) -> &[f64] {
        &self.geometry.parameters
    }

    fn output_size(&self) -> ImageSize {
        self.output_size
    }

    fn output_intrinsics(&self) -> Matrix3<f64> {
        self.output_intrinsics.to_matrix()
    }

    fn photometric_gamma(&self) -> Option<&[f32]> {
        self.photometric.response()
    }

    fn undistort(
        &self,
        raw: RawPixels<'_>,
        exposure: f32,
        timestamp: f64,
        gain: f32,
        color_source: bool,
    ) -> Result<MaterializedImage> {
        self.check_len(raw.len())?;
        let corrected = match raw {
            RawPixels::Mono8(data) => self.photometric.apply(data, exposure, gain),
            RawPixels::Mono16(data) => self.photometric.apply(data, exposure, gain),
        };
        let pixels = self.remap_plane(corrected);
        let mut image = MaterializedImage::new(self.output_size, pixels, exposure, timestamp);
        image.set_color_source(color_source);
        Ok(image)
    }

    fn undistort_color(
        &self,
        planes: [&[u8]; 3],
        image: &mut MaterializedImage,
        exposure: f32,
        timestamp: f64,
    ) -> Result<()> {
        if !image.is_color_source() {
            return Err(PlaybackError::config(
                "color pass requested for a frame not marked as a color source",
            ));
        }
        let mut corrected = Vec::with_capacity(3);
        for plane in planes {
            self.check_len(plane.len())?;
            corrected.push(self.remap_plane(self.photometric.apply(plane, exposure, 1.0)));
        }
        let blue = corrected.pop().unwrap_or_default();
        let green = corrected.pop().unwrap_or_default();
        let red = corrected.pop().unwrap_or_default();
        debug!(timestamp, "color planes undistorted");
        image.set_color(ColorPlanes { red, green, blue });
        Ok(())
    }
}

fn build_remap(
    model: CameraModel,
    input: Intrinsics,
    output: Intrinsics,
    size: ImageSize,
) -> Vec<[f32; 2]> {
    let mut map = Vec::with_capacity(size.area());
    for y in 0..size.height {
        for x in 0..size.width {
            let nx = (x as f64 - output.cx) / output.fx;
            let ny = (y as f64 - output.cy) / output.fy;
            let (dx, dy) = model.distort(nx, ny);
            map.push([
                (input.fx * dx + input.cx) as f32,
                (input.fy * dy + input.cy) as f32,
            ]);
        }
    }
    map
}

/// Bilinear lookup; positions outside the image read as 0.
fn sample_bilinear(plane: &[f32], size: ImageSize, x: f32, y: f32) -> f32 {
    let max_x = (size.width - 1) as f32;
    let max_y = (size.height - 1) as f32;
    if !(x >= 0.0 && y >= 0.0 && x <= max_x && y <= max_y) {
        return 0.0;
    }
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(size.width - 1);
    let y1 = (y0 + 1).min(size.height - 1);
    let ax = x - x0 as f32;
    let ay = y - y0 as f32;

    let at = |px: usize, py: usize| plane[py * size.width + px];
    let top = at(x0, y0) * (1.0 - ax) + at(x1, y0) * ax;
    let bottom = at(x0, y1) * (1.0 - ax) + at(x1, y1) * ax;
    top * (1.0 - ay) + bottom * ay
}
