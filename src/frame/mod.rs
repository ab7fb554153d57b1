// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Frame types and image materialization.
//!
//! - [`MaterializedImage`] - an undistorted, photometrically corrected frame
//! - [`decode`] - raw byte decoding behind [`FrameDecoder`]
//! - [`materializer`] - entry index to [`MaterializedImage`]

pub mod decode;
pub mod materializer;

pub use decode::{CodecDecoder, DecodedColor, DecodedFrame, FrameDecoder};
pub use materializer::{FrameSource, ImageMaterializer};

use crate::core::ImageSize;

/// Decoded intensities handed to the undistorter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawPixels<'a> {
    /// 8-bit samples
    Mono8(&'a [u8]),
    /// 16-bit samples
    Mono16(&'a [u16]),
}

impl RawPixels<'_> {
    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            RawPixels::Mono8(data) => data.len(),
            RawPixels::Mono16(data) => data.len(),
        }
    }

    /// Check if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Undistorted red, green and blue planes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorPlanes {
    /// Red plane
    pub red: Vec<f32>,
    /// Green plane
    pub green: Vec<f32>,
    /// Blue plane
    pub blue: Vec<f32>,
}

/// A frame ready for the engine.
///
/// Owns its pixels; ownership moves to whoever consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedImage {
    size: ImageSize,
    pixels: Vec<f32>,
    color: Option<ColorPlanes>,
    exposure: f32,
    timestamp: f64,
    color_source: bool,
}

impl MaterializedImage {
    /// Create an intensity image.
    pub fn new(size: ImageSize, pixels: Vec<f32>, exposure: f32, timestamp: f64) -> Self {
        debug_assert_eq!(pixels.len(), size.area());
        Self {
            size,
            pixels,
            color: None,
            exposure,
            timestamp,
            color_source: false,
        }
    }

    /// Image size.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// Row-major intensities.
    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    /// Intensity at `(x, y)`.
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.pixels[y * self.size.width + x]
    }

    /// Color planes, when the frame came from a color sequence.
    pub fn color(&self) -> Option<&ColorPlanes> {
        self.color.as_ref()
    }

    /// Attach color planes.
    pub fn set_color(&mut self, planes: ColorPlanes) {
        self.color = Some(planes);
    }

    /// Exposure in milliseconds.
    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    /// Capture time in seconds.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Check if color planes are expected for this frame.
    pub fn is_color_source(&self) -> bool {
        self.color_source
    }

    /// Mark the frame as expecting color planes.
    pub fn set_color_source(&mut self, color_source: bool) {
        self.color_source = color_source;
    }

    /// Mean intensity, 0 for an empty image.
    pub fn mean_intensity(&self) -> f32 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        self.pixels.iter().sum::<f32>() / self.pixels.len() as f32
    }

    /// Mean absolute horizontal and vertical intensity difference.
    pub fn mean_gradient(&self) -> f32 {
        let (w, h) = (self.size.width, self.size.height);
        if w < 2 || h < 2 {
            return 0.0;
        }
        let mut sum = 0.0;
        for y in 0..h - 1 {
            for x in 0..w - 1 {
                let v = self.at(x, y);
                sum += (self.at(x + 1, y) - v).abs() + (self.at(x, y + 1) - v).abs();
            }
        }
        sum / ((w - 1) * (h - 1)) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_statistics() {
        let image = MaterializedImage::new(
            ImageSize::new(2, 2),
            vec![0.0, 10.0, 20.0, 30.0],
            1.0,
            0.5,
        );
        assert_eq!(image.mean_intensity(), 15.0);
        assert_eq!(image.at(1, 1), 30.0);
        // |10 - 0| + |20 - 0| over one cell
        assert_eq!(image.mean_gradient(), 30.0);
    }

    #[test]
    fn test_flat_image_has_no_gradient() {
        let image = MaterializedImage::new(ImageSize::new(3, 3), vec![7.0; 9], 1.0, 0.0);
        assert_eq!(image.mean_gradient(), 0.0);
        assert!(image.color().is_none());
        assert!(!image.is_color_source());
    }

    #[test]
    fn test_raw_pixels_len() {
        assert_eq!(RawPixels::Mono8(&[1, 2, 3]).len(), 3);
        assert!(RawPixels::Mono16(&[]).is_empty());
    }
}
