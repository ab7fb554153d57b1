// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Raw frame decoding.

use crate::core::ImageSize;
use crate::{PlaybackError, Result};

/// A decoded single-channel frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame<T> {
    /// Frame size
    pub size: ImageSize,
    /// Row-major samples
    pub pixels: Vec<T>,
}

/// A decoded 8-bit color frame split into planes.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedColor {
    /// Frame size
    pub size: ImageSize,
    /// Luma used for tracking
    pub luma: Vec<u8>,
    /// Red plane
    pub red: Vec<u8>,
    /// Green plane
    pub green: Vec<u8>,
    /// Blue plane
    pub blue: Vec<u8>,
}

/// Turns encoded entry bytes into pixels.
pub trait FrameDecoder: Send {
    /// Decode to 8-bit intensities.
    fn decode_mono8(&self, name: &str, bytes: &[u8]) -> Result<DecodedFrame<u8>>;

    /// Decode to 16-bit intensities.
    fn decode_mono16(&self, name: &str, bytes: &[u8]) -> Result<DecodedFrame<u16>>;

    /// Decode to luma plus red, green and blue planes.
    fn decode_color8(&self, name: &str, bytes: &[u8]) -> Result<DecodedColor>;
}

/// [`FrameDecoder`] backed by the `image` crate (PNG and JPEG).
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecDecoder;

impl CodecDecoder {
    /// Create a new decoder.
    pub fn new() -> Self {
        Self
    }

    fn load(name: &str, bytes: &[u8]) -> Result<image::DynamicImage> {
        image::load_from_memory(bytes).map_err(|e| PlaybackError::decode(name, e.to_string()))
    }
}

impl FrameDecoder for CodecDecoder {
    fn decode_mono8(&self, name: &str, bytes: &[u8]) -> Result<DecodedFrame<u8>> {
        let gray = Self::load(name, bytes)?.into_luma8();
        Ok(DecodedFrame {
            size: ImageSize::new(gray.width() as usize, gray.height() as usize),
            pixels: gray.into_raw(),
        })
    }

    fn decode_mono16(&self, name: &str, bytes: &[u8]) -> Result<DecodedFrame<u16>> {
        let gray = Self::load(name, bytes)?.into_luma16();
        Ok(DecodedFrame {
            size: ImageSize::new(gray.width() as usize, gray.height() as usize),
            pixels: gray.into_raw(),
        })
    }

    fn decode_color8(&self, name: &str, bytes: &[u8]) -> Result<DecodedColor> {
        let decoded = Self::load(name, bytes)?;
        let luma = decoded.to_luma8().into_raw();
        let rgb = decoded.into_rgb8();
        let size = ImageSize::new(rgb.width() as usize, rgb.height() as usize);

        let mut red = Vec::with_capacity(size.area());
        let mut green = Vec::with_capacity(size.area());
        let mut blue = Vec::with_capacity(size.area());
        for pixel in rgb.pixels() {
            red.push(pixel[0]);
            green.push(pixel[1]);
            blue.push(pixel[2]);
        }

        Ok(DecodedColor {
            size,
            luma,
            red,
            green,
            blue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(img: impl Into<DynamicImage>) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.into().write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_mono8() {
        let img = GrayImage::from_fn(3, 2, |x, y| Luma([(x + 10 * y) as u8]));
        let frame = CodecDecoder::new().decode_mono8("a.png", &png(img)).unwrap();
        assert_eq!(frame.size, ImageSize::new(3, 2));
        assert_eq!(frame.pixels, vec![0, 1, 2, 10, 11, 12]);
    }

    #[test]
    fn test_decode_mono16() {
        let img: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(2, 1, |x, _| Luma([1000 + x as u16]));
        let frame = CodecDecoder::new().decode_mono16("a.png", &png(img)).unwrap();
        assert_eq!(frame.pixels, vec![1000, 1001]);
    }

    #[test]
    fn test_decode_color_planes() {
        let img = RgbImage::from_fn(2, 1, |x, _| Rgb([10 * x as u8 + 1, 2, 3]));
        let color = CodecDecoder::new().decode_color8("c.png", &png(img)).unwrap();
        assert_eq!(color.red, vec![1, 11]);
        assert_eq!(color.green, vec![2, 2]);
        assert_eq!(color.blue, vec![3, 3]);
        assert_eq!(color.luma.len(), 2);
    }

    #[test]
    fn test_decode_garbage() {
        let err = CodecDecoder::new()
            .decode_mono8("bad.png", b"not an image")
            .unwrap_err();
        assert!(matches!(err, PlaybackError::Decode { name, .. } if name == "bad.png"));
    }
}
