// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout seqplay.
//!
//! This module provides the foundational types for the library:
//! - [`PlaybackError`] - Error handling shared by every layer
//! - [`BitDepth`] / [`ColorMode`] - The two axes of a frame's pixel encoding

pub mod error;

use serde::{Deserialize, Serialize};

pub use error::{ErrorCategory, PlaybackError, Result};

/// Bit depth of the raw frames stored in a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BitDepth {
    /// 8 bits per sample
    #[default]
    Eight,
    /// 16 bits per sample
    Sixteen,
}

impl BitDepth {
    /// Gain applied when rectifying, mapping the raw range onto 8-bit levels.
    pub fn rectification_gain(&self) -> f32 {
        match self {
            BitDepth::Eight => 1.0,
            BitDepth::Sixteen => 1.0 / 256.0,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BitDepth::Eight => "8-bit",
            BitDepth::Sixteen => "16-bit",
        }
    }
}

/// Channel layout of the raw frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Single intensity channel
    #[default]
    Mono,
    /// Three channels (red, green, blue)
    Color,
}

impl ColorMode {
    /// Check if this is the color layout.
    pub fn is_color(&self) -> bool {
        matches!(self, ColorMode::Color)
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMode::Mono => "mono",
            ColorMode::Color => "color",
        }
    }
}

/// Error returned when parsing a [`ColorMode`] from string fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseColorModeError {
    _private: (),
}

impl std::fmt::Display for ParseColorModeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid color mode, expected 'mono' or 'color'")
    }
}

impl std::error::Error for ParseColorModeError {}

impl std::str::FromStr for ColorMode {
    type Err = ParseColorModeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mono" | "gray" | "grey" => Ok(ColorMode::Mono),
            "color" | "colour" | "rgb" => Ok(ColorMode::Color),
            _ => Err(ParseColorModeError { _private: () }),
        }
    }
}

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ImageSize {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
}

impl ImageSize {
    /// Create a new size.
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Number of pixels.
    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Full pixel encoding of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelEncoding {
    /// Sample depth
    pub depth: BitDepth,
    /// Channel layout
    pub color: ColorMode,
}

impl PixelEncoding {
    /// Create a new encoding.
    pub fn new(depth: BitDepth, color: ColorMode) -> Self {
        Self { depth, color }
    }

    /// Fail fast on combinations the materializer cannot produce.
    pub fn validate(&self) -> Result<()> {
        if self.depth == BitDepth::Sixteen && self.color.is_color() {
            return Err(PlaybackError::unsupported_encoding(
                "16-bit color frames are not supported",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for PixelEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.depth.as_str(), self.color.as_str())
    }
}
