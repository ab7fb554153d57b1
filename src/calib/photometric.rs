// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Photometric correction: inverse response (gamma) and vignette.

use std::path::Path;

use tracing::{info, warn};

use crate::core::ImageSize;
use crate::{PlaybackError, Result};

/// How much photometric correction is applied to raw intensities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PhotometricLevel {
    /// Raw intensities scaled by the rectification gain only
    #[default]
    Off,
    /// Inverse response applied
    Response,
    /// Inverse response and vignette applied
    ResponseAndVignette,
}

impl PhotometricLevel {
    /// Check if any correction is enabled.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, PhotometricLevel::Off)
    }
}

/// A raw sample type the photometric model can index with.
pub trait RawSample: Copy {
    /// Intensity as a float.
    fn intensity(self) -> f32;
}

impl RawSample for u8 {
    fn intensity(self) -> f32 {
        self as f32
    }
}

impl RawSample for u16 {
    fn intensity(self) -> f32 {
        self as f32
    }
}

/// Loaded photometric calibration.
#[derive(Debug, Clone, Default)]
pub struct PhotometricModel {
    level: PhotometricLevel,
    response: Option<Vec<f32>>,
    vignette_inv: Option<Vec<f32>>,
}

impl PhotometricModel {
    /// No calibration at all.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Load the response and vignette files, when given.
    ///
    /// The vignette must have the original frame size.
    pub fn load(
        gamma_path: Option<&Path>,
        vignette_path: Option<&Path>,
        original_size: ImageSize,
        level: PhotometricLevel,
    ) -> Result<Self> {
        let response = match gamma_path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| PlaybackError::calibration(path, e.to_string()))?;
                Some(parse_response(&text).map_err(|reason| PlaybackError::calibration(path, reason))?)
            }
            None => None,
        };

        let vignette_inv = match vignette_path {
            Some(path) => Some(load_vignette(path, original_size)?),
            None => None,
        };

        if response.is_none() && vignette_inv.is_some() {
            warn!("vignette given without a response function, ignoring photometric calibration");
        }

        info!(
            response = response.is_some(),
            vignette = vignette_inv.is_some(),
            level = ?level,
            "photometric calibration"
        );

        Ok(Self {
            level,
            response,
            vignette_inv,
        })
    }

    /// Build a model from already normalized tables.
    pub fn from_tables(
        level: PhotometricLevel,
        response: Option<Vec<f32>>,
        vignette_inv: Option<Vec<f32>>,
    ) -> Self {
        Self {
            level,
            response,
            vignette_inv,
        }
    }

    /// The inverse response, when a valid one was loaded.
    pub fn response(&self) -> Option<&[f32]> {
        self.response.as_deref()
    }

    /// Correction level.
    pub fn level(&self) -> PhotometricLevel {
        self.level
    }

    /// Convert raw samples into corrected intensities.
    ///
    /// Without a response, with correction off, or with a non-positive
    /// exposure, every sample is only scaled by `gain`.
    pub fn apply<T: RawSample>(&self, raw: &[T], exposure: f32, gain: f32) -> Vec<f32> {
        let response = match (&self.response, self.level.is_enabled()) {
            (Some(response), true) if exposure > 0.0 => response,
            _ => return raw.iter().map(|&v| gain * v.intensity()).collect(),
        };

        let top = response.len() - 1;
        let mut out: Vec<f32> = raw
            .iter()
            .map(|&v| {
                let index = (v.intensity() * gain).round().clamp(0.0, top as f32) as usize;
                response[index]
            })
            .collect();

        if self.level == PhotometricLevel::ResponseAndVignette {
            if let Some(vignette_inv) = &self.vignette_inv {
                if vignette_inv.len() == out.len() {
                    for (value, inv) in out.iter_mut().zip(vignette_inv) {
                        *value *= inv;
                    }
                }
            }
        }
        out
    }
}

/// Parse and normalize an inverse response table.
///
/// Values must be strictly increasing; they are rescaled to `[0, 255]`.
pub fn parse_response(text: &str) -> std::result::Result<Vec<f32>, String> {
    let values = text
        .split_whitespace()
        .map(|t| t.parse::<f32>().map_err(|_| format!("'{t}' is not a number")))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if values.len() < 2 {
        return Err(format!(
            "response needs at least 2 values, found {}",
            values.len()
        ));
    }
    if values.windows(2).any(|w| w[1] <= w[0]) {
        return Err("response function is not strictly increasing".to_string());
    }

    let min = values[0];
    let max = values[values.len() - 1];
    Ok(values
        .into_iter()
        .map(|v| 255.0 * (v - min) / (max - min))
        .collect())
}

fn load_vignette(path: &Path, original_size: ImageSize) -> Result<Vec<f32>> {
    let decoded =
        image::open(path).map_err(|e| PlaybackError::calibration(path, e.to_string()))?;
    let gray = decoded.into_luma16();
    let size = ImageSize::new(gray.width() as usize, gray.height() as usize);
    if size != original_size {
        return Err(PlaybackError::calibration(
            path,
            format!("vignette is {size}, frames are {original_size}"),
        ));
    }

    let max = gray.as_raw().iter().copied().max().unwrap_or(0) as f32;
    if max <= 0.0 {
        return Err(PlaybackError::calibration(path, "vignette is all black"));
    }
    Ok(gray
        .as_raw()
        .iter()
        .map(|&v| if v > 0 { max / v as f32 } else { 0.0 })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_normalizes() {
        let response = parse_response("10 20 30\n").unwrap();
        assert_eq!(response, vec![0.0, 127.5, 255.0]);
    }

    #[test]
    fn test_parse_response_rejects_non_monotonic() {
        assert!(parse_response("0 5 5 10").is_err());
        assert!(parse_response("3").is_err());
        assert!(parse_response("0 x 2").is_err());
    }

    #[test]
    fn test_apply_without_response_scales() {
        let model = PhotometricModel::disabled();
        let out = model.apply(&[256u16, 512], 1.0, 1.0 / 256.0);
        assert_eq!(out, vec![1.0, 2.0]);
    }

    #[test]
    fn test_apply_response_lookup() {
        let response: Vec<f32> = (0..256).map(|i| (255 - i) as f32).collect();
        let model =
            PhotometricModel::from_tables(PhotometricLevel::Response, Some(response), None);
        assert_eq!(model.apply(&[0u8, 10, 255], 2.0, 1.0), vec![255.0, 245.0, 0.0]);
        // Non-positive exposure disables the lookup
        assert_eq!(model.apply(&[10u8], 0.0, 1.0), vec![10.0]);
    }

    #[test]
    fn test_apply_vignette() {
        let response: Vec<f32> = (0..256).map(|i| i as f32).collect();
        let model = PhotometricModel::from_tables(
            PhotometricLevel::ResponseAndVignette,
            Some(response),
            Some(vec![1.0, 2.0]),
        );
        assert_eq!(model.apply(&[10u8, 10], 1.0, 1.0), vec![10.0, 20.0]);
    }

    #[test]
    fn test_level_off_ignores_response() {
        let response: Vec<f32> = (0..256).map(|i| (i * 2) as f32).collect();
        let model = PhotometricModel::from_tables(PhotometricLevel::Off, Some(response), None);
        assert_eq!(model.apply(&[3u8], 1.0, 1.0), vec![3.0]);
        assert!(model.response().is_some());
    }
}
