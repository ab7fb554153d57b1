// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Entry index to undistorted image.

use tracing::{debug, info};

use super::decode::FrameDecoder;
use super::{MaterializedImage, RawPixels};
use crate::calib::CalibrationBinding;
use crate::core::{BitDepth, ColorMode, ImageSize, PixelEncoding};
use crate::io::ledger::TimestampExposureLedger;
use crate::io::traits::StorageBackend;
use crate::{PlaybackError, Result};

/// Anything the scheduler can pull frames from.
pub trait FrameSource {
    /// Number of frames available.
    fn frame_count(&self) -> usize;

    /// Produce the frame at `index`.
    fn materialize(&mut self, index: usize) -> Result<MaterializedImage>;
}

/// Reads, decodes and undistorts backend entries.
pub struct ImageMaterializer {
    backend: Box<dyn StorageBackend>,
    calibration: CalibrationBinding,
    ledger: TimestampExposureLedger,
    decoder: Box<dyn FrameDecoder>,
    encoding: PixelEncoding,
}

impl ImageMaterializer {
    /// Create a materializer.
    ///
    /// Fails with [`PlaybackError::UnsupportedEncoding`] for 16-bit color.
    pub fn new(
        backend: Box<dyn StorageBackend>,
        calibration: CalibrationBinding,
        ledger: TimestampExposureLedger,
        decoder: Box<dyn FrameDecoder>,
        encoding: PixelEncoding,
    ) -> Result<Self> {
        encoding.validate()?;
        info!(
            entries = backend.len(),
            encoding = %encoding,
            output = %calibration.output_size(),
            "materializer ready"
        );
        Ok(Self {
            backend,
            calibration,
            ledger,
            decoder,
            encoding,
        })
    }

    /// The storage backend.
    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    /// The bound calibration.
    pub fn calibration(&self) -> &CalibrationBinding {
        &self.calibration
    }

    /// The timestamp and exposure ledger.
    pub fn ledger(&self) -> &TimestampExposureLedger {
        &self.ledger
    }

    /// Pixel encoding of the sequence.
    pub fn encoding(&self) -> PixelEncoding {
        self.encoding
    }

    /// Give the backend back, consuming the materializer.
    pub fn into_backend(self) -> Box<dyn StorageBackend> {
        self.backend
    }

    fn check_size(&self, name: &str, size: ImageSize) -> Result<()> {
        let expected = self.calibration.original_size();
        if size != expected {
            return Err(PlaybackError::decode(
                name,
                format!("frame is {size}, calibration expects {expected}"),
            ));
        }
        Ok(())
    }
}

impl FrameSource for ImageMaterializer {
    fn frame_count(&self) -> usize {
        self.backend.len()
    }

    fn materialize(&mut self, index: usize) -> Result<MaterializedImage> {
        self.encoding.validate()?;

        let exposure = self.ledger.frame_exposure(index);
        let timestamp = self.ledger.frame_timestamp(index);
        let name = self.backend.entry(index)?.name.clone();
        let undistorter = self.calibration.undistorter();

        let image = match (self.encoding.depth, self.encoding.color) {
            (BitDepth::Sixteen, ColorMode::Mono) => {
                let decoded = {
                    let raw = self.backend.read_raw(index)?;
                    self.decoder.decode_mono16(&name, &raw)?
                };
                self.check_size(&name, decoded.size)?;
                undistorter.undistort(
                    RawPixels::Mono16(&decoded.pixels),
                    exposure,
                    timestamp,
                    BitDepth::Sixteen.rectification_gain(),
                    false,
                )?
            }
            (BitDepth::Eight, ColorMode::Mono) => {
                let decoded = {
                    let raw = self.backend.read_raw(index)?;
                    self.decoder.decode_mono8(&name, &raw)?
                };
                self.check_size(&name, decoded.size)?;
                undistorter.undistort(
                    RawPixels::Mono8(&decoded.pixels),
                    exposure,
                    timestamp,
                    BitDepth::Eight.rectification_gain(),
                    false,
                )?
            }
            (BitDepth::Eight, ColorMode::Color) => {
                let decoded = {
                    let raw = self.backend.read_raw(index)?;
                    self.decoder.decode_color8(&name, &raw)?
                };
                self.check_size(&name, decoded.size)?;
                let mut image = undistorter.undistort(
                    RawPixels::Mono8(&decoded.luma),
                    exposure,
                    timestamp,
                    1.0,
                    true,
                )?;
                undistorter.undistort_color(
                    [&decoded.red[..], &decoded.green[..], &decoded.blue[..]],
                    &mut image,
                    exposure,
                    timestamp,
                )?;
                image
            }
            (BitDepth::Sixteen, ColorMode::Color) => {
                return Err(PlaybackError::unsupported_encoding(
                    "16-bit color frames are not supported",
                ))
            }
        };

        debug!(index, name = %name, exposure, timestamp, "materialized frame");
        Ok(image)
    }
}
