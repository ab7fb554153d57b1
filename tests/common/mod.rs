// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageFormat, Luma};
use tempfile::TempDir;

// ============================================================================
// Frames
// ============================================================================

/// Frame width of generated sequences.
pub const WIDTH: u32 = 8;
/// Frame height of generated sequences.
pub const HEIGHT: u32 = 6;

/// Checkerboard frame with strong gradients.
pub fn textured_frame(seed: u8) -> GrayImage {
    GrayImage::from_fn(WIDTH, HEIGHT, |x, y| {
        if (x + y) % 2 == 0 {
            Luma([200u8.saturating_add(seed % 50)])
        } else {
            Luma([20])
        }
    })
}

/// Frame of a single intensity.
pub fn flat_frame(value: u8) -> GrayImage {
    GrayImage::from_pixel(WIDTH, HEIGHT, Luma([value]))
}

/// PNG encoding of `frame`.
pub fn png_bytes(frame: &GrayImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    frame
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

/// Frame file name for entry `i`.
pub fn frame_name(i: usize) -> String {
    format!("{i:05}.png")
}

// ============================================================================
// Sequence Fixtures
// ============================================================================

/// A generated sequence on disk.
pub struct SequenceFixture {
    /// Owns the temporary directory
    pub dir: TempDir,
    /// Image directory or archive
    pub images: PathBuf,
    /// Geometric calibration
    pub calib: PathBuf,
}

impl SequenceFixture {
    /// Root of the fixture.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `times.txt` next to the images.
    pub fn write_ledger(&self, lines: &[String]) {
        let mut file = File::create(self.root().join("times.txt")).expect("create ledger");
        for line in lines {
            writeln!(file, "{line}").expect("write ledger");
        }
    }

    /// Write a ledger with one record per frame at `interval` seconds.
    pub fn write_regular_ledger(&self, frames: usize, interval: f64) {
        let lines: Vec<String> = (0..frames)
            .map(|i| format!("{} {:.6} {}", i, 100.0 + i as f64 * interval, 10.0))
            .collect();
        self.write_ledger(&lines);
    }
}

/// Write the pinhole calibration of generated frames, without rectification.
pub fn write_calibration(path: &Path) {
    fs::write(
        path,
        format!("Pinhole 8 8 3.5 2.5 0\n{WIDTH} {HEIGHT}\nnone\n{WIDTH} {HEIGHT}\n"),
    )
    .expect("write calibration");
}

/// Sequence stored as a directory of PNG files.
pub fn directory_sequence(frames: &[GrayImage]) -> SequenceFixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let images = dir.path().join("images");
    fs::create_dir(&images).expect("create images dir");
    for (i, frame) in frames.iter().enumerate() {
        fs::write(images.join(frame_name(i)), png_bytes(frame)).expect("write frame");
    }
    let calib = dir.path().join("camera.txt");
    write_calibration(&calib);
    SequenceFixture { dir, images, calib }
}

/// Sequence stored as a zip archive of PNG files.
pub fn archive_sequence(frames: &[GrayImage]) -> SequenceFixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let images = dir.path().join("images.zip");
    write_zip(
        &images,
        frames
            .iter()
            .enumerate()
            .map(|(i, frame)| (frame_name(i), png_bytes(frame))),
    );
    let calib = dir.path().join("camera.txt");
    write_calibration(&calib);
    SequenceFixture { dir, images, calib }
}

/// Write a zip archive with the given members, in the given order.
pub fn write_zip(path: &Path, members: impl IntoIterator<Item = (String, Vec<u8>)>) {
    let file = File::create(path).expect("create zip");
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, bytes) in members {
        zip.start_file(name, options).expect("start member");
        zip.write_all(&bytes).expect("write member");
    }
    zip.finish().expect("finish zip");
}

// ============================================================================
// Inertial Fixtures
// ============================================================================

/// Inertial log with a header and `count` samples at 200 Hz from 100 s.
pub fn inertial_log(count: usize) -> String {
    let mut text = String::from("#timestamp [ns],w_x,w_y,w_z,a_x,a_y,a_z\n");
    for i in 0..count {
        let ns = 100_000_000_000u64 + i as u64 * 5_000_000;
        text.push_str(&format!("{ns},0.01,0.02,0.03,9.81,0.0,0.1\n"));
    }
    text
}

/// Inertial calibration with identity rotation.
pub fn inertial_calibration() -> &'static str {
    "1 0 0 0.1\n0 1 0 0.2\n0 0 1 0.3\n0 0 0 1\n0.0017\n0.02\n0.0002\n0.003\n"
}
