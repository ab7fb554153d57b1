// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Inertial log integration tests.

mod common;

use std::fs;

use common::{inertial_calibration, inertial_log};
use nalgebra::Vector3;
use seqplay::io::inertial::NOISE_REFERENCE_INTERVAL;
use seqplay::io::InertialStream;
use seqplay::{ErrorCategory, PlaybackError};

fn write_pair(log: &str, calib: &str) -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("imu.txt");
    let calib_path = dir.path().join("imu_calib.txt");
    fs::write(&log_path, log).unwrap();
    fs::write(&calib_path, calib).unwrap();
    (dir, log_path, calib_path)
}

#[test]
fn test_load_log_and_calibration() {
    let (_dir, log, calib) = write_pair(&inertial_log(10), inertial_calibration());
    let stream = InertialStream::load(&log, &calib).unwrap();

    assert_eq!(stream.len(), 10);
    let first = stream.samples()[0];
    assert_eq!(first.timestamp, 100.0);
    assert_eq!(first.gyro, Vector3::new(0.01, 0.02, 0.03));
    assert_eq!(first.accel, Vector3::new(9.81, 0.0, 0.1));

    let c = stream.calibration();
    assert_eq!(c.translation, Vector3::new(0.1, 0.2, 0.3));
    let expected = 0.0017 * 0.0017 / NOISE_REFERENCE_INTERVAL;
    assert!((c.gyro_covariance[(0, 0)] - expected).abs() < 1e-15);
    assert!((c.accel_random_walk[(2, 2)] - 0.003 * 0.003).abs() < 1e-15);
}

#[test]
fn test_count_until_frame_time() {
    let (_dir, log, calib) = write_pair(&inertial_log(10), inertial_calibration());
    let stream = InertialStream::load(&log, &calib).unwrap();

    assert_eq!(stream.count_until(99.0), 0);
    assert_eq!(stream.count_until(100.0), 1);
    assert_eq!(stream.count_until(100.012), 3);
    assert_eq!(stream.count_until(200.0), 10);
}

#[test]
fn test_mixed_separators_and_short_lines() {
    let log = "header\n\
               100000000000 0.1 0.2 0.3 1 2 3\n\
               100005000000;0.1;0.2;0.3;1;2;3\n\
               100010000000,0.1,0.2\n";
    let (_dir, log, calib) = write_pair(log, inertial_calibration());
    let stream = InertialStream::load(&log, &calib).unwrap();
    assert_eq!(stream.len(), 2);
    assert_eq!(stream.samples()[1].accel, Vector3::new(1.0, 2.0, 3.0));
}

#[test]
fn test_truncated_calibration_is_parse_error() {
    let (_dir, log, calib) = write_pair(&inertial_log(2), "1 0 0 0\n0 1 0 0\n0 0 1 0\n0 0 0 1\n0.1\n");
    let err = InertialStream::load(&log, &calib).unwrap_err();
    assert!(matches!(err, PlaybackError::Parse { .. }));
    assert_eq!(err.category(), ErrorCategory::Data);
}
