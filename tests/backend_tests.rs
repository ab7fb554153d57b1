// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Storage backend integration tests.

mod common;

use std::fs;

use common::{archive_sequence, directory_sequence, flat_frame, frame_name, png_bytes, write_zip};
use seqplay::core::ImageSize;
use seqplay::io::{open_backend, BackendKind, StorageBackend};
use seqplay::{ErrorCategory, PlaybackError};

const SIZE: ImageSize = ImageSize {
    width: common::WIDTH as usize,
    height: common::HEIGHT as usize,
};

// ============================================================================
// Directory Backend
// ============================================================================

#[test]
fn test_directory_entries_sorted_and_prefixed() {
    let frames: Vec<_> = (0..3).map(|i| flat_frame(i * 10)).collect();
    let fixture = directory_sequence(&frames);
    fs::write(fixture.images.join("00000b.png"), b"extra").unwrap();

    let backend = open_backend(&fixture.images, SIZE).unwrap();
    assert_eq!(backend.kind(), BackendKind::Directory);
    assert_eq!(backend.len(), 4);

    let names: Vec<_> = backend.entries().iter().map(|e| e.name.clone()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    for (i, entry) in backend.entries().iter().enumerate() {
        assert_eq!(entry.index, i);
        assert!(entry.name.starts_with(&*fixture.images.to_string_lossy()));
    }
}

#[test]
fn test_directory_read_matches_file() {
    let frames = vec![flat_frame(7), flat_frame(9)];
    let fixture = directory_sequence(&frames);

    let mut backend = open_backend(&fixture.images, SIZE).unwrap();
    let bytes = backend.read_raw(1).unwrap().into_owned();
    assert_eq!(bytes, png_bytes(&frames[1]));
}

#[test]
fn test_missing_directory_is_backend_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = match open_backend(dir.path().join("nope"), SIZE) {
        Ok(_) => panic!("missing directory opened"),
        Err(e) => e,
    };
    assert!(matches!(err, PlaybackError::BackendInit { .. }));
    assert_eq!(err.category(), ErrorCategory::Backend);
}

#[test]
fn test_out_of_range_read() {
    let fixture = directory_sequence(&[flat_frame(1)]);
    let mut backend = open_backend(&fixture.images, SIZE).unwrap();
    let err = backend.read_raw(5).unwrap_err();
    assert!(matches!(
        err,
        PlaybackError::EntryOutOfRange { index: 5, len: 1 }
    ));
}

// ============================================================================
// Archive Backend
// ============================================================================

#[test]
fn test_archive_entries_sorted_by_member_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seq.zip");
    let members = [2usize, 0, 1]
        .into_iter()
        .map(|i| (frame_name(i), png_bytes(&flat_frame(i as u8))));
    write_zip(&path, members);

    let mut backend = open_backend(&path, SIZE).unwrap();
    assert_eq!(backend.kind(), BackendKind::Archive);
    let names: Vec<_> = backend.entries().iter().map(|e| e.name.clone()).collect();
    assert_eq!(names, vec![frame_name(0), frame_name(1), frame_name(2)]);

    let second = backend.read_raw(2).unwrap().into_owned();
    assert_eq!(second, png_bytes(&flat_frame(2)));
}

#[test]
fn test_archive_and_directory_agree() {
    let frames: Vec<_> = (0..4).map(|i| flat_frame(i * 30)).collect();
    let dir_fixture = directory_sequence(&frames);
    let zip_fixture = archive_sequence(&frames);

    let mut from_dir = open_backend(&dir_fixture.images, SIZE).unwrap();
    let mut from_zip = open_backend(&zip_fixture.images, SIZE).unwrap();
    assert_eq!(from_dir.len(), from_zip.len());
    for i in 0..frames.len() {
        let a = from_dir.read_raw(i).unwrap().into_owned();
        let b = from_zip.read_raw(i).unwrap().into_owned();
        assert_eq!(a, b, "entry {i}");
    }
}

#[test]
fn test_archive_entry_over_budget() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.zip");
    let tiny = ImageSize::new(1, 1);
    // Budget after growth is 30 bytes/pixel plus slack
    let oversized = vec![0u8; 30 + 10_000 + 1];
    write_zip(&path, [("00000.raw".to_string(), oversized)]);

    let mut backend = open_backend(&path, tiny).unwrap();
    let err = backend.read_raw(0).unwrap_err();
    assert!(matches!(err, PlaybackError::EntryTooLarge { .. }));
    assert_eq!(err.category(), ErrorCategory::Capacity);
}

#[test]
fn test_corrupt_archive_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.zip");
    fs::write(&path, b"not a zip file").unwrap();
    let err = match open_backend(&path, SIZE) {
        Ok(_) => panic!("corrupt archive opened"),
        Err(e) => e,
    };
    assert!(matches!(err, PlaybackError::ArchiveOpen { .. }));
}
