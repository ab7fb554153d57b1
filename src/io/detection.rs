// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Backend detection from the sequence path.
//!
//! A sequence is either a flat directory of frames or a `.zip` archive of
//! them. The choice is made purely on the path suffix: a path longer than
//! the bare suffix that ends in `.zip` selects the archive backend, anything
//! else is treated as a directory.
//!
//! # Example
//!
//! ```rust
//! use seqplay::io::detection::{detect_backend, BackendKind};
//!
//! assert_eq!(detect_backend("sequence_01/images.zip"), BackendKind::Archive);
//! assert_eq!(detect_backend("sequence_01/images"), BackendKind::Directory);
//! ```

use std::path::Path;

const ARCHIVE_SUFFIX: &str = ".zip";

/// The storage backend variant a path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Flat directory of frame files
    Directory,
    /// Zip archive of frame files
    Archive,
}

impl BackendKind {
    /// Check if this is the archive variant.
    pub fn is_archive(&self) -> bool {
        matches!(self, BackendKind::Archive)
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Directory => "directory",
            BackendKind::Archive => "archive",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Select the backend variant for a sequence path.
pub fn detect_backend<P: AsRef<Path>>(path: P) -> BackendKind {
    if is_archive_path(path) {
        BackendKind::Archive
    } else {
        BackendKind::Directory
    }
}

/// Check whether a path names a `.zip` archive.
///
/// The comparison is case-sensitive and the path must be strictly longer
/// than the suffix, so a file literally called `.zip` is not an archive.
pub fn is_archive_path<P: AsRef<Path>>(path: P) -> bool {
    let text = path.as_ref().to_string_lossy();
    text.len() > ARCHIVE_SUFFIX.len() && text.ends_with(ARCHIVE_SUFFIX)
}
