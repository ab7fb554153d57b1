// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Storage backends for recorded sequences.
//!
//! Two variants implement [`StorageBackend`](crate::io::traits::StorageBackend):
//! - [`DirectoryBackend`] - a flat directory of frame files
//! - [`ArchiveBackend`] - a `.zip` archive of frame files
//!
//! [`open_backend`] selects the variant from the path suffix.
//!
//! # Example
//!
//! ```rust,no_run
//! use seqplay::core::ImageSize;
//! use seqplay::io::backend::open_backend;
//!
//! let mut backend = open_backend("mav0/cam0/data", ImageSize::new(752, 480))?;
//! let entries = backend.len();
//! let first = backend.read_raw(0)?;
//! println!("{} entries, first is {} bytes", entries, first.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod archive;
pub mod directory;

pub use archive::{ArchiveBackend, ArchiveSource, ArchiveSupport, ScratchBuffer};
pub use directory::DirectoryBackend;

use std::path::Path;

use tracing::info;

use crate::core::ImageSize;
use crate::io::detection::{detect_backend, BackendKind};
use crate::io::traits::StorageBackend;
use crate::Result;

/// Open the backend matching `path`.
///
/// `frame_size` is the original frame size from the calibration; only the
/// archive backend uses it, to budget its scratch buffer.
pub fn open_backend<P: AsRef<Path>>(
    path: P,
    frame_size: ImageSize,
) -> Result<Box<dyn StorageBackend>> {
    let path = path.as_ref();
    let backend: Box<dyn StorageBackend> = match detect_backend(path) {
        BackendKind::Archive => Box::new(ArchiveBackend::open(path, frame_size)?),
        BackendKind::Directory => Box::new(DirectoryBackend::open(path)?),
    };

    info!(
        kind = %backend.kind(),
        path = %path.display(),
        entries = backend.len(),
        "opened sequence"
    );
    Ok(backend)
}
