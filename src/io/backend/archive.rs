// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Zip archive backend.
//!
//! Members are decompressed into a scratch buffer owned by the backend and
//! reused across reads. The buffer starts at `w·h·6 + 10000` bytes, where
//! `w×h` is the original frame size, which fits 16-bit or multi-channel
//! payloads with slack. A member that fills more than `w·h·6` bytes makes the
//! buffer grow once to `w·h·30 + 10000` bytes and the member is read again.
//! A member that still fills more than `w·h·30` bytes is a fatal error.
//!
//! Archive support is a build capability (the `archive` feature). Without it
//! [`ArchiveBackend::open`] still exists and always fails, so callers never
//! need conditional compilation.

use std::borrow::Cow;
use std::io::Read;
use std::path::Path;

use tracing::{info, warn};

use crate::core::ImageSize;
use crate::io::detection::BackendKind;
use crate::io::traits::{sorted_entries, Entry, StorageBackend};
use crate::{PlaybackError, Result};

/// Extra bytes on top of the per-pixel budget.
pub const SCRATCH_SLACK: usize = 10_000;
/// Bytes per original pixel accepted before growing.
pub const INITIAL_BYTES_PER_PIXEL: usize = 6;
/// Bytes per original pixel accepted after growing.
pub const GROWN_BYTES_PER_PIXEL: usize = 30;

/// Whether this build can read archives.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveSupport;

impl ArchiveSupport {
    /// Resolved once at build time from the `archive` feature.
    pub const fn available() -> bool {
        cfg!(feature = "archive")
    }
}

/// Member-level access to an archive container.
///
/// This is the seam between the scratch buffer policy and the actual
/// container library; tests substitute in-memory sources.
pub trait ArchiveSource: Send {
    /// Names of all members, in container order.
    fn member_names(&self) -> Vec<String>;

    /// Decompress member `name` into `buf`, stopping when `buf` is full.
    ///
    /// Returns the number of bytes written.
    fn read_member(&mut self, name: &str, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// Reusable decompression buffer with a single-growth policy.
#[derive(Debug)]
pub struct ScratchBuffer {
    frame_pixels: usize,
    data: Vec<u8>,
    grown: bool,
    regrow_count: usize,
}

impl ScratchBuffer {
    /// Create an unallocated buffer for frames of `size`.
    pub fn new(size: ImageSize) -> Self {
        Self {
            frame_pixels: size.area(),
            data: Vec::new(),
            grown: false,
            regrow_count: 0,
        }
    }

    /// Current allocation in bytes (0 before the first read).
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of times the buffer has been grown.
    pub fn regrow_count(&self) -> usize {
        self.regrow_count
    }

    fn accepted_bytes(&self) -> usize {
        let per_pixel = if self.grown {
            GROWN_BYTES_PER_PIXEL
        } else {
            INITIAL_BYTES_PER_PIXEL
        };
        self.frame_pixels * per_pixel
    }

    /// Read member `name` from `source`, growing once if needed.
    pub fn read_member<S>(&mut self, source: &mut S, name: &str) -> Result<&[u8]>
    where
        S: ArchiveSource + ?Sized,
    {
        if self.data.is_empty() {
            self.data = vec![0; self.frame_pixels * INITIAL_BYTES_PER_PIXEL + SCRATCH_SLACK];
        }

        let mut read = source.read_member(name, &mut self.data)?;
        if read > self.accepted_bytes() {
            if self.grown {
                return Err(PlaybackError::EntryTooLarge {
                    name: name.to_string(),
                    read,
                    budget: self.accepted_bytes(),
                });
            }

            warn!(
                entry = name,
                read,
                capacity = self.data.len(),
                "archive entry larger than scratch buffer, growing"
            );
            self.data = vec![0; self.frame_pixels * GROWN_BYTES_PER_PIXEL + SCRATCH_SLACK];
            self.grown = true;
            self.regrow_count += 1;

            read = source.read_member(name, &mut self.data)?;
            if read > self.accepted_bytes() {
                return Err(PlaybackError::EntryTooLarge {
                    name: name.to_string(),
                    read,
                    budget: self.accepted_bytes(),
                });
            }
        }

        Ok(&self.data[..read])
    }
}

/// Backend over a zip archive of frame files.
pub struct ArchiveBackend {
    path: String,
    entries: Vec<Entry>,
    source: Box<dyn ArchiveSource>,
    scratch: ScratchBuffer,
}

impl std::fmt::Debug for ArchiveBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveBackend")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .field("scratch", &self.scratch)
            .finish()
    }
}

impl ArchiveBackend {
    /// Open the archive at `path` read-only.
    ///
    /// `frame_size` is the original (pre-rectification) frame size used to
    /// budget the scratch buffer.
    pub fn open<P: AsRef<Path>>(path: P, frame_size: ImageSize) -> Result<Self> {
        let path = path.as_ref();
        if !ArchiveSupport::available() {
            return Err(PlaybackError::ArchiveUnavailable {
                path: path.to_path_buf(),
            });
        }

        let source = open_zip_source(path)?;
        Ok(Self::with_source(path, source, frame_size))
    }

    /// Build a backend over an already opened source.
    pub fn with_source<P: AsRef<Path>>(
        path: P,
        source: Box<dyn ArchiveSource>,
        frame_size: ImageSize,
    ) -> Self {
        let members = source.member_names();
        let total = members.len();
        let names: Vec<String> = members
            .into_iter()
            .filter(|name| name != "." && name != "..")
            .collect();
        let entries = sorted_entries(names);

        info!(
            path = %path.as_ref().display(),
            members = total,
            files = entries.len(),
            "opened archive"
        );

        Self {
            path: path.as_ref().to_string_lossy().into_owned(),
            entries,
            source,
            scratch: ScratchBuffer::new(frame_size),
        }
    }

    /// The scratch buffer state.
    pub fn scratch(&self) -> &ScratchBuffer {
        &self.scratch
    }
}

impl StorageBackend for ArchiveBackend {
    fn entries(&self) -> &[Entry] {
        &self.entries
    }

    fn read_raw(&mut self, index: usize) -> Result<Cow<'_, [u8]>> {
        let len = self.entries.len();
        let entry = self
            .entries
            .get(index)
            .ok_or(PlaybackError::EntryOutOfRange { index, len })?;
        let bytes = self
            .scratch
            .read_member(self.source.as_mut(), &entry.name)?;
        Ok(Cow::Borrowed(bytes))
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Archive
    }

    fn path(&self) -> &str {
        &self.path
    }
}

/// Fill `buf` from `reader` until it is full or the reader is exhausted.
fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(feature = "archive")]
struct ZipSource {
    archive: zip::ZipArchive<std::fs::File>,
}

#[cfg(feature = "archive")]
impl ArchiveSource for ZipSource {
    fn member_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    fn read_member(&mut self, name: &str, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut member = self
            .archive
            .by_name(name)
            .map_err(std::io::Error::other)?;
        read_up_to(&mut member, buf)
    }
}

#[cfg(feature = "archive")]
fn open_zip_source(path: &Path) -> Result<Box<dyn ArchiveSource>> {
    let file =
        std::fs::File::open(path).map_err(|e| PlaybackError::archive_open(path, e.to_string()))?;
    let archive =
        zip::ZipArchive::new(file).map_err(|e| PlaybackError::archive_open(path, e.to_string()))?;
    Ok(Box::new(ZipSource { archive }))
}

#[cfg(not(feature = "archive"))]
fn open_zip_source(path: &Path) -> Result<Box<dyn ArchiveSource>> {
    Err(PlaybackError::ArchiveUnavailable {
        path: path.to_path_buf(),
    })
}
