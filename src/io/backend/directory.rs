// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Flat directory backend.

use std::borrow::Cow;
use std::path::Path;

use tracing::debug;

use crate::io::detection::BackendKind;
use crate::io::traits::{sorted_entries, Entry, StorageBackend};
use crate::{PlaybackError, Result};

/// Backend over a flat directory of frame files.
///
/// The directory is listed once, non-recursively. Entry names are full
/// paths: every listed name is joined onto the directory path, so entries
/// can be read without knowing where the sequence lives.
pub struct DirectoryBackend {
    path: String,
    entries: Vec<Entry>,
}

impl DirectoryBackend {
    /// List `path` and build the sorted entry table.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let dir = path.as_ref();
        let listing =
            std::fs::read_dir(dir).map_err(|e| PlaybackError::backend_init(dir, e.to_string()))?;

        let mut names = Vec::new();
        for item in listing {
            let item = item.map_err(|e| PlaybackError::backend_init(dir, e.to_string()))?;
            let name = item.file_name().to_string_lossy().into_owned();
            if name == "." || name == ".." {
                continue;
            }
            names.push(name);
        }

        // Sort bare names, prefix afterwards
        let entries = sorted_entries(names)
            .into_iter()
            .map(|entry| Entry::new(entry.index, prefix_with_dir(dir, &entry.name)))
            .collect::<Vec<_>>();

        debug!(path = %dir.display(), entries = entries.len(), "listed image directory");

        Ok(Self {
            path: dir.to_string_lossy().into_owned(),
            entries,
        })
    }
}

fn prefix_with_dir(dir: &Path, name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        dir.join(name).to_string_lossy().into_owned()
    }
}

impl StorageBackend for DirectoryBackend {
    fn entries(&self) -> &[Entry] {
        &self.entries
    }

    fn read_raw(&mut self, index: usize) -> Result<Cow<'_, [u8]>> {
        let entry = self.entry(index)?;
        let bytes = std::fs::read(&entry.name)?;
        Ok(Cow::Owned(bytes))
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Directory
    }

    fn path(&self) -> &str {
        &self.path
    }
}
