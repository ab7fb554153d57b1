// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core traits for sequence storage.
//!
//! This module defines the capability every storage backend provides:
//! an ordered, named collection of entries and raw byte access by index.
//! The rest of the system only ever talks to a `dyn StorageBackend`.

use std::borrow::Cow;

use crate::Result;

use super::detection::BackendKind;

/// One addressable unit of raw sensor data in a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// 0-based position after sorting
    pub index: usize,
    /// Path (directory backend) or member name (archive backend)
    pub name: String,
}

impl Entry {
    /// Create a new entry.
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

/// Build entries from unsorted names.
///
/// Names are sorted ascending (byte-wise) and numbered from zero. Backends
/// call this once at construction and never reorder afterwards.
pub fn sorted_entries(mut names: Vec<String>) -> Vec<Entry> {
    names.sort();
    names
        .into_iter()
        .enumerate()
        .map(|(index, name)| Entry::new(index, name))
        .collect()
}

/// Trait for reading raw frames from a storage backend.
///
/// # Example
///
/// ```no_run
/// use seqplay::io::traits::StorageBackend;
///
/// fn dump_sizes(backend: &mut dyn StorageBackend) -> seqplay::Result<()> {
///     for index in 0..backend.len() {
///         let bytes = backend.read_raw(index)?;
///         println!("{}: {} bytes", index, bytes.len());
///     }
///     Ok(())
/// }
/// ```
pub trait StorageBackend: Send {
    /// All entries, sorted by name.
    fn entries(&self) -> &[Entry];

    /// Read the raw bytes of entry `index`.
    ///
    /// The archive backend lends out its scratch buffer, so the returned
    /// bytes must be released before the next read.
    fn read_raw(&mut self, index: usize) -> Result<Cow<'_, [u8]>>;

    /// Backend variant.
    fn kind(&self) -> BackendKind;

    /// Path the backend was opened from.
    fn path(&self) -> &str;

    /// Number of entries.
    fn len(&self) -> usize {
        self.entries().len()
    }

    /// Check if the backend has no entries.
    fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Get an entry by index.
    fn entry(&self, index: usize) -> Result<&Entry> {
        let len = self.len();
        self.entries()
            .get(index)
            .ok_or(crate::PlaybackError::EntryOutOfRange { index, len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_entries() {
        let entries = sorted_entries(vec![
            "00010.png".to_string(),
            "00002.png".to_string(),
            "00001.png".to_string(),
        ]);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["00001.png", "00002.png", "00010.png"]);
        assert_eq!(entries[2].index, 2);
    }

    #[test]
    fn test_entry_lookup() {
        struct TestBackend {
            entries: Vec<Entry>,
        }

        impl StorageBackend for TestBackend {
            fn entries(&self) -> &[Entry] {
                &self.entries
            }

            fn read_raw(&mut self, index: usize) -> Result<Cow<'_, [u8]>> {
                self.entry(index)?;
                Ok(Cow::Owned(vec![index as u8]))
            }

            fn kind(&self) -> BackendKind {
                BackendKind::Directory
            }

            fn path(&self) -> &str {
                "test"
            }
        }

        let mut backend = TestBackend {
            entries: sorted_entries(vec!["b".to_string(), "a".to_string()]),
        };

        assert_eq!(backend.len(), 2);
        assert!(!backend.is_empty());
        assert_eq!(backend.entry(1).unwrap().name, "b");
        assert!(backend.entry(2).is_err());
        assert_eq!(backend.read_raw(1).unwrap().as_ref(), &[1u8]);
    }
}
