// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Sequence ingestion.
//!
//! This module provides access to the recorded data of a sequence: the
//! frame storage, the per-frame timestamp and exposure ledger, and the
//! inertial log.

pub mod backend;
pub mod detection;
pub mod inertial;
pub mod ledger;
pub mod traits;

// Re-exports
pub use backend::{open_backend, ArchiveBackend, DirectoryBackend};
pub use detection::{detect_backend, is_archive_path, BackendKind};
pub use inertial::{InertialCalibration, InertialSample, InertialStream};
pub use ledger::{TimestampExposureLedger, TimestampRecord};
pub use traits::{Entry, StorageBackend};
