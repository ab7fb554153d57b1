// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Per-frame timestamp and exposure ledger.
//!
//! The ledger lives in `times.txt`, next to the sequence root. Each line is
//! either `id timestamp exposure` or `id timestamp`; anything else is
//! skipped. After parsing, zero exposures are repaired from their
//! neighbours and the columns are checked against the backend entry count:
//!
//! - record count differs from the entry count: timestamps and exposures
//!   are both dropped, playback falls back to a fixed frame rate;
//! - otherwise, if any exposure is still unusable: exposures alone are
//!   dropped and every frame gets unit exposure.
//!
//! None of this is an error. The ledger is built once and never changes.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::Result;

/// Ledger file name, looked up next to the sequence root.
pub const LEDGER_FILE_NAME: &str = "times.txt";

/// Frame interval used when the ledger has no timestamps (25 Hz).
pub const SYNTHETIC_FRAME_INTERVAL: f64 = 0.04;

/// One parsed ledger line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestampRecord {
    /// Frame id as written in the file
    pub id: i64,
    /// Capture time in seconds
    pub timestamp: f64,
    /// Exposure in milliseconds, 0 when absent
    pub exposure: f32,
}

impl TimestampRecord {
    /// Parse one ledger line.
    ///
    /// Tokens are split on whitespace and each must parse whole. Returns
    /// `None` for lines that do not start with an integer id and a
    /// floating point timestamp, so `1.5 2.0 3` is skipped rather than
    /// read as id 1 with the rest shifted. A third token that is not a
    /// number is treated like a missing exposure.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let id = tokens.next()?.parse::<i64>().ok()?;
        let timestamp = tokens.next()?.parse::<f64>().ok()?;
        let exposure = tokens
            .next()
            .and_then(|t| t.parse::<f32>().ok())
            .unwrap_or(0.0);
        Some(Self {
            id,
            timestamp,
            exposure,
        })
    }
}

/// Parsed and validated timestamp/exposure columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimestampExposureLedger {
    ids: Vec<i64>,
    timestamps: Vec<f64>,
    exposures: Vec<f32>,
}

/// Where the ledger of a sequence is expected.
pub fn ledger_path<P: AsRef<Path>>(sequence_path: P) -> PathBuf {
    match sequence_path.as_ref().parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(LEDGER_FILE_NAME),
        _ => PathBuf::from(LEDGER_FILE_NAME),
    }
}

impl TimestampExposureLedger {
    /// An empty ledger: synthetic timing and unit exposure for every frame.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the ledger of the sequence at `sequence_path`.
    ///
    /// A missing ledger file is not an error; the result is empty.
    pub fn load<P: AsRef<Path>>(sequence_path: P, entry_count: usize) -> Result<Self> {
        let path = ledger_path(sequence_path);
        match File::open(&path) {
            Ok(file) => Self::from_reader(BufReader::new(file), entry_count),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "no ledger file, using synthetic timestamps");
                Ok(Self::from_records(Vec::new(), entry_count))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse ledger lines from a reader.
    pub fn from_reader<R: BufRead>(reader: R, entry_count: usize) -> Result<Self> {
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if let Some(record) = TimestampRecord::parse_line(&line) {
                records.push(record);
            }
        }
        Ok(Self::from_records(records, entry_count))
    }

    /// Build a ledger from parsed records, repairing and validating them.
    pub fn from_records(records: Vec<TimestampRecord>, entry_count: usize) -> Self {
        let mut ids = Vec::with_capacity(records.len());
        let mut timestamps = Vec::with_capacity(records.len());
        let mut exposures = Vec::with_capacity(records.len());
        for record in records {
            ids.push(record.id);
            timestamps.push(record.timestamp);
            exposures.push(record.exposure);
        }

        let unrepaired = repair_exposures(&mut exposures);
        let exposures_good = exposures.len() == entry_count && unrepaired == 0;

        if timestamps.len() != entry_count {
            warn!(
                records = timestamps.len(),
                entries = entry_count,
                "ledger does not match the sequence, dropping timestamps and exposures"
            );
            ids.clear();
            timestamps.clear();
            exposures.clear();
        }

        if timestamps.iter().any(|t| !t.is_finite()) {
            warn!("ledger has non-finite timestamps, dropping timestamps");
            ids.clear();
            timestamps.clear();
        }

        if exposures.len() != entry_count || !exposures_good {
            if !exposures.is_empty() {
                warn!(
                    exposures = exposures.len(),
                    unrepaired, "exposures unusable, using unit exposure"
                );
            }
            exposures.clear();
        }

        info!(
            entries = entry_count,
            timestamps = timestamps.len(),
            exposures = exposures.len(),
            "ledger loaded"
        );

        Self {
            ids,
            timestamps,
            exposures,
        }
    }

    /// Check if per-frame timestamps are available.
    pub fn has_timestamps(&self) -> bool {
        !self.timestamps.is_empty()
    }

    /// Check if per-frame exposures are available.
    pub fn has_exposures(&self) -> bool {
        !self.exposures.is_empty()
    }

    /// Number of timestamp records kept.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if no records were kept.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Frame id from the file, if timestamps were kept.
    pub fn id(&self, index: usize) -> Option<i64> {
        self.ids.get(index).copied()
    }

    /// Capture timestamp attached to a materialized frame (0.0 when unknown).
    pub fn frame_timestamp(&self, index: usize) -> f64 {
        self.timestamps.get(index).copied().unwrap_or(0.0)
    }

    /// Exposure attached to a materialized frame (1.0 when unknown).
    pub fn frame_exposure(&self, index: usize) -> f32 {
        if self.exposures.is_empty() {
            return 1.0;
        }
        self.exposures.get(index).copied().unwrap_or(1.0)
    }

    /// Timestamp used for playback scheduling.
    ///
    /// Without a ledger the sequence is assumed to run at a fixed rate of
    /// one frame every [`SYNTHETIC_FRAME_INTERVAL`] seconds. Indices outside
    /// a non-empty ledger map to 0.
    pub fn playback_timestamp(&self, index: usize) -> f64 {
        if self.timestamps.is_empty() {
            return index as f64 * SYNTHETIC_FRAME_INTERVAL;
        }
        self.timestamps.get(index).copied().unwrap_or(0.0)
    }

    /// All kept timestamps.
    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    /// All kept exposures.
    pub fn exposures(&self) -> &[f32] {
        &self.exposures
    }
}

/// Fill zero exposures with the mean of their positive neighbours.
///
/// Repairs happen left to right in place. Returns how many values are
/// still zero afterwards.
fn repair_exposures(exposures: &mut [f32]) -> usize {
    let mut unrepaired = 0;
    for i in 0..exposures.len() {
        if exposures[i] == 0.0 {
            let mut sum = 0.0;
            let mut count = 0.0;
            if i > 0 && exposures[i - 1] > 0.0 {
                sum += exposures[i - 1];
                count += 1.0;
            }
            if i + 1 < exposures.len() && exposures[i + 1] > 0.0 {
                sum += exposures[i + 1];
                count += 1.0;
            }
            if count > 0.0 {
                exposures[i] = sum / count;
            }
        }
        if exposures[i] == 0.0 {
            unrepaired += 1;
        }
    }
    unrepaired
}
