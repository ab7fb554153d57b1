// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Playback plan: which entries are played, in which order, and when.

use tracing::{info, warn};

use crate::io::ledger::TimestampExposureLedger;

/// One planned frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedFrame {
    /// Backend entry index
    pub index: usize,
    /// Playback timestamp of the entry in seconds
    pub timestamp: f64,
    /// Seconds after playback start at which the frame is due
    pub offset: f64,
}

/// Ordered list of frames to play. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackPlan {
    frames: Vec<PlannedFrame>,
    speed: f64,
}

impl PlaybackPlan {
    /// Plan the range `[start, end)` over `entry_count` entries.
    ///
    /// Forward plans walk up from `start`. Reverse plans start at
    /// `min(end - 1, entry_count - 1)` and walk down to `start` inclusive.
    /// Offsets accumulate timestamp gaps divided by `speed`; with a speed
    /// of 0 every offset is 0.
    pub fn build(
        ledger: &TimestampExposureLedger,
        entry_count: usize,
        start: usize,
        end: usize,
        reverse: bool,
        speed: f64,
    ) -> Self {
        let indices: Vec<usize> = if reverse {
            if entry_count == 0 || end == 0 {
                Vec::new()
            } else {
                let first = (end - 1).min(entry_count - 1);
                if start > first {
                    Vec::new()
                } else {
                    (start..=first).rev().collect()
                }
            }
        } else {
            (start..end.min(entry_count)).collect()
        };

        let mut frames: Vec<PlannedFrame> = Vec::with_capacity(indices.len());
        for index in indices {
            let timestamp = ledger.playback_timestamp(index);
            let offset = match frames.last() {
                Some(prev) if speed != 0.0 => {
                    prev.offset + (timestamp - prev.timestamp).abs() / speed
                }
                _ => 0.0,
            };
            frames.push(PlannedFrame {
                index,
                timestamp,
                offset,
            });
        }

        if frames.is_empty() {
            warn!(start, end, entry_count, reverse, "playback range selects no frames");
        } else {
            info!(
                frames = frames.len(),
                first = frames[0].index,
                reverse,
                speed,
                "playback plan built"
            );
        }

        Self { frames, speed }
    }

    /// Planned frames in playback order.
    pub fn frames(&self) -> &[PlannedFrame] {
        &self.frames
    }

    /// Iterate over planned frames.
    pub fn iter(&self) -> std::slice::Iter<'_, PlannedFrame> {
        self.frames.iter()
    }

    /// Frame at plan position `position`.
    pub fn get(&self, position: usize) -> Option<&PlannedFrame> {
        self.frames.get(position)
    }

    /// Number of planned frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if nothing is planned.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Speed the offsets were computed for.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Entry indices in playback order.
    pub fn indices(&self) -> Vec<usize> {
        self.frames.iter().map(|f| f.index).collect()
    }
}

impl<'a> IntoIterator for &'a PlaybackPlan {
    type Item = &'a PlannedFrame;
    type IntoIter = std::slice::Iter<'a, PlannedFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ledger::TimestampRecord;

    fn ledger(timestamps: &[f64]) -> TimestampExposureLedger {
        let records = timestamps
            .iter()
            .enumerate()
            .map(|(i, &timestamp)| TimestampRecord {
                id: i as i64,
                timestamp,
                exposure: 1.0,
            })
            .collect();
        TimestampExposureLedger::from_records(records, timestamps.len())
    }

    #[test]
    fn test_forward_clamped_to_entries() {
        let plan = PlaybackPlan::build(&TimestampExposureLedger::empty(), 5, 2, 100, false, 0.0);
        assert_eq!(plan.indices(), vec![2, 3, 4]);
        assert!(plan.iter().all(|f| f.offset == 0.0));
    }

    #[test]
    fn test_reverse_walks_down_to_start() {
        let plan = PlaybackPlan::build(&TimestampExposureLedger::empty(), 7, 0, 10, true, 0.0);
        assert_eq!(plan.indices(), vec![6, 5, 4, 3, 2, 1, 0]);

        let plan = PlaybackPlan::build(&TimestampExposureLedger::empty(), 7, 2, 5, true, 0.0);
        assert_eq!(plan.indices(), vec![4, 3, 2]);
    }

    #[test]
    fn test_empty_ranges() {
        let empty = TimestampExposureLedger::empty();
        assert!(PlaybackPlan::build(&empty, 0, 0, 10, false, 1.0).is_empty());
        assert!(PlaybackPlan::build(&empty, 0, 0, 10, true, 1.0).is_empty());
        assert!(PlaybackPlan::build(&empty, 5, 4, 2, false, 1.0).is_empty());
        assert!(PlaybackPlan::build(&empty, 5, 4, 2, true, 1.0).is_empty());
        assert!(PlaybackPlan::build(&empty, 5, 0, 0, true, 1.0).is_empty());
    }

    #[test]
    fn test_offsets_scaled_by_speed() {
        let plan = PlaybackPlan::build(&ledger(&[10.0, 12.0, 13.0]), 3, 0, 3, false, 2.0);
        let offsets: Vec<f64> = plan.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0.0, 1.0, 1.5]);
        assert_eq!(plan.speed(), 2.0);
    }

    #[test]
    fn test_reverse_offsets_use_absolute_gaps() {
        let plan = PlaybackPlan::build(&ledger(&[0.0, 1.0, 3.0]), 3, 0, 3, true, 1.0);
        let offsets: Vec<f64> = plan.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0.0, 2.0, 3.0]);
    }

    #[test]
    fn test_synthetic_timing_without_ledger() {
        let plan = PlaybackPlan::build(&TimestampExposureLedger::empty(), 3, 0, 3, false, 1.0);
        assert!((plan.get(2).unwrap().offset - 0.08).abs() < 1e-12);
    }
}
