// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Cross-thread playback flags.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Requests raised outside the driver thread.
#[derive(Debug, Default)]
pub struct ControlSignals {
    reset_requested: AtomicBool,
    pause: AtomicBool,
}

impl ControlSignals {
    /// Flags with nothing requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a full engine reset after the current frame.
    pub fn request_reset(&self) {
        self.reset_requested.store(true, Ordering::SeqCst);
    }

    /// Check if a reset was requested.
    pub fn reset_requested(&self) -> bool {
        self.reset_requested.load(Ordering::SeqCst)
    }

    /// Acknowledge a reset.
    pub fn clear_reset(&self) {
        self.reset_requested.store(false, Ordering::SeqCst);
    }

    /// Pause or resume playback.
    pub fn set_paused(&self, paused: bool) {
        self.pause.store(paused, Ordering::SeqCst);
    }

    /// Check if playback is paused.
    pub fn is_paused(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }
}

/// Liveness of the visualization consumer, polled by the driver.
#[derive(Debug, Clone)]
pub struct LivenessFlag(Arc<AtomicBool>);

impl LivenessFlag {
    /// A live flag.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Check if the consumer is still running.
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Report the consumer as gone.
    pub fn mark_dead(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for LivenessFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_round_trip() {
        let signals = ControlSignals::new();
        assert!(!signals.reset_requested());
        signals.request_reset();
        assert!(signals.reset_requested());
        signals.clear_reset();
        assert!(!signals.reset_requested());
    }

    #[test]
    fn test_liveness_shared_between_clones() {
        let flag = LivenessFlag::new();
        let consumer = flag.clone();
        assert!(flag.is_alive());
        consumer.mark_dead();
        assert!(!flag.is_alive());
    }
}
