// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Observer that logs every published frame.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

use super::OutputObserver;
use crate::frame::MaterializedImage;

/// Logs each published frame at `info` level.
#[derive(Debug, Default)]
pub struct SampleObserver {
    published: AtomicUsize,
}

impl SampleObserver {
    /// Create a new observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames published since the last reset.
    pub fn published(&self) -> usize {
        self.published.load(Ordering::Relaxed)
    }
}

impl OutputObserver for SampleObserver {
    fn name(&self) -> &str {
        "sample"
    }

    fn publish_frame(&self, image: &MaterializedImage, id: usize) {
        let count = self.published.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            id,
            timestamp = image.timestamp(),
            exposure = image.exposure(),
            mean = image.mean_intensity(),
            count,
            "published frame"
        );
    }

    fn reset(&self) {
        let dropped = self.published.swap(0, Ordering::Relaxed);
        info!(dropped, "sample output reset");
    }

    fn join(&self) {
        info!(published = self.published(), "sample output finished");
    }
}
