// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Engine ownership and in-place rebuilds.
//!
//! The controller is the only owner of the engine. Everything else borrows
//! it for a single call, so no handle survives a rebuild.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::control::ControlSignals;
use crate::engine::{DownstreamEngine, EngineFactory, EngineSettings, SharedObserver};
use crate::frame::MaterializedImage;
use crate::{PlaybackError, Result};

/// Plan positions below this may trigger an automatic rebuild.
pub const RESTART_GRACE_FRAMES: usize = 250;

/// Pause between resetting observers and rebuilding the engine.
pub const CLEANUP_PAUSE: Duration = Duration::from_millis(20);

/// What the scheduler should do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Keep playing
    Continue,
    /// The engine was rebuilt; keep playing with the new one
    Restarted,
    /// Tracking is lost; stop playback
    Lost,
}

/// Stands in for the engine between dropping one generation and building
/// the next.
#[derive(Default)]
struct DetachedEngine {
    observers: Vec<SharedObserver>,
}

impl DownstreamEngine for DetachedEngine {
    fn add_active_frame(&mut self, _image: &MaterializedImage, id: usize) -> Result<()> {
        Err(PlaybackError::engine(format!(
            "frame {id} delivered while no engine is attached"
        )))
    }

    fn is_initialized(&self) -> bool {
        false
    }

    fn init_failed(&self) -> bool {
        false
    }

    fn is_lost(&self) -> bool {
        false
    }

    fn block_until_mapping_finished(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_result(&self, _path: &Path) -> Result<()> {
        Err(PlaybackError::engine("no engine attached"))
    }

    fn set_observers(&mut self, observers: Vec<SharedObserver>) {
        self.observers = observers;
    }

    fn observers(&self) -> &[SharedObserver] {
        &self.observers
    }
}

/// Owns the engine and rebuilds it when initialization fails.
pub struct RecoveryController {
    engine: Box<dyn DownstreamEngine>,
    factory: Box<dyn EngineFactory>,
    settings: EngineSettings,
    observers: Vec<SharedObserver>,
    signals: Arc<ControlSignals>,
    generation: usize,
    cleanup_pause: Duration,
}

impl RecoveryController {
    /// Build the first engine and attach the observers.
    pub fn new(
        factory: Box<dyn EngineFactory>,
        settings: EngineSettings,
        observers: Vec<SharedObserver>,
        signals: Arc<ControlSignals>,
    ) -> Result<Self> {
        let mut engine = factory.build(&settings)?;
        engine.set_observers(observers.clone());
        Ok(Self {
            engine,
            factory,
            settings,
            observers,
            signals,
            generation: 0,
            cleanup_pause: CLEANUP_PAUSE,
        })
    }

    /// Override the pause taken before each rebuild.
    pub fn with_cleanup_pause(mut self, pause: Duration) -> Self {
        self.cleanup_pause = pause;
        self
    }

    /// Borrow the current engine.
    pub fn engine(&self) -> &dyn DownstreamEngine {
        self.engine.as_ref()
    }

    /// Borrow the current engine mutably.
    pub fn engine_mut(&mut self) -> &mut dyn DownstreamEngine {
        self.engine.as_mut()
    }

    /// Settings every engine generation is built from.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Observers shared by every engine generation.
    pub fn observers(&self) -> &[SharedObserver] {
        &self.observers
    }

    /// Number of rebuilds so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Hand one frame to the current engine.
    pub fn deliver(&mut self, image: &MaterializedImage, id: usize) -> Result<()> {
        self.engine.add_active_frame(image, id)
    }

    /// Check the engine after the frame at plan position `position`.
    ///
    /// A failed initialization rebuilds the engine while `position` is
    /// inside the grace window; an explicit reset request always does.
    pub fn after_frame(&mut self, position: usize) -> Result<RecoveryAction> {
        let reset_requested = self.signals.reset_requested();
        if (self.engine.init_failed() || reset_requested)
            && (position < RESTART_GRACE_FRAMES || reset_requested)
        {
            self.rebuild(position, reset_requested)?;
            return Ok(RecoveryAction::Restarted);
        }

        if self.engine.is_lost() {
            warn!(position, "engine lost tracking");
            return Ok(RecoveryAction::Lost);
        }
        Ok(RecoveryAction::Continue)
    }

    fn rebuild(&mut self, position: usize, requested: bool) -> Result<()> {
        info!(
            position,
            requested,
            generation = self.generation + 1,
            "resetting engine"
        );
        for observer in &self.observers {
            observer.reset();
        }
        if !self.cleanup_pause.is_zero() {
            std::thread::sleep(self.cleanup_pause);
        }

        let previous = std::mem::replace(&mut self.engine, Box::<DetachedEngine>::default());
        drop(previous);
        let mut engine = self.factory.build(&self.settings)?;
        engine.set_observers(self.observers.clone());
        self.engine = engine;

        self.signals.clear_reset();
        self.generation += 1;
        Ok(())
    }

    /// Join the observers, then drop the engine.
    pub fn shutdown(self) {
        for observer in &self.observers {
            observer.join();
        }
        drop(self.engine);
        info!(generations = self.generation + 1, "engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calib::GlobalCalibration;
    use crate::core::ImageSize;
    use crate::engine::OutputObserver;
    use nalgebra::Matrix3;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Engine whose init failure and loss are driven by shared flags.
    struct FlagEngine {
        init_failed: Arc<AtomicBool>,
        lost: Arc<AtomicBool>,
        live: Arc<AtomicUsize>,
        observers: Vec<SharedObserver>,
    }

    impl Drop for FlagEngine {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl DownstreamEngine for FlagEngine {
        fn add_active_frame(&mut self, _image: &MaterializedImage, _id: usize) -> Result<()> {
            Ok(())
        }
        fn is_initialized(&self) -> bool {
            false
        }
        fn init_failed(&self) -> bool {
            self.init_failed.load(Ordering::SeqCst)
        }
        fn is_lost(&self) -> bool {
            self.lost.load(Ordering::SeqCst)
        }
        fn block_until_mapping_finished(&mut self) -> Result<()> {
            Ok(())
        }
        fn write_result(&self, _path: &Path) -> Result<()> {
            Ok(())
        }
        fn set_observers(&mut self, observers: Vec<SharedObserver>) {
            self.observers = observers;
        }
        fn observers(&self) -> &[SharedObserver] {
            &self.observers
        }
    }

    #[derive(Default)]
    struct ResetCounter(AtomicUsize);

    impl OutputObserver for ResetCounter {
        fn name(&self) -> &str {
            "resets"
        }
        fn publish_frame(&self, _image: &MaterializedImage, _id: usize) {}
        fn reset(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn join(&self) {}
    }

    struct Harness {
        controller: RecoveryController,
        init_failed: Arc<AtomicBool>,
        lost: Arc<AtomicBool>,
        builds: Arc<AtomicUsize>,
        live_at_build: Arc<Mutex<Vec<usize>>>,
        observer: Arc<ResetCounter>,
        signals: Arc<ControlSignals>,
    }

    fn harness() -> Harness {
        let init_failed = Arc::new(AtomicBool::new(false));
        let lost = Arc::new(AtomicBool::new(false));
        let builds = Arc::new(AtomicUsize::new(0));
        let live = Arc::new(AtomicUsize::new(0));
        let live_at_build = Arc::new(Mutex::new(Vec::new()));
        let observer = Arc::new(ResetCounter::default());
        let signals = Arc::new(ControlSignals::new());

        let (f, l, b) = (init_failed.clone(), lost.clone(), builds.clone());
        let (alive, seen) = (live.clone(), live_at_build.clone());
        let factory = move |_: &EngineSettings| -> Result<Box<dyn DownstreamEngine>> {
            b.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push(alive.fetch_add(1, Ordering::SeqCst));
            Ok(Box::new(FlagEngine {
                init_failed: f.clone(),
                lost: l.clone(),
                live: alive.clone(),
                observers: Vec::new(),
            }))
        };
        let settings = EngineSettings::new(GlobalCalibration {
            size: ImageSize::new(2, 2),
            intrinsics: Matrix3::identity(),
        });
        let controller = RecoveryController::new(
            Box::new(factory),
            settings,
            vec![observer.clone() as SharedObserver],
            signals.clone(),
        )
        .unwrap()
        .with_cleanup_pause(Duration::ZERO);

        Harness {
            controller,
            init_failed,
            lost,
            builds,
            live_at_build,
            observer,
            signals,
        }
    }

    #[test]
    fn test_init_failure_inside_window_restarts() {
        let mut h = harness();
        let before = h.controller.engine().observers()[0].clone();
        h.init_failed.store(true, Ordering::SeqCst);

        assert_eq!(h.controller.after_frame(10).unwrap(), RecoveryAction::Restarted);
        assert_eq!(h.builds.load(Ordering::SeqCst), 2);
        assert_eq!(h.observer.0.load(Ordering::SeqCst), 1);
        assert_eq!(h.controller.generation(), 1);

        let after = h.controller.engine().observers()[0].clone();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_rebuild_drops_old_engine_before_building() {
        let mut h = harness();
        h.init_failed.store(true, Ordering::SeqCst);
        assert_eq!(h.controller.after_frame(10).unwrap(), RecoveryAction::Restarted);
        assert_eq!(*h.live_at_build.lock().unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_detached_engine_rejects_frames() {
        let mut engine = DetachedEngine::default();
        let image = MaterializedImage::new(ImageSize::new(1, 1), vec![0.0], 1.0, 0.0);
        assert!(engine.add_active_frame(&image, 3).is_err());
        assert!(!engine.is_initialized());
        assert!(!engine.init_failed());
    }

    #[test]
    fn test_init_failure_outside_window_continues() {
        let mut h = harness();
        h.init_failed.store(true, Ordering::SeqCst);
        assert_eq!(h.controller.after_frame(300).unwrap(), RecoveryAction::Continue);
        assert_eq!(h.builds.load(Ordering::SeqCst), 1);
        assert_eq!(h.observer.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_explicit_reset_always_restarts() {
        let mut h = harness();
        h.signals.request_reset();
        assert_eq!(h.controller.after_frame(300).unwrap(), RecoveryAction::Restarted);
        assert!(!h.signals.reset_requested());
        assert_eq!(h.controller.after_frame(301).unwrap(), RecoveryAction::Continue);
    }

    #[test]
    fn test_lost_is_terminal() {
        let mut h = harness();
        h.lost.store(true, Ordering::SeqCst);
        assert_eq!(h.controller.after_frame(0).unwrap(), RecoveryAction::Lost);
        assert_eq!(h.builds.load(Ordering::SeqCst), 1);
    }
}
