// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! End-to-end playback tests: fixture on disk through materialization,
//! scheduling, the frame-log engine and recovery.

mod common;

use std::cell::Cell;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use common::{archive_sequence, directory_sequence, flat_frame, textured_frame, SequenceFixture};
use image::{ImageFormat, Rgb, RgbImage};
use seqplay::calib::{CalibrationBinding, CalibrationOptions, CalibrationPaths};
use seqplay::core::{BitDepth, ColorMode, PixelEncoding};
use seqplay::engine::{
    DownstreamEngine, EngineSettings, FrameLogConfig, FrameLogEngine, SampleObserver,
    SharedObserver,
};
use seqplay::frame::{CodecDecoder, FrameSource, ImageMaterializer, MaterializedImage};
use seqplay::io::{open_backend, StorageBackend, TimestampExposureLedger};
use seqplay::playback::{
    Clock, ControlSignals, LivenessFlag, ManualClock, PlaybackOutcome, PlaybackPlan,
    PlaybackScheduler, RecoveryController, SchedulerOptions, PAUSE_POLL_INTERVAL,
};

const MONO8: PixelEncoding = PixelEncoding {
    depth: BitDepth::Eight,
    color: ColorMode::Mono,
};

// ============================================================================
// Helpers
// ============================================================================

fn materializer(fixture: &SequenceFixture, encoding: PixelEncoding) -> ImageMaterializer {
    let calibration = CalibrationBinding::open(
        &CalibrationPaths::new(&fixture.calib),
        CalibrationOptions::default(),
    )
    .unwrap();
    let backend = open_backend(&fixture.images, calibration.original_size()).unwrap();
    let ledger = TimestampExposureLedger::load(&fixture.images, backend.len()).unwrap();
    ImageMaterializer::new(
        backend,
        calibration,
        ledger,
        Box::new(CodecDecoder::new()),
        encoding,
    )
    .unwrap()
}

fn plan_for(source: &ImageMaterializer, reverse: bool, speed: f64) -> PlaybackPlan {
    let n = source.frame_count();
    PlaybackPlan::build(source.ledger(), n, 0, 100_000, reverse, speed)
}

fn recovery(
    source: &ImageMaterializer,
    config: FrameLogConfig,
    observers: Vec<SharedObserver>,
    signals: Arc<ControlSignals>,
) -> RecoveryController {
    let settings = EngineSettings::new(source.calibration().global_calibration());
    let factory = move |s: &EngineSettings| -> seqplay::Result<Box<dyn DownstreamEngine>> {
        Ok(Box::new(FrameLogEngine::new(s, config)?))
    };
    RecoveryController::new(Box::new(factory), settings, observers, signals)
        .unwrap()
        .with_cleanup_pause(Duration::ZERO)
}

fn result_ids(path: &std::path::Path) -> Vec<usize> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| line.split_whitespace().next().unwrap().parse().unwrap())
        .collect()
}

/// Source whose reads cost a fixed amount of clock time.
struct SlowSource<'a> {
    inner: ImageMaterializer,
    clock: &'a ManualClock,
    cost: Duration,
}

impl FrameSource for SlowSource<'_> {
    fn frame_count(&self) -> usize {
        self.inner.frame_count()
    }

    fn materialize(&mut self, index: usize) -> seqplay::Result<MaterializedImage> {
        self.clock.advance(self.cost);
        self.inner.materialize(index)
    }
}

/// Clock that lifts the pause after a number of polls.
struct ResumingClock {
    inner: ManualClock,
    signals: Arc<ControlSignals>,
    polls: Cell<usize>,
    resume_after: usize,
}

impl Clock for ResumingClock {
    fn wall(&self) -> Duration {
        self.inner.wall()
    }

    fn cpu(&self) -> Duration {
        self.inner.cpu()
    }

    fn sleep(&self, duration: Duration) {
        self.inner.sleep(duration);
        if self.signals.is_paused() {
            self.polls.set(self.polls.get() + 1);
            if self.polls.get() >= self.resume_after {
                self.signals.set_paused(false);
            }
        }
    }
}

/// Source that counts reads made while playback is paused.
struct PauseAwareSource {
    inner: ImageMaterializer,
    signals: Arc<ControlSignals>,
    reads_while_paused: usize,
}

impl FrameSource for PauseAwareSource {
    fn frame_count(&self) -> usize {
        self.inner.frame_count()
    }

    fn materialize(&mut self, index: usize) -> seqplay::Result<MaterializedImage> {
        if self.signals.is_paused() {
            self.reads_while_paused += 1;
        }
        self.inner.materialize(index)
    }
}

// ============================================================================
// Materialization
// ============================================================================

#[test]
fn test_directory_and_archive_materialize_identically() {
    let frames: Vec<_> = (0..3).map(textured_frame).collect();
    let dir_fixture = directory_sequence(&frames);
    let zip_fixture = archive_sequence(&frames);
    let mut from_dir = materializer(&dir_fixture, MONO8);
    let mut from_zip = materializer(&zip_fixture, MONO8);

    for i in 0..frames.len() {
        let a = from_dir.materialize(i).unwrap();
        let b = from_zip.materialize(i).unwrap();
        assert_eq!(a.pixels(), b.pixels(), "frame {i}");
    }
}

#[test]
fn test_materialized_frame_carries_ledger_values() {
    let fixture = directory_sequence(&[flat_frame(40), flat_frame(80)]);
    fixture.write_ledger(&["0 3.0 5.0".to_string(), "1 3.5 7.0".to_string()]);
    let mut source = materializer(&fixture, MONO8);

    let image = source.materialize(1).unwrap();
    assert_eq!(image.timestamp(), 3.5);
    assert_eq!(image.exposure(), 7.0);
    assert_eq!(image.width(), common::WIDTH as usize);
    assert!((image.mean_intensity() - 80.0).abs() < 1e-3);
}

#[test]
fn test_color_frames_keep_planes() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("images");
    fs::create_dir(&images).unwrap();
    let frame = RgbImage::from_pixel(common::WIDTH, common::HEIGHT, Rgb([200, 10, 30]));
    frame
        .save_with_format(images.join("00000.png"), ImageFormat::Png)
        .unwrap();
    let calib = dir.path().join("camera.txt");
    common::write_calibration(&calib);
    let fixture = SequenceFixture { dir, images, calib };

    let encoding = PixelEncoding::new(BitDepth::Eight, ColorMode::Color);
    let image = materializer(&fixture, encoding).materialize(0).unwrap();
    let planes = image.color().expect("color planes");
    assert!(image.is_color_source());
    assert!(planes.red.iter().all(|&v| (v - 200.0).abs() < 1e-3));
    assert!(planes.green.iter().all(|&v| (v - 10.0).abs() < 1e-3));
    assert!(planes.blue.iter().all(|&v| (v - 30.0).abs() < 1e-3));
}

// ============================================================================
// Scheduling
// ============================================================================

#[test]
fn test_unpaced_playback_delivers_everything() {
    let frames: Vec<_> = (0..10).map(textured_frame).collect();
    let fixture = directory_sequence(&frames);
    let mut source = materializer(&fixture, MONO8);
    let plan = plan_for(&source, false, 0.0);

    let signals = Arc::new(ControlSignals::new());
    let sample = Arc::new(SampleObserver::new());
    let mut recovery = recovery(
        &source,
        FrameLogConfig::default(),
        vec![sample.clone() as SharedObserver],
        signals.clone(),
    );

    let result = fixture.root().join("result.txt");
    let timing = fixture.root().join("logs").join("time.txt");
    let clock = ManualClock::new();
    let report = PlaybackScheduler::new(&plan, &clock, signals)
        .with_options(SchedulerOptions {
            preload: false,
            result_path: Some(result.clone()),
            timing_log: Some(timing.clone()),
        })
        .run(&mut source, &mut recovery, &mut |_, _| {})
        .unwrap();

    assert_eq!(report.outcome, PlaybackOutcome::Completed);
    assert_eq!(report.delivered, 10);
    assert_eq!(report.dropped, 0);
    assert_eq!(report.restarts, 0);
    assert_eq!(report.summary.frames, 9);

    // The first four frames only build up initialization
    assert_eq!(result_ids(&result), (4..10).collect::<Vec<_>>());
    assert_eq!(sample.published(), 6);
    assert!(timing.exists());
    recovery.shutdown();
}

#[test]
fn test_reverse_playback_order() {
    let frames: Vec<_> = (0..7).map(textured_frame).collect();
    let fixture = directory_sequence(&frames);
    let mut source = materializer(&fixture, MONO8);
    let plan = plan_for(&source, true, 0.0);
    assert_eq!(plan.indices(), vec![6, 5, 4, 3, 2, 1, 0]);

    let signals = Arc::new(ControlSignals::new());
    let mut recovery = recovery(&source, FrameLogConfig::default(), Vec::new(), signals.clone());
    let result = fixture.root().join("result.txt");
    let clock = ManualClock::new();
    PlaybackScheduler::new(&plan, &clock, signals)
        .with_options(SchedulerOptions {
            result_path: Some(result.clone()),
            ..Default::default()
        })
        .run(&mut source, &mut recovery, &mut |_, _| {})
        .unwrap();

    assert_eq!(result_ids(&result), vec![2, 1, 0]);
}

#[test]
fn test_paced_playback_waits_for_schedule() {
    let frames: Vec<_> = (0..10).map(textured_frame).collect();
    let fixture = directory_sequence(&frames);
    fixture.write_regular_ledger(10, 0.05);
    let mut source = materializer(&fixture, MONO8);
    let plan = plan_for(&source, false, 1.0);

    let signals = Arc::new(ControlSignals::new());
    let mut recovery = recovery(&source, FrameLogConfig::default(), Vec::new(), signals.clone());
    let clock = ManualClock::new();
    let report = PlaybackScheduler::new(&plan, &clock, signals)
        .run(&mut source, &mut recovery, &mut |_, _| {})
        .unwrap();

    assert_eq!(report.delivered, 10);
    assert_eq!(report.dropped, 0);
    // Timing restarts at frame 4, when the engine initializes
    assert!((report.initializer_offset - 0.2).abs() < 1e-9);
    assert!((clock.wall().as_secs_f64() - 0.25).abs() < 1e-3);
    assert!((report.summary.multi_core_ms - 450.0).abs() < 1.0);
}

#[test]
fn test_late_frames_are_dropped() {
    let frames: Vec<_> = (0..10).map(textured_frame).collect();
    let fixture = directory_sequence(&frames);
    fixture.write_regular_ledger(10, 0.05);
    let clock = ManualClock::new();
    let inner = materializer(&fixture, MONO8);
    let plan = plan_for(&inner, false, 1.0);

    let signals = Arc::new(ControlSignals::new());
    let mut recovery = recovery(&inner, FrameLogConfig::default(), Vec::new(), signals.clone());
    let mut source = SlowSource {
        inner,
        clock: &clock,
        cost: Duration::from_millis(300),
    };
    let report = PlaybackScheduler::new(&plan, &clock, signals)
        .run(&mut source, &mut recovery, &mut |_, _| {})
        .unwrap();

    assert_eq!(report.delivered, 6);
    assert_eq!(report.dropped, 4);
    assert_eq!(report.outcome, PlaybackOutcome::Completed);
}

#[test]
fn test_pause_holds_playback_until_resumed() {
    let frames: Vec<_> = (0..3).map(textured_frame).collect();
    let fixture = directory_sequence(&frames);
    let inner = materializer(&fixture, MONO8);
    let plan = plan_for(&inner, false, 0.0);

    let signals = Arc::new(ControlSignals::new());
    signals.set_paused(true);
    let mut recovery = recovery(&inner, FrameLogConfig::default(), Vec::new(), signals.clone());
    let clock = ResumingClock {
        inner: ManualClock::new(),
        signals: signals.clone(),
        polls: Cell::new(0),
        resume_after: 4,
    };
    let mut source = PauseAwareSource {
        inner,
        signals: signals.clone(),
        reads_while_paused: 0,
    };
    let report = PlaybackScheduler::new(&plan, &clock, signals.clone())
        .run(&mut source, &mut recovery, &mut |_, _| {})
        .unwrap();

    assert_eq!(source.reads_while_paused, 0);
    assert_eq!(clock.polls.get(), 4);
    assert_eq!(clock.wall(), PAUSE_POLL_INTERVAL * 4);
    assert_eq!(report.delivered, 3);
    assert!(!signals.is_paused());
}

#[test]
fn test_unreachable_schedule_does_not_stall() {
    let fixture = directory_sequence(&[textured_frame(0), textured_frame(1)]);
    fixture.write_ledger(&["0 0.0 10".to_string(), "1 1e20 10".to_string()]);
    let mut source = materializer(&fixture, MONO8);
    let plan = plan_for(&source, false, 1.0);
    assert_eq!(plan.frames()[1].offset, 1e20);

    let config = FrameLogConfig {
        init_frames: 1,
        ..FrameLogConfig::default()
    };
    let signals = Arc::new(ControlSignals::new());
    let mut recovery = recovery(&source, config, Vec::new(), signals.clone());
    let clock = ManualClock::new();
    let report = PlaybackScheduler::new(&plan, &clock, signals)
        .run(&mut source, &mut recovery, &mut |_, _| {})
        .unwrap();

    assert_eq!(report.delivered, 2);
    assert_eq!(report.dropped, 0);
    assert_eq!(clock.wall(), Duration::ZERO);
}

#[test]
fn test_preload_reports_progress() {
    let frames: Vec<_> = (0..4).map(textured_frame).collect();
    let fixture = archive_sequence(&frames);
    let mut source = materializer(&fixture, MONO8);
    let plan = plan_for(&source, false, 0.0);

    let signals = Arc::new(ControlSignals::new());
    let mut recovery = recovery(&source, FrameLogConfig::default(), Vec::new(), signals.clone());
    let clock = ManualClock::new();
    let mut seen = Vec::new();
    let report = PlaybackScheduler::new(&plan, &clock, signals)
        .with_options(SchedulerOptions {
            preload: true,
            ..Default::default()
        })
        .run(&mut source, &mut recovery, &mut |done, total| {
            seen.push((done, total))
        })
        .unwrap();

    assert_eq!(seen, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    assert_eq!(report.delivered, 4);
}

// ============================================================================
// Recovery
// ============================================================================

#[test]
fn test_failed_initialization_rebuilds_engine() {
    let mut frames = vec![flat_frame(50)];
    frames.extend((0..6).map(textured_frame));
    let fixture = directory_sequence(&frames);
    let mut source = materializer(&fixture, MONO8);
    let plan = plan_for(&source, false, 0.0);

    let signals = Arc::new(ControlSignals::new());
    let sample = Arc::new(SampleObserver::new());
    let mut recovery = recovery(
        &source,
        FrameLogConfig::default(),
        vec![sample.clone() as SharedObserver],
        signals.clone(),
    );
    let result = fixture.root().join("result.txt");
    let clock = ManualClock::new();
    let report = PlaybackScheduler::new(&plan, &clock, signals)
        .with_options(SchedulerOptions {
            result_path: Some(result.clone()),
            ..Default::default()
        })
        .run(&mut source, &mut recovery, &mut |_, _| {})
        .unwrap();

    assert_eq!(report.restarts, 1);
    assert_eq!(recovery.generation(), 1);
    assert_eq!(report.outcome, PlaybackOutcome::Completed);
    assert_eq!(result_ids(&result), vec![5, 6]);
    assert_eq!(sample.published(), 2);
}

#[test]
fn test_lost_tracking_stops_playback() {
    let mut frames: Vec<_> = (0..5).map(textured_frame).collect();
    frames.extend((0..10).map(|_| flat_frame(90)));
    let fixture = directory_sequence(&frames);
    let mut source = materializer(&fixture, MONO8);
    let plan = plan_for(&source, false, 0.0);

    let config = FrameLogConfig {
        lost_after: 3,
        ..FrameLogConfig::default()
    };
    let signals = Arc::new(ControlSignals::new());
    let mut recovery = recovery(&source, config, Vec::new(), signals.clone());
    let clock = ManualClock::new();
    let report = PlaybackScheduler::new(&plan, &clock, signals)
        .run(&mut source, &mut recovery, &mut |_, _| {})
        .unwrap();

    assert_eq!(report.outcome, PlaybackOutcome::Lost);
    assert_eq!(report.delivered, 8);
}

#[test]
fn test_closed_viewer_stops_playback() {
    let frames: Vec<_> = (0..5).map(textured_frame).collect();
    let fixture = directory_sequence(&frames);
    let mut source = materializer(&fixture, MONO8);
    let plan = plan_for(&source, false, 0.0);

    let signals = Arc::new(ControlSignals::new());
    let mut recovery = recovery(&source, FrameLogConfig::default(), Vec::new(), signals.clone());
    let liveness = LivenessFlag::new();
    liveness.mark_dead();
    let clock = ManualClock::new();
    let report = PlaybackScheduler::new(&plan, &clock, signals)
        .with_liveness(liveness)
        .run(&mut source, &mut recovery, &mut |_, _| {})
        .unwrap();

    assert_eq!(report.outcome, PlaybackOutcome::ViewerClosed);
    assert_eq!(report.delivered, 1);
}
