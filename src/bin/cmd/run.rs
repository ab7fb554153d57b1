// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Run command - play a sequence into the engine.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{bail, Context as _};
use clap::Args;
use crossbeam_channel::Sender;
use tracing::info;

use crate::common::{format_duration, ProgressBar, Result};
use seqplay::calib::{CalibrationBinding, CalibrationPaths};
use seqplay::core::ColorMode;
use seqplay::engine::{
    DownstreamEngine, EngineSettings, FrameLogEngine, InertialSettings, OutputObserver,
    SampleObserver, SharedObserver,
};
use seqplay::frame::{CodecDecoder, ImageMaterializer, MaterializedImage};
use seqplay::io::{open_backend, InertialStream, StorageBackend, TimestampExposureLedger};
use seqplay::playback::{
    ControlSignals, LivenessFlag, PhotometricMode, PlaybackConfig, PlaybackOutcome,
    PlaybackPlan, PlaybackScheduler, Preset, RecoveryController, SchedulerOptions, SystemClock,
};

/// Directory recreated by `--save`.
const SAVE_DIR: &str = "images_out";

/// Play a sequence.
#[derive(Args, Clone, Debug)]
pub struct RunCmd {
    /// TOML configuration; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Image directory or .zip archive
    #[arg(long, value_name = "PATH")]
    files: Option<PathBuf>,

    /// Geometric calibration file
    #[arg(long, value_name = "FILE")]
    calib: Option<PathBuf>,

    /// Inverse response (gamma) file
    #[arg(long, value_name = "FILE")]
    gamma: Option<PathBuf>,

    /// Vignette image
    #[arg(long, value_name = "FILE")]
    vignette: Option<PathBuf>,

    /// Inertial measurement log
    #[arg(long, value_name = "FILE")]
    imu: Option<PathBuf>,

    /// Inertial calibration
    #[arg(long = "imu-calib", value_name = "FILE")]
    imu_calib: Option<PathBuf>,

    /// Loop closure vocabulary
    #[arg(long, value_name = "FILE")]
    vocab: Option<PathBuf>,

    /// Enable loop closure
    #[arg(long = "loop-closure")]
    loop_closure: bool,

    /// Play the range backwards
    #[arg(long)]
    reverse: bool,

    /// Load every frame before playback starts
    #[arg(long)]
    preload: bool,

    /// Log every frame the engine publishes
    #[arg(long = "sample-output")]
    sample_output: bool,

    /// Disable engine logging and the timing log
    #[arg(long)]
    nolog: bool,

    /// Disable the progress display
    #[arg(long)]
    nogui: bool,

    /// Recreate the images_out directory
    #[arg(long)]
    save: bool,

    /// Run the engine without background threads
    #[arg(long)]
    nomt: bool,

    /// First entry to play
    #[arg(long)]
    start: Option<usize>,

    /// End of the range, exclusive
    #[arg(long)]
    end: Option<usize>,

    /// Photometric mode (0 calibrated, 1 uncalibrated, 2 perfect images)
    #[arg(long, value_parser = parse_mode)]
    mode: Option<PhotometricMode>,

    /// Setting preset (0 default, 1 real-time, 2 fast, 3 fast real-time)
    #[arg(long, value_parser = parse_preset)]
    preset: Option<Preset>,

    /// Playback speed factor; 0 plays as fast as possible
    #[arg(long)]
    speed: Option<f64>,

    /// Inertial weight in the window optimization
    #[arg(long = "imu-weight")]
    imu_weight: Option<f64>,

    /// Inertial weight in the tracker
    #[arg(long = "imu-weight-tracker")]
    imu_weight_tracker: Option<f64>,

    /// Frames are 16-bit
    #[arg(long = "sixteen-bit")]
    sixteen_bit: bool,

    /// Frames are color
    #[arg(long)]
    color: bool,

    /// Engine result log
    #[arg(long, value_name = "FILE")]
    result: Option<PathBuf>,

    /// Timing log
    #[arg(long = "timing-log", value_name = "FILE")]
    timing_log: Option<PathBuf>,
}

fn parse_mode(s: &str) -> std::result::Result<PhotometricMode, String> {
    let value: u8 = s.parse().map_err(|_| format!("invalid mode: {s}"))?;
    PhotometricMode::try_from(value).map_err(|e| e.to_string())
}

fn parse_preset(s: &str) -> std::result::Result<Preset, String> {
    let value: u8 = s.parse().map_err(|_| format!("invalid preset: {s}"))?;
    Preset::try_from(value).map_err(|e| e.to_string())
}

impl RunCmd {
    pub fn run(self) -> Result<()> {
        let config = self.resolve()?;

        let (files, calib) = match (&config.paths.files, &config.paths.calib) {
            (Some(files), Some(calib)) => (files.clone(), calib.clone()),
            _ => {
                println!("Both --files and --calib are required. Nothing to play.");
                return Ok(());
            }
        };

        println!("{}", config.engine.preset.description());
        println!("{}", config.engine.mode.description());
        config.validate()?;
        config.log_summary();

        let vocabulary = check_vocabulary(&config)?;
        if config.playback.save {
            recreate_dir(Path::new(SAVE_DIR))?;
        }

        play(&config, &files, &calib, vocabulary)
    }

    /// Defaults, then the config file, then flags.
    fn resolve(&self) -> Result<PlaybackConfig> {
        let mut config = match &self.config {
            Some(path) => PlaybackConfig::from_toml_file(path)?,
            None => PlaybackConfig::new(),
        };

        let paths = &mut config.paths;
        overlay(&mut paths.files, &self.files);
        overlay(&mut paths.calib, &self.calib);
        overlay(&mut paths.gamma, &self.gamma);
        overlay(&mut paths.vignette, &self.vignette);
        overlay(&mut paths.imu, &self.imu);
        overlay(&mut paths.imu_calib, &self.imu_calib);
        overlay(&mut paths.vocab, &self.vocab);

        let playback = &mut config.playback;
        playback.start = self.start.unwrap_or(playback.start);
        playback.end = self.end.unwrap_or(playback.end);
        playback.reverse |= self.reverse;
        playback.preload |= self.preload;
        playback.sample_output |= self.sample_output;
        playback.save |= self.save;
        playback.sixteen_bit |= self.sixteen_bit;
        if self.speed.is_some() {
            playback.speed = self.speed;
        }
        if self.color {
            playback.color = ColorMode::Color;
        }
        if self.nogui {
            playback.gui = false;
        }
        if let Some(result) = &self.result {
            playback.result = result.clone();
        }
        if let Some(timing_log) = &self.timing_log {
            playback.timing_log = timing_log.clone();
        }

        let engine = &mut config.engine;
        engine.preset = self.preset.unwrap_or(engine.preset);
        engine.mode = self.mode.unwrap_or(engine.mode);
        engine.loop_closure |= self.loop_closure;
        engine.nolog |= self.nolog;
        if self.nomt {
            engine.multi_threading = false;
        }
        engine.imu_weight = self.imu_weight.unwrap_or(engine.imu_weight);
        engine.imu_weight_tracker = self.imu_weight_tracker.unwrap_or(engine.imu_weight_tracker);

        Ok(config)
    }
}

fn overlay(target: &mut Option<PathBuf>, flag: &Option<PathBuf>) {
    if flag.is_some() {
        target.clone_from(flag);
    }
}

/// Vocabulary for loop closure; `None` disables it.
fn check_vocabulary(config: &PlaybackConfig) -> Result<Option<PathBuf>> {
    if !config.engine.loop_closure {
        return Ok(None);
    }
    let Some(path) = &config.paths.vocab else {
        println!("No vocabulary given, loop closure disabled.");
        return Ok(None);
    };
    let len = fs::metadata(path)
        .with_context(|| format!("cannot read vocabulary {}", path.display()))?
        .len();
    if len == 0 {
        bail!("vocabulary {} is empty", path.display());
    }
    Ok(Some(path.clone()))
}

fn recreate_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("cannot clear {}", dir.display())),
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

fn play(
    config: &PlaybackConfig,
    files: &Path,
    calib: &Path,
    vocabulary: Option<PathBuf>,
) -> Result<()> {
    let paths = CalibrationPaths::new(calib)
        .with_gamma(config.paths.gamma.clone())
        .with_vignette(config.paths.vignette.clone());
    let calibration = CalibrationBinding::open(&paths, config.calibration_options())?;

    let backend = open_backend(files, calibration.original_size())?;
    let entry_count = backend.len();
    let ledger = TimestampExposureLedger::load(files, entry_count)?;

    let speed = config.speed();
    let plan = PlaybackPlan::build(
        &ledger,
        entry_count,
        config.playback.start,
        config.playback.end,
        config.playback.reverse,
        speed,
    );

    let settings = engine_settings(config, &calibration, speed, vocabulary)?;
    let mut source = ImageMaterializer::new(
        backend,
        calibration,
        ledger,
        Box::new(CodecDecoder::new()),
        config.encoding(),
    )?;

    let mut observers: Vec<SharedObserver> = Vec::new();
    let mut liveness = None;
    if config.playback.gui {
        let (display, flag) = ProgressDisplay::spawn(plan.len())?;
        observers.push(display);
        liveness = Some(flag);
    }
    if config.playback.sample_output {
        observers.push(Arc::new(SampleObserver::new()));
    }

    let tracker = config.engine.tracker.clone();
    let factory = move |settings: &EngineSettings| -> seqplay::Result<Box<dyn DownstreamEngine>> {
        Ok(Box::new(FrameLogEngine::new(settings, tracker.clone())?))
    };
    let signals = Arc::new(ControlSignals::new());
    let mut recovery =
        RecoveryController::new(Box::new(factory), settings, observers, signals.clone())?;

    let options = SchedulerOptions {
        preload: config.preload(),
        result_path: Some(config.playback.result.clone()),
        timing_log: config
            .logging()
            .then(|| config.playback.timing_log.clone()),
    };
    let mut scheduler =
        PlaybackScheduler::new(&plan, SystemClock::new(), signals).with_options(options);
    if let Some(flag) = liveness {
        scheduler = scheduler.with_liveness(flag);
    }

    let preload_bar = config
        .preload()
        .then(|| ProgressBar::new(plan.len() as u64, "Loading"));
    let mut progress = |done: usize, total: usize| {
        if let Some(bar) = &preload_bar {
            bar.set_position(done as u64);
            if done == total {
                bar.finish_with_message("loaded".to_string());
            }
        }
    };

    let report = scheduler.run(&mut source, &mut recovery, &mut progress)?;

    println!("{}", report.summary);
    println!(
        "Delivered {} frames, dropped {}, {} restarts in {}",
        report.delivered,
        report.dropped,
        report.restarts,
        format_duration(report.wall.as_nanos() as u64)
    );
    match report.outcome {
        PlaybackOutcome::Completed => {}
        PlaybackOutcome::Lost => println!("Tracking lost, playback stopped."),
        PlaybackOutcome::ViewerClosed => println!("Display closed, playback stopped."),
    }

    recovery.shutdown();
    drop(source);
    info!("backend closed");
    Ok(())
}

fn engine_settings(
    config: &PlaybackConfig,
    calibration: &CalibrationBinding,
    speed: f64,
    vocabulary: Option<PathBuf>,
) -> Result<EngineSettings> {
    let mut settings = EngineSettings::new(calibration.global_calibration());
    settings.gamma = calibration.photometric_gamma().map(<[f32]>::to_vec);
    settings.linearize_operation = speed == 0.0;
    settings.multi_threading = config.engine.multi_threading;
    settings.loop_closure = vocabulary.is_some();
    settings.vocabulary = vocabulary;
    settings.tuning = config.engine_tuning();

    if let Some((log, calib)) = config.paths.inertial() {
        let stream = InertialStream::load(log, calib)?;
        settings.inertial = Some(InertialSettings {
            stream: Arc::new(stream),
            weight: config.engine.imu_weight,
            weight_tracker: config.engine.imu_weight_tracker,
            use_imu: true,
            track: true,
        });
    }
    Ok(settings)
}

/// Update sent to the display thread.
enum DisplayUpdate {
    Frame { id: usize, mean: f32 },
    Reset,
}

/// Terminal progress display fed by the engine.
///
/// Runs on its own thread; the liveness flag goes dead when that thread
/// ends.
struct ProgressDisplay {
    sender: Mutex<Option<Sender<DisplayUpdate>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ProgressDisplay {
    fn spawn(total: usize) -> Result<(SharedObserver, LivenessFlag)> {
        let (sender, receiver) = crossbeam_channel::unbounded::<DisplayUpdate>();
        let liveness = LivenessFlag::new();
        let alive = liveness.clone();

        let handle = thread::Builder::new()
            .name("display".to_string())
            .spawn(move || {
                let bar = ProgressBar::new(total as u64, "Playing");
                let mut shown = 0u64;
                for update in receiver {
                    match update {
                        DisplayUpdate::Frame { id, mean } => {
                            shown += 1;
                            bar.set_position(shown);
                            bar.set_message(format!("frame {id} mean {mean:.1}"));
                        }
                        DisplayUpdate::Reset => {
                            shown = 0;
                            bar.set_position(0);
                            bar.set_message("engine reset".to_string());
                        }
                    }
                }
                bar.finish_with_message("done".to_string());
                alive.mark_dead();
            })?;

        let display = Arc::new(Self {
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        });
        Ok((display, liveness))
    }

    fn send(&self, update: DisplayUpdate) {
        if let Ok(guard) = self.sender.lock() {
            if let Some(sender) = guard.as_ref() {
                let _ = sender.send(update);
            }
        }
    }
}

impl OutputObserver for ProgressDisplay {
    fn name(&self) -> &str {
        "display"
    }

    fn publish_frame(&self, image: &MaterializedImage, id: usize) {
        self.send(DisplayUpdate::Frame {
            id,
            mean: image.mean_intensity(),
        });
    }

    fn reset(&self) {
        self.send(DisplayUpdate::Reset);
    }

    fn join(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}
