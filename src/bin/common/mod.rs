// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for CLI commands.

use std::io::IsTerminal as _;
use std::process;
use std::thread;

use seqplay::PlaybackError;
use tracing_subscriber::EnvFilter;

pub use anyhow::Result as CliResult;
pub type Result<T = ()> = CliResult<T>;

/// Install the log subscriber. `RUST_LOG` wins over `quiet`.
pub fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Log an error that ends the process.
///
/// Library errors carry their structured fields.
pub fn log_fatal(err: &anyhow::Error) {
    match err.downcast_ref::<PlaybackError>() {
        Some(e) => tracing::error!(fields = %error_fields(e), "fatal: {e}"),
        None => tracing::error!(error = %err, "fatal"),
    }
}

/// `key=value` pairs of a library error.
pub fn error_fields(err: &PlaybackError) -> String {
    err.log_fields()
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Exit with code 1 on the first interrupt.
///
/// The handler only forwards to a channel; a dedicated thread blocks on it.
pub fn install_interrupt_handler() -> Result<()> {
    let (tx, rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })?;
    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            if rx.recv().is_ok() {
                tracing::error!("interrupted");
                eprintln!("Caught interrupt, exiting");
                process::exit(1);
            }
        })?;
    Ok(())
}

/// Format a duration in nanoseconds to human-readable string.
pub fn format_duration(nanos: u64) -> String {
    let secs = nanos / 1_000_000_000;
    let millis = (nanos % 1_000_000_000) / 1_000_000;

    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}

/// Format a ledger timestamp in seconds.
///
/// Values that look like Unix time are shown as UTC dates; small values are
/// sequence-relative and shown as seconds.
pub fn format_timestamp(seconds: f64) -> String {
    const YEAR_2000: f64 = 946_684_800.0;
    if seconds >= YEAR_2000 {
        let whole = seconds.trunc() as i64;
        let nanos = ((seconds - seconds.trunc()) * 1e9) as u32;
        if let Some(dt) = chrono::DateTime::<chrono::Utc>::from_timestamp(whole, nanos) {
            return dt.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string();
        }
    }
    format!("{seconds:.3}s")
}

/// Progress bar wrapper for consistent progress reporting.
///
/// Hidden when stderr is not a terminal.
pub struct ProgressBar {
    inner: Option<indicatif::ProgressBar>,
}

impl ProgressBar {
    /// Create a new progress bar.
    pub fn new(total: u64, prefix: impl Into<String>) -> Self {
        let inner = if std::io::stderr().is_terminal() {
            let pb = indicatif::ProgressBar::new(total);
            if let Ok(style) = indicatif::ProgressStyle::default_bar().template(
                "{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
            ) {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb.set_prefix(prefix.into());
            Some(pb)
        } else {
            None
        };

        Self { inner }
    }

    /// Move to `position`.
    pub fn set_position(&self, position: u64) {
        if let Some(pb) = &self.inner {
            pb.set_position(position);
        }
    }

    /// Replace the trailing message.
    pub fn set_message(&self, msg: String) {
        if let Some(pb) = &self.inner {
            pb.set_message(msg);
        }
    }

    /// Finish the progress bar with a message.
    pub fn finish_with_message(&self, msg: String) {
        if let Some(pb) = &self.inner {
            pb.finish_with_message(msg);
        }
    }
}
