// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for seqplay.
//!
//! Every failure the ingestion and playback layers can report is a
//! [`PlaybackError`]. Data-quality problems (bad timestamps, missing
//! exposures) are never errors: they are logged and replaced by defaults.
//! What remains here is fatal for the run, except for the engine variants
//! that the recovery controller inspects.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Coarse classification of an error, used for diagnostics and exit handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A configuration mistake that no runtime state can fix.
    Configuration,
    /// A storage backend could not be opened.
    Backend,
    /// An archive entry outgrew the scratch buffer budget.
    Capacity,
    /// Malformed input data that cannot be defaulted.
    Data,
    /// The downstream engine reported a failure.
    Engine,
    /// Plain I/O failure.
    Io,
}

impl ErrorCategory {
    /// Lowercase name for log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Backend => "backend",
            ErrorCategory::Capacity => "capacity",
            ErrorCategory::Data => "data",
            ErrorCategory::Engine => "engine",
            ErrorCategory::Io => "io",
        }
    }
}

/// Errors that can occur while ingesting or playing back a sequence.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Directory backend could not be listed.
    #[error("Cannot open image directory '{}': {reason}", path.display())]
    BackendInit {
        /// Directory that was requested
        path: PathBuf,
        /// Underlying reason
        reason: String,
    },

    /// Archive backend could not be opened.
    #[error("Cannot read archive '{}': {reason}", path.display())]
    ArchiveOpen {
        /// Archive that was requested
        path: PathBuf,
        /// Underlying reason
        reason: String,
    },

    /// Archive support was not compiled into this build.
    #[error("Cannot read archive '{}': built without archive support", path.display())]
    ArchiveUnavailable {
        /// Archive that was requested
        path: PathBuf,
    },

    /// Decompressed archive member exceeded the grown scratch buffer.
    #[error("Archive entry '{name}' is too large: read {read} bytes, budget is {budget} bytes")]
    EntryTooLarge {
        /// Member name
        name: String,
        /// Bytes read on the retry
        read: usize,
        /// Maximum accepted payload
        budget: usize,
    },

    /// Entry index outside the backend.
    #[error("Entry {index} out of range (backend has {len} entries)")]
    EntryOutOfRange {
        /// Requested index
        index: usize,
        /// Number of entries
        len: usize,
    },

    /// Pixel encoding combination that is not supported.
    #[error("Unsupported encoding: {encoding}")]
    UnsupportedEncoding {
        /// Description of the requested encoding
        encoding: String,
    },

    /// Invalid or missing configuration.
    #[error("Configuration error: {message}")]
    Configuration {
        /// What is wrong
        message: String,
    },

    /// Calibration file could not be used.
    #[error("Calibration error in '{}': {reason}", path.display())]
    Calibration {
        /// Calibration file
        path: PathBuf,
        /// What is wrong
        reason: String,
    },

    /// Raw bytes could not be decoded into pixels.
    #[error("Failed to decode '{name}': {reason}")]
    Decode {
        /// Entry name
        name: String,
        /// Codec message
        reason: String,
    },

    /// Parse error in a text input.
    #[error("Parse error in {context}: {message}")]
    Parse {
        /// What was being parsed
        context: String,
        /// Error message
        message: String,
    },

    /// Downstream engine failure.
    #[error("Engine error: {message}")]
    Engine {
        /// Engine message
        message: String,
    },

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlaybackError {
    /// Create a backend initialization error.
    pub fn backend_init(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        PlaybackError::BackendInit {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create an archive open error.
    pub fn archive_open(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        PlaybackError::ArchiveOpen {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported encoding error.
    pub fn unsupported_encoding(encoding: impl Into<String>) -> Self {
        PlaybackError::UnsupportedEncoding {
            encoding: encoding.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        PlaybackError::Configuration {
            message: message.into(),
        }
    }

    /// Create a calibration error.
    pub fn calibration(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        PlaybackError::Calibration {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(name: impl Into<String>, reason: impl Into<String>) -> Self {
        PlaybackError::Decode {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        PlaybackError::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create an engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        PlaybackError::Engine {
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            PlaybackError::BackendInit { .. }
            | PlaybackError::ArchiveOpen { .. }
            | PlaybackError::ArchiveUnavailable { .. }
            | PlaybackError::EntryOutOfRange { .. } => ErrorCategory::Backend,
            PlaybackError::EntryTooLarge { .. } => ErrorCategory::Capacity,
            PlaybackError::UnsupportedEncoding { .. }
            | PlaybackError::Configuration { .. }
            | PlaybackError::Calibration { .. } => ErrorCategory::Configuration,
            PlaybackError::Decode { .. } | PlaybackError::Parse { .. } => ErrorCategory::Data,
            PlaybackError::Engine { .. } => ErrorCategory::Engine,
            PlaybackError::Io(_) => ErrorCategory::Io,
        }
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("category", self.category().as_str().to_string())];
        match self {
            PlaybackError::BackendInit { path, reason }
            | PlaybackError::ArchiveOpen { path, reason }
            | PlaybackError::Calibration { path, reason } => {
                fields.push(("path", path.display().to_string()));
                fields.push(("reason", reason.clone()));
            }
            PlaybackError::ArchiveUnavailable { path } => {
                fields.push(("path", path.display().to_string()));
            }
            PlaybackError::EntryTooLarge { name, read, budget } => {
                fields.push(("entry", name.clone()));
                fields.push(("read", read.to_string()));
                fields.push(("budget", budget.to_string()));
            }
            PlaybackError::EntryOutOfRange { index, len } => {
                fields.push(("index", index.to_string()));
                fields.push(("len", len.to_string()));
            }
            PlaybackError::UnsupportedEncoding { encoding } => {
                fields.push(("encoding", encoding.clone()));
            }
            PlaybackError::Configuration { message } | PlaybackError::Engine { message } => {
                fields.push(("message", message.clone()));
            }
            PlaybackError::Decode { name, reason } => {
                fields.push(("entry", name.clone()));
                fields.push(("reason", reason.clone()));
            }
            PlaybackError::Parse { context, message } => {
                fields.push(("context", context.clone()));
                fields.push(("message", message.clone()));
            }
            PlaybackError::Io(err) => fields.push(("message", err.to_string())),
        }
        fields
    }
}

/// Result type for seqplay operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
