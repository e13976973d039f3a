//! Centralized error types for eximshell.
//!
//! Most operational failures (a missing `exim` binary, a permission problem,
//! an unparseable record) are reported in-band as data, not as errors. The
//! variants below cover the few conditions that genuinely stop an operation.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the eximshell library.
#[derive(Error, Debug)]
pub enum EximError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The shell used to run an external command could not be started.
    #[error("Failed to run '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// A background worker thread could not be created.
    #[error("Failed to start background worker: {0}")]
    ThreadSpawn(std::io::Error),

    /// The log file cannot be tailed right now.
    #[error("Log file '{path}' is unavailable: {reason}")]
    LogUnavailable { path: PathBuf, reason: String },
}

/// Convenience alias for `Result<T, EximError>`.
pub type Result<T> = std::result::Result<T, EximError>;

impl EximError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `EximError::io`).
impl From<std::io::Error> for EximError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
