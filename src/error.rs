//! Error types for the test harness.
//!
//! Per-run failures (non-zero exit, timeout, missing executable) are not
//! errors: they are recorded as a [`crate::executor::Verdict`]. This type
//! covers failures of the harness itself.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for harness operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error writing the log or the console.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write to the log file.
    #[error("failed to write log file {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Harness configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failed to launch a child process.
    #[error("failed to launch {program}: {reason}")]
    Launch { program: String, reason: String },
}

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;
