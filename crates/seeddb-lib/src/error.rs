//! Error type shared across the library
//!
//! Nothing is recovered locally: every error propagates to the caller,
//! and the command-line front end prints it and exits non-zero.

use std::path::Path;
use thiserror::Error;

/// Error type for database construction
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed FASTA/FASTQ input
    #[error("bad sequence data: {0}")]
    InputFormat(String),

    /// A quality code outside the range allowed by the input format
    #[error("bad quality code {code:?} (format offset {offset})")]
    BadQualityCode {
        /// The offending quality byte
        code: u8,
        /// ASCII offset of the configured quality format
        offset: u8,
    },

    /// I/O failure on an input or output file
    #[error("can't {action} file: {path}")]
    File {
        /// What was being attempted ("read", "write", "open")
        action: &'static str,
        /// The file involved
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration (bad seed text, unknown name, bad flag combination)
    #[error("{0}")]
    Config(String),

    /// A single sequence exceeds the per-volume cap
    #[error("encountered a sequence that's too long")]
    SequenceTooLong,

    /// Allocation failure for a large index buffer
    #[error("out of memory")]
    OutOfMemory,

    /// Invariant violation
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn file(action: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::File {
            action,
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::OutOfMemory
    }
}

impl From<needletail::errors::ParseError> for Error {
    fn from(err: needletail::errors::ParseError) -> Self {
        Error::InputFormat(err.to_string())
    }
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;
