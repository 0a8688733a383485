//! Error types for ride replay.
//!
//! Every error in this module is fatal for the current run: once a file fails to decode the
//! local definition table can no longer be trusted, and a broadcast that cannot be published
//! must stop loudly rather than stall silently.
//!
//! ## Error Categories
//!
//! - **Stream Errors**: the byte source ended early or a record overran its section
//! - **Format Errors**: bad file header, malformed definition, unknown local definition
//! - **Integrity Errors**: header or data CRC does not match the bytes read
//! - **I/O Errors**: an input file cannot be opened, or the snapshot cannot be published
//!
//! ## Helper Constructors
//!
//! ```rust
//! use ridecast::ReplayError;
//! use std::path::PathBuf;
//!
//! let header = ReplayError::invalid_header("missing .FIT tag");
//! let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
//! let file = ReplayError::file_error(PathBuf::from("/rides/morning.fit"), io_err);
//!
//! for suggestion in header.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! # let _ = file;
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for replay operations.
pub type Result<T, E = ReplayError> = std::result::Result<T, E>;

/// Which checksum failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcSection {
    Header,
    File,
}

impl std::fmt::Display for CrcSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrcSection::Header => f.write_str("header"),
            CrcSection::File => f.write_str("file"),
        }
    }
}

/// Main error type for decoding and playback.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ReplayError {
    #[error("Stream truncated at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    TruncatedStream { offset: u64, needed: u64, remaining: u64 },

    #[error("Invalid file header: {reason}")]
    InvalidHeader { reason: String },

    #[error("Data record at offset {offset} references unknown local definition {local_id}")]
    UnknownDefinition { local_id: u8, offset: u64 },

    #[error("{section} CRC mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    CrcMismatch { section: CrcSection, stored: u16, computed: u16 },

    #[error("Malformed record at offset {offset}: {details}")]
    MalformedRecord { offset: u64, details: String },

    #[error("Failed to publish snapshot to {path}")]
    Publish {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Ride file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl ReplayError {
    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ReplayError::TruncatedStream { .. } => vec![
                "Check that the recording finished writing before it was copied",
                "Re-export the activity from the recording device",
            ],
            ReplayError::InvalidHeader { .. } => vec![
                "Verify the input is a FIT activity file",
                "Check the file was not converted to another format",
            ],
            ReplayError::UnknownDefinition { .. } => vec![
                "The file is corrupt or uses an unsupported layout",
                "Do not concatenate FIT files at the byte level; pass them as separate inputs",
            ],
            ReplayError::CrcMismatch { .. } => vec![
                "The file content is corrupt",
                "Re-run with --no-crc-check to replay untrusted data anyway",
            ],
            ReplayError::MalformedRecord { .. } => vec![
                "The file is corrupt or was produced by a non-conforming encoder",
            ],
            ReplayError::Publish { .. } => vec![
                "Check the output directory exists and is writable",
                "Ensure sufficient disk space",
                "Check the consumer is not holding an exclusive lock on the output file",
            ],
            ReplayError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            ReplayError::Config { .. } => vec![
                "Pass at least one input file",
                "Pass a non-empty output path",
            ],
        }
    }

    /// Helper constructor for input file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        ReplayError::File { path, source }
    }

    /// Helper constructor for publish errors with path context.
    pub fn publish_error(path: PathBuf, source: std::io::Error) -> Self {
        ReplayError::Publish { path, source }
    }

    /// Helper constructor for header errors.
    pub fn invalid_header(reason: impl Into<String>) -> Self {
        ReplayError::InvalidHeader { reason: reason.into() }
    }

    /// Helper constructor for malformed record errors.
    pub fn malformed(offset: u64, details: impl Into<String>) -> Self {
        ReplayError::MalformedRecord { offset, details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        ReplayError::Config { reason: reason.into() }
    }
}

impl From<std::io::Error> for ReplayError {
    fn from(err: std::io::Error) -> Self {
        ReplayError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}
