//! Error types for MARC operations.
//!
//! This module provides the [`MarcError`] type for all MARC library operations
//! and the [`Result`] convenience type. Recoverable anomalies encountered while
//! decoding a record never surface here; they are appended to the record's
//! warning list instead.

use thiserror::Error;

/// Error type for all MARC library operations.
///
/// Represents the fatal conditions that can occur while framing, decoding,
/// or querying MARC records.
#[derive(Error, Debug)]
pub enum MarcError {
    /// The underlying byte stream could not be opened or measured.
    #[error("Failed to initialize MARC stream: {0}")]
    StreamInit(String),

    /// The stream ended mid-record after a record terminator was observed.
    #[error("Unexpected end of stream: {0}")]
    UnexpectedEof(String),

    /// The stream was read past exhaustion or after being closed.
    #[error("MARC stream is exhausted")]
    EndOfStream,

    /// Error indicating an invalid leader (24-byte header).
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// A tag that does not parse as a 3-digit number.
    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    /// The directory entry count disagrees with the field payload count.
    #[error("Directory mismatch: {0}")]
    DirectoryMismatch(String),

    /// An extraction pattern failed to compile.
    #[error("Invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The offending pattern substring.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An index was outside the valid range of a record or field.
    #[error("Index out of range: {0}")]
    OutOfRange(String),

    /// Error related to character encoding conversion.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error from the underlying source.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`MarcError`].
pub type Result<T> = std::result::Result<T, MarcError>;
