//! Metadata Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A metadata error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for metadata operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A document could not be serialized.
    #[display("can't marshal {_0}")]
    Serialize(#[error(not(source))] &'static str),
    /// A document on disk is not valid metadata. Don't retry with the same input.
    #[display("can't parse {_0}")]
    Deserialize(#[error(not(source))] &'static str),
    /// An encoded path segment is truncated, contains non-hex escapes, or
    /// doesn't decode to UTF-8.
    #[display("invalid encoded name: {_0}")]
    InvalidEncoding(#[error(not(source))] String),
    /// Backup names become a single directory name on every disk.
    #[display("invalid backup name: {_0:?}")]
    InvalidName(#[error(not(source))] String),
    /// The current time could not be formatted into a backup name.
    #[display("can't format backup timestamp")]
    Timestamp,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
