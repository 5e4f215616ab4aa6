//! Error types for the [`lifecycle`](super) module.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A lifecycle error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("invalid backup name")]
    InvalidName,
    #[display("can't connect to clickhouse")]
    Connect,
    #[display("can't get clickhouse disk list")]
    Disks,
    #[display("can't get default data path")]
    DefaultPath,
    /// Listing the backups directory failed.
    #[display("can't list backups in {}", _0.display())]
    List(#[error(not(source))] PathBuf),
    /// A backup directory exists but couldn't be deleted.
    #[display("can't remove {}", _0.display())]
    Remove(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect | Self::Disks | Self::DefaultPath)
    }
}
