//! Backup Error Types
//!
//! Each public entry point raises one of these over the error tree of the
//! module that did the work ([`create::error`](crate::create::error) or
//! [`lifecycle::error`](crate::lifecycle::error)).

use derive_more::{Display, Error};

/// A backup error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for backup operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Creating the named backup failed. Unless the cause is
    /// [`Retention`](crate::create::error::ErrorKind::Retention), nothing of
    /// it is left on any disk.
    #[display("can't create backup '{_0}'")]
    Create(#[error(not(source))] String),
    /// Removing the named backup from one or more disks failed.
    #[display("can't remove backup '{_0}'")]
    Remove(#[error(not(source))] String),
    /// The retention pass failed to list or remove old backups.
    #[display("can't remove old backups")]
    Retention,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
