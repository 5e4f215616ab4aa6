//! Error types for the [`create`](super) module.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A create error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for create operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Zero-table message when selecting by pattern.
pub const NO_TABLES: &str = "no tables for backup";
/// Zero-table message when selecting by per-table rules.
pub const NO_TABLES_MATCHING_RULES: &str = "no tables for backup, check backup_tables";

/// Classifies the step of a backup run that failed.
///
/// ### Precondition Errors
/// Nothing was written when one of these is returned.
/// - [`ErrorKind::InvalidName`]
/// - [`ErrorKind::EmptyRules`]
/// - [`ErrorKind::NoTables`]
/// - [`ErrorKind::AlreadyExists`]
///
/// ### Engine Errors
/// - [`ErrorKind::Connect`]
/// - [`ErrorKind::Databases`], [`ErrorKind::Tables`], [`ErrorKind::Disks`]
///   and [`ErrorKind::DefaultPath`]
/// - [`ErrorKind::Freeze`]
///
/// ### Filesystem Errors
/// - [`ErrorKind::Directory`]
/// - [`ErrorKind::Relocate`]
/// - [`ErrorKind::Filesystem`]
/// - [`ErrorKind::TableMetadata`] and [`ErrorKind::BackupMetadata`]
///
/// [`ErrorKind::Retention`] is the only error returned after the backup
/// was completed.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("invalid backup name")]
    InvalidName,
    #[display("backup_tables is empty")]
    EmptyRules,
    #[display("{_0}")]
    NoTables(#[error(not(source))] &'static str),
    #[display("'{_0}' already exists")]
    AlreadyExists(#[error(not(source))] String),
    #[display("can't connect to clickhouse")]
    Connect,
    #[display("can't get database engines from clickhouse")]
    Databases,
    #[display("can't get tables from clickhouse")]
    Tables,
    #[display("can't get clickhouse disk list")]
    Disks,
    #[display("can't get default data path")]
    DefaultPath,
    #[display("can't create directory {}", _0.display())]
    Directory(#[error(not(source))] PathBuf),
    #[display("can't freeze '{_0}'")]
    Freeze(#[error(not(source))] String),
    /// Moving frozen parts from the holding area into the backup failed.
    #[display("can't move shadow of '{table}' on disk '{disk}'")]
    Relocate { table: String, disk: String },
    #[display("filesystem error at {}", _0.display())]
    Filesystem(#[error(not(source))] PathBuf),
    #[display("can't write metadata for '{_0}'")]
    TableMetadata(#[error(not(source))] String),
    #[display("can't write backup metadata")]
    BackupMetadata,
    /// The backup is complete, but pruning older ones failed.
    #[display("can't remove old backups")]
    Retention,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect | Self::Databases | Self::Tables | Self::Disks | Self::Freeze(_))
    }

    /// Returns `true` if the backup was fully written before the error.
    pub fn is_backup_complete(&self) -> bool {
        matches!(self, Self::Retention)
    }
}
