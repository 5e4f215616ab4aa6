//! Local backup lifecycle.
//!
//! A backup present on disk is either complete, with a readable
//! `metadata.json`, or broken: the marker is missing or can't be parsed,
//! usually because a run was interrupted before rollback could finish.
//! Broken backups are listed but never removed by retention.

pub mod error;
mod remove;
mod retention;

pub use self::remove::{remove_backup, remove_backup_local};
pub use self::retention::{
    LocalBackup, expired_backups, list_local_backups, remove_old_backups, remove_old_backups_local,
};
