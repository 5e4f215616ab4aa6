//! Backup creation.
//!
//! A run selects tables, freezes each one and moves the snapshot into the
//! backup directory on every disk, writes one metadata document per table,
//! and finally writes `metadata.json`, which marks the backup complete. Any
//! failure before that point removes the partial backup from every disk.
//! Retention runs after a successful run.
//!
//! The two entry points, [`create_backup`] and [`create_backup_for_agent`],
//! only differ in how tables are picked; both go through
//! [`create_backup_with`] and a [`Selection`].

mod backup;
pub mod error;
mod freeze;
mod metadata;
mod selection;

pub use self::backup::{create_backup, create_backup_for_agent, create_backup_with};
pub use self::freeze::{Capture, freeze_table, shadow_destination};
pub use self::metadata::{table_metadata_path, write_backup_metadata, write_table_metadata};
pub use self::selection::{PatternSelection, RuleSelection, Selection};
