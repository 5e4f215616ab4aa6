//! Freeze-and-materialize backups of a ClickHouse-style engine.
//!
//! Tables are snapshotted by the engine with a freeze, and the resulting hard
//! links are moved into `<disk>/backup/<name>/` on every disk that holds
//! data. Each backup carries one metadata document per table plus a
//! top-level `metadata.json` written last, so a backup without it was never
//! finished.
//!
//! ```text
//! <disk>/backup/<name>/
//!   metadata.json                              (default disk only)
//!   metadata/<database>/<table>.json           (default disk only)
//!   shadow/<database>/<table>/<disk name>/<part>/...
//! ```
//!
//! Entry points:
//! - [`create_backup`] and [`create_backup_for_agent`] create a backup;
//! - [`remove_backup`] deletes one from every disk;
//! - [`remove_old_backups_local`] applies the retention settings;
//! - [`list_local_backups`] reports complete and broken backups.
//!
//! The engine itself is reached only through [`chbackup_engine::Engine`].

pub mod create;
pub mod error;
mod glob;
pub mod lifecycle;
pub mod select;

pub use crate::create::{create_backup, create_backup_for_agent, create_backup_with};
pub use crate::lifecycle::{LocalBackup, list_local_backups, remove_backup, remove_old_backups_local};
pub use crate::select::{TableRule, filter_tables_by_params, filter_tables_by_pattern};
