//! Metadata documents and naming rules for on-disk backups.
//!
//! # Layout
//! Every backup lives at `<disk>/backup/<backup name>/` on each disk it
//! touches:
//!
//! ```text
//! metadata.json                                         BackupMetadata
//! metadata/<database>/<table>.json                      TableMetadata
//! shadow/<database>/<table>/<disk name>/<part>/...      captured parts
//! ```
//!
//! `<database>` and `<table>` are always passed through [`encode_path`].

pub mod error;
mod models;
mod name;
mod path;

pub use crate::models::{BACKUP_METADATA_FILE, BackupMetadata, DatabaseMeta, Part, TableMetadata, TableTitle};
pub use crate::name::{BACKUP_NAME_FORMAT, backup_name_at, new_backup_name, validate as validate_backup_name};
pub use crate::path::{decode as decode_path, encode as encode_path};
