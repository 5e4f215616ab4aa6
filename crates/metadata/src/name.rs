//! Backup names.
//!
//! A backup name is also the backup's directory name on every disk, so it
//! must be a single, non-special path segment. Generated names are the UTC
//! creation time, which sorts chronologically.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::{Component, Path};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

/// Default backup name format, e.g. `2024-03-02T10-15-30`.
pub const BACKUP_NAME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]-[minute]-[second]");

/// Name for a backup created right now.
pub fn new_backup_name() -> Result<String> {
    backup_name_at(OffsetDateTime::now_utc())
}

/// Name for a backup created at `at`, converted to UTC first.
pub fn backup_name_at(at: OffsetDateTime) -> Result<String> {
    at.to_offset(time::UtcOffset::UTC).format(BACKUP_NAME_FORMAT).or_raise(|| ErrorKind::Timestamp)
}

/// Ensure a caller-supplied name can be used as a backup directory name.
///
/// # Examples
///
/// ```
/// use chbackup_metadata::validate_backup_name;
///
/// assert!(validate_backup_name("2024-03-02T10-15-30").is_ok());
/// assert!(validate_backup_name("before-upgrade").is_ok());
/// assert!(validate_backup_name("../etc").is_err());
/// assert!(validate_backup_name("a/b").is_err());
/// assert!(validate_backup_name("").is_err());
/// ```
pub fn validate(name: &str) -> Result<&str> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(segment)), None) if segment == name && !name.contains('\0') => Ok(name),
        _ => exn::bail!(ErrorKind::InvalidName(name.to_string())),
    }
}
