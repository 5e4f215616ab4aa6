use crate::error::{ErrorKind as BackupErrorKind, Result as BackupResult};
use crate::lifecycle::error::{ErrorKind, Result};
use chbackup_engine::{Disk, EngineHandle};
use chbackup_metadata::validate_backup_name;
use exn::ResultExt;
use tokio::fs;
use tracing::instrument;

/// Delete the backup called `name` from every disk the engine knows about.
///
/// Disks that don't hold the backup are skipped, so removing a backup twice
/// succeeds.
///
/// # Errors
/// Returns [`Exn<BackupErrorKind::Remove>`](BackupErrorKind::Remove) raised
/// from an inner [`Exn<LifecycleErrorKind>`](ErrorKind).
pub async fn remove_backup(engine: &EngineHandle, name: &str) -> BackupResult<()> {
    remove_backup_inner(engine, name).await.or_raise(|| BackupErrorKind::Remove(name.to_string()))
}

async fn remove_backup_inner(engine: &EngineHandle, name: &str) -> Result<()> {
    validate_backup_name(name).or_raise(|| ErrorKind::InvalidName)?;
    engine.connect().await.or_raise(|| ErrorKind::Connect)?;
    // `close()` is async and can't run from `Drop`, so it follows the body
    // directly. The body returns errors and never exits early past it.
    let result = match engine.disks().await.or_raise(|| ErrorKind::Disks) {
        Ok(disks) => remove_backup_local(&disks, name).await,
        Err(e) => Err(e),
    };
    engine.close().await;
    result
}

/// Delete `<disk>/backup/<name>` on each of `disks`.
///
/// Every disk is attempted even after a failure; the first failure is
/// returned.
#[instrument(skip(disks))]
pub async fn remove_backup_local(disks: &[Disk], name: &str) -> Result<()> {
    validate_backup_name(name).or_raise(|| ErrorKind::InvalidName)?;
    let mut failure = None;
    for disk in disks {
        let path = disk.path.join("backup").join(name);
        match fs::remove_dir_all(&path).await {
            Ok(()) => tracing::debug!(disk = %disk.name, "removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => {
                tracing::warn!(disk = %disk.name, path = %path.display(), error = %e, "can't remove backup");
                failure.get_or_insert(Err(e).or_raise(|| ErrorKind::Remove(path)));
            },
        }
    }
    failure.unwrap_or(Ok(()))
}
