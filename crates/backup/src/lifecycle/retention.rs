use crate::error::{ErrorKind as BackupErrorKind, Result as BackupResult};
use crate::lifecycle::error::{ErrorKind, Result};
use crate::lifecycle::remove::remove_backup_local;
use chbackup_config::{Config, GeneralConfig};
use chbackup_engine::{Disk, EngineHandle};
use chbackup_metadata::{BACKUP_METADATA_FILE, BackupMetadata};
use exn::ResultExt;
use std::path::Path;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::fs;
use tracing::instrument;

/// A backup directory found on the default disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalBackup {
    Complete { name: String, metadata: Box<BackupMetadata> },
    Broken { name: String, reason: String },
}
impl LocalBackup {
    /// Directory name, which is what removal goes by.
    pub fn name(&self) -> &str {
        match self {
            Self::Complete { name, .. } | Self::Broken { name, .. } => name,
        }
    }

    pub fn is_broken(&self) -> bool {
        matches!(self, Self::Broken { .. })
    }
}

/// Every backup under `<default_path>/backup`, sorted by directory name.
///
/// A missing `backup` directory means there are no backups yet.
pub async fn list_local_backups(default_path: &Path) -> Result<Vec<LocalBackup>> {
    let root = default_path.join("backup");
    let mut entries = match fs::read_dir(&root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(e).or_raise(|| ErrorKind::List(root.clone())),
    };
    let mut backups = Vec::new();
    while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::List(root.clone()))? {
        if !entry.file_type().await.or_raise(|| ErrorKind::List(root.clone()))?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let backup = match fs::read(entry.path().join(BACKUP_METADATA_FILE)).await {
            Ok(contents) => match BackupMetadata::from_json(&contents) {
                Ok(metadata) => LocalBackup::Complete {
                    name,
                    metadata: Box::new(metadata),
                },
                Err(_) => LocalBackup::Broken {
                    name,
                    reason: format!("can't parse {BACKUP_METADATA_FILE}"),
                },
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LocalBackup::Broken {
                name,
                reason: format!("{BACKUP_METADATA_FILE} is missing"),
            },
            Err(e) => LocalBackup::Broken {
                name,
                reason: format!("can't read {BACKUP_METADATA_FILE}: {e}"),
            },
        };
        backups.push(backup);
    }
    backups.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(backups)
}

/// Names of the complete backups that retention would delete, oldest first.
///
/// With `keep` above zero, everything but the `keep` newest backups is
/// expired. With a `max_age`, anything created before `now - max_age` is
/// expired too. Broken backups are never returned.
pub fn expired_backups(
    backups: &[LocalBackup],
    keep: usize,
    max_age: Option<Duration>,
    now: OffsetDateTime,
) -> Vec<&str> {
    let mut complete: Vec<(&str, OffsetDateTime)> = backups
        .iter()
        .filter_map(|backup| match backup {
            LocalBackup::Complete { name, metadata } => Some((name.as_str(), metadata.creation_date)),
            LocalBackup::Broken { .. } => None,
        })
        .collect();
    complete.sort_by(|(a_name, a_date), (b_name, b_date)| a_date.cmp(b_date).then_with(|| a_name.cmp(b_name)));

    let excess = if keep == 0 { 0 } else { complete.len().saturating_sub(keep) };
    let cutoff = max_age
        .and_then(|age| time::Duration::try_from(age).ok())
        .and_then(|age| now.checked_sub(age));
    complete
        .into_iter()
        .enumerate()
        .filter(|(index, (_, created))| *index < excess || cutoff.is_some_and(|cutoff| *created < cutoff))
        .map(|(_, (name, _))| name)
        .collect()
}

/// Apply the retention rules of `general` to the backups on the default
/// disk, deleting expired ones from every disk. `protected` is never
/// deleted, whatever its age.
///
/// Returns the names that were removed.
#[instrument(skip_all)]
pub async fn remove_old_backups(
    disks: &[Disk],
    default_path: &Path,
    general: &GeneralConfig,
    protected: Option<&str>,
) -> Result<Vec<String>> {
    if general.backups_to_keep_local == 0 && general.backups_max_age.is_none() {
        return Ok(vec![]);
    }
    let backups = list_local_backups(default_path).await?;
    let expired: Vec<String> = expired_backups(
        &backups,
        general.backups_to_keep_local,
        general.max_age(),
        OffsetDateTime::now_utc(),
    )
    .into_iter()
    .filter(|name| Some(*name) != protected)
    .map(str::to_string)
    .collect();
    for name in &expired {
        remove_backup_local(disks, name).await?;
        tracing::info!(backup = %name, operation = "delete", "done");
    }
    Ok(expired)
}

/// Connect, apply retention, and disconnect.
///
/// # Errors
/// Returns [`Exn<BackupErrorKind::Retention>`](BackupErrorKind::Retention)
/// raised from an inner [`Exn<LifecycleErrorKind>`](ErrorKind).
pub async fn remove_old_backups_local(engine: &EngineHandle, config: &Config) -> BackupResult<Vec<String>> {
    remove_old_backups_inner(engine, config).await.or_raise(|| BackupErrorKind::Retention)
}

async fn remove_old_backups_inner(engine: &EngineHandle, config: &Config) -> Result<Vec<String>> {
    engine.connect().await.or_raise(|| ErrorKind::Connect)?;
    // `close()` is async and can't run from `Drop`, so it follows the body
    // directly. The body returns errors and never exits early past it.
    let result = async {
        let disks = engine.disks().await.or_raise(|| ErrorKind::Disks)?;
        let default_path = engine.default_path().await.or_raise(|| ErrorKind::DefaultPath)?;
        remove_old_backups(&disks, &default_path, &config.general, None).await
    }
    .await;
    engine.close().await;
    result
}
