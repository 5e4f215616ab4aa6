use crate::create::error::{ErrorKind, Result};
use chbackup_engine::{Disk, EngineHandle, Table};
use chbackup_metadata::{Part, encode_path};
use exn::ResultExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

/// Parts sit at `data/<database>/<table>/<part>` below a freeze holding area.
const PART_DEPTH: usize = 4;

/// What a freeze captured for one table, per disk name.
///
/// A disk the freeze left a holding area on always has an entry, with zero
/// bytes and no parts if the holding area was empty. Disks without one have
/// no entry at all. Filled in as parts are moved, so after an error it
/// describes what already made it into the backup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capture {
    pub parts: BTreeMap<String, Vec<Part>>,
    /// Sum of part sizes in bytes.
    pub size: BTreeMap<String, u64>,
}
impl Capture {
    /// Total captured bytes over every disk.
    pub fn data_size(&self) -> u64 {
        self.size.values().sum()
    }

    pub fn part_count(&self) -> usize {
        self.parts.values().map(Vec::len).sum()
    }

    fn open(&mut self, disk: &str) {
        self.size.entry(disk.to_string()).or_default();
        self.parts.entry(disk.to_string()).or_default();
    }

    fn record(&mut self, disk: &str, part: Part) {
        *self.size.entry(disk.to_string()).or_default() += part.size;
        self.parts.entry(disk.to_string()).or_default().push(part);
    }
}

/// Directory holding the frozen parts of `table` on `disk` inside a backup.
pub fn shadow_destination(disk: &Disk, backup_name: &str, table: &Table) -> PathBuf {
    disk.path
        .join("backup")
        .join(backup_name)
        .join("shadow")
        .join(encode_path(&table.database))
        .join(encode_path(&table.name))
        .join(&disk.name)
}

/// Freeze `table` and move its snapshot into the backup on every disk.
///
/// Tables whose engine can't be frozen are left alone and `capture` stays
/// empty. Otherwise a fresh token names the freeze; for each disk that ends
/// up with a `shadow/<token>` holding area, the parts found there are moved
/// to [`shadow_destination()`] and the holding area is deleted. The engine's
/// own freeze bookkeeping is released last.
///
/// On error, `capture` keeps whatever was moved before the failure. Holding
/// areas that were not processed yet are left in place.
#[instrument(skip_all, fields(table = %table.full_name()))]
pub async fn freeze_table(
    engine: &EngineHandle,
    backup_name: &str,
    table: &Table,
    disks: &[Disk],
    capture: &mut Capture,
) -> Result<()> {
    if !table.is_freezable() {
        tracing::debug!(engine = %table.engine, "engine can't be frozen, skipping data");
        return Ok(());
    }
    let token = uuid::Uuid::new_v4().simple().to_string();
    engine.freeze_table(table, &token).await.or_raise(|| ErrorKind::Freeze(table.full_name()))?;
    tracing::debug!(token = %token, "freezed");

    for disk in disks {
        let holding = disk.path.join("shadow").join(&token);
        if !fs::try_exists(&holding).await.or_raise(|| ErrorKind::Filesystem(holding.clone()))? {
            continue;
        }
        let relocate = || ErrorKind::Relocate {
            table: table.full_name(),
            disk: disk.name.clone(),
        };
        let destination = shadow_destination(disk, backup_name, table);
        engine.mkdir_all(&destination).await.or_raise(|| ErrorKind::Directory(destination.clone()))?;
        capture.open(&disk.name);
        move_parts(&holding, &destination, &disk.name, capture).await.or_raise(relocate)?;
        fs::remove_dir_all(&holding).await.or_raise(|| ErrorKind::Filesystem(holding.clone())).or_raise(relocate)?;
        tracing::debug!(disk = %disk.name, parts = capture.parts.get(&disk.name).map_or(0, Vec::len), "shadow moved");
    }

    engine.clean_shadow(&token).await.or_raise(|| ErrorKind::Freeze(table.full_name()))?;
    Ok(())
}

/// Rename every part directory under `holding` into `destination`, in name
/// order, recording each one in `capture`.
async fn move_parts(holding: &Path, destination: &Path, disk: &str, capture: &mut Capture) -> Result<()> {
    let mut parts = find_parts(holding).await?;
    parts.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    for source in parts {
        let Some(name) = source.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let size = dir_size(&source).await?;
        let target = destination.join(&name);
        fs::rename(&source, &target).await.or_raise(|| ErrorKind::Filesystem(target.clone()))?;
        capture.record(disk, Part { name, size });
    }
    Ok(())
}

/// Directories exactly [`PART_DEPTH`] levels below `root`. Anything that
/// isn't a directory on the way down is ignored.
async fn find_parts(root: &Path) -> Result<Vec<PathBuf>> {
    let mut level = vec![root.to_path_buf()];
    for _ in 0..PART_DEPTH {
        let mut next = Vec::new();
        for dir in level {
            let mut entries = fs::read_dir(&dir).await.or_raise(|| ErrorKind::Filesystem(dir.clone()))?;
            while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::Filesystem(dir.clone()))? {
                let path = entry.path();
                if entry.file_type().await.or_raise(|| ErrorKind::Filesystem(path.clone()))?.is_dir() {
                    next.push(path);
                }
            }
        }
        level = next;
    }
    Ok(level)
}

/// Total size of the regular files below `root`. Symlinks are not followed.
async fn dir_size(root: &Path) -> Result<u64> {
    let mut size = 0;
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await.or_raise(|| ErrorKind::Filesystem(dir.clone()))?;
        while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::Filesystem(dir.clone()))? {
            let path = entry.path();
            let file_type = entry.file_type().await.or_raise(|| ErrorKind::Filesystem(path.clone()))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                size += entry.metadata().await.or_raise(|| ErrorKind::Filesystem(path.clone()))?.len();
            }
        }
    }
    Ok(size)
}
