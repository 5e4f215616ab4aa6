use crate::create::error::{ErrorKind, Result};
use chbackup_engine::EngineHandle;
use chbackup_metadata::{BACKUP_METADATA_FILE, BackupMetadata, TableMetadata, encode_path};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const TABLE_METADATA_MODE: u32 = 0o644;
const BACKUP_METADATA_MODE: u32 = 0o640;

/// Location of a table's metadata document inside the backup at `backup_path`.
pub fn table_metadata_path(backup_path: &Path, database: &str, table: &str) -> PathBuf {
    backup_path.join("metadata").join(encode_path(database)).join(format!("{}.json", encode_path(table)))
}

/// Write the metadata document for one table, creating `metadata/` and the
/// database directory as needed. Returns the number of bytes written.
pub async fn write_table_metadata(engine: &EngineHandle, backup_path: &Path, table: &TableMetadata) -> Result<u64> {
    let full_name = format!("{}.{}", table.database, table.table);
    let path = table_metadata_path(backup_path, &table.database, &table.table);
    let metadata_dir = backup_path.join("metadata");
    engine.mkdir(&metadata_dir).await.or_raise(|| ErrorKind::Directory(metadata_dir.clone()))?;
    if let Some(database_dir) = path.parent() {
        engine.mkdir(database_dir).await.or_raise(|| ErrorKind::Directory(database_dir.to_path_buf()))?;
    }
    let document = table.to_json().or_raise(|| ErrorKind::TableMetadata(full_name.clone()))?;
    write_document(&path, &document, TABLE_METADATA_MODE)
        .await
        .or_raise(|| ErrorKind::TableMetadata(full_name.clone()))?;
    engine.chown_or_warn(&path).await;
    tracing::debug!(table = %full_name, bytes = document.len(), "metadata written");
    Ok(document.len() as u64)
}

/// Write `metadata.json`, the completion marker of the backup at
/// `backup_path`. Returns the number of bytes written.
pub async fn write_backup_metadata(
    engine: &EngineHandle,
    backup_path: &Path,
    metadata: &BackupMetadata,
) -> Result<u64> {
    let path = backup_path.join(BACKUP_METADATA_FILE);
    let document = metadata.to_json().or_raise(|| ErrorKind::BackupMetadata)?;
    write_document(&path, &document, BACKUP_METADATA_MODE).await.or_raise(|| ErrorKind::BackupMetadata)?;
    engine.chown_or_warn(&path).await;
    Ok(document.len() as u64)
}

/// Create or truncate `path`, write `data`, and flush it to disk.
#[cfg_attr(not(unix), allow(unused_variables))]
async fn write_document(path: &Path, data: &[u8], mode: u32) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(mode);
    let mut file = options.open(path).await.or_raise(|| ErrorKind::Filesystem(path.to_path_buf()))?;
    file.write_all(data).await.or_raise(|| ErrorKind::Filesystem(path.to_path_buf()))?;
    file.sync_all().await.or_raise(|| ErrorKind::Filesystem(path.to_path_buf()))?;
    Ok(())
}
