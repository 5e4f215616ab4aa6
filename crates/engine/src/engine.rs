//! Engine trait.
//!
//! The backup core never talks to the database directly; everything it needs
//! goes through [`Engine`]. Implementations own the driver, the wire protocol,
//! and the bookkeeping that comes with it.

use crate::error::{ErrorKind, Result};
use crate::models::{Database, Disk, Table};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Contract consumed by the backup core.
///
/// A connection is opened with [`connect()`](Self::connect) and must be
/// released with [`close()`](Self::close) on every exit path, successful or
/// not. All other methods assume an open connection.
///
/// # Examples
///
/// ```
/// use chbackup_engine::{Engine, error::Result};
///
/// async fn freezable_tables(engine: &dyn Engine) -> Result<Vec<String>> {
///     engine.connect().await?;
///     let tables = engine.tables().await;
///     engine.close().await;
///     Ok(tables?.into_iter().filter(|t| t.is_freezable()).map(|t| t.full_name()).collect())
/// }
/// ```
#[async_trait]
pub trait Engine: Send + Sync {
    async fn connect(&self) -> Result<()>;

    /// Close the connection. Never fails; problems are logged by the
    /// implementation.
    async fn close(&self);

    /// All databases with their engines.
    async fn databases(&self) -> Result<Vec<Database>>;

    /// All tables, with `skip` already set for the ones that must not be
    /// backed up.
    async fn tables(&self) -> Result<Vec<Table>>;

    /// All disks the engine stores data on.
    async fn disks(&self) -> Result<Vec<Disk>>;

    /// Root path of the default disk.
    async fn default_path(&self) -> Result<PathBuf>;

    /// Snapshot every part of `table` into `<disk>/shadow/<token>/` on each
    /// disk holding data for it. Blocks until the engine is done.
    async fn freeze_table(&self, table: &Table, token: &str) -> Result<()>;

    /// Release whatever the engine still tracks for a freeze `token`.
    async fn clean_shadow(&self, token: &str) -> Result<()>;

    /// Human readable engine version, e.g. `21.8.4.51`.
    async fn version(&self) -> String;

    /// Give `path` the owner of the engine's data directory, so both the
    /// engine and this process can manage it.
    async fn chown(&self, path: &Path) -> Result<()>;

    /// Create one directory (the parent must exist), then give it to the
    /// engine user. An existing directory is not an error.
    ///
    /// Only creating the directory can fail; see
    /// [`chown_or_warn()`](Self::chown_or_warn).
    async fn mkdir(&self, path: &Path) -> Result<()> {
        match fs::create_dir(path).await {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {},
            Err(e) => exn::bail!(ErrorKind::from_io(e, path)),
        }
        self.chown_or_warn(path).await;
        Ok(())
    }

    /// Create a directory and all of its missing parents, then give the leaf
    /// to the engine user.
    async fn mkdir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await.map_err(|e| ErrorKind::from_io(e, path))?;
        self.chown_or_warn(path).await;
        Ok(())
    }

    /// [`chown()`](Self::chown) that only logs a failure. A backup stays
    /// usable when ownership can't be fixed.
    async fn chown_or_warn(&self, path: &Path) {
        if let Err(e) = self.chown(path).await {
            tracing::warn!(path = %path.display(), error = %*e, "can't chown");
        }
    }
}
