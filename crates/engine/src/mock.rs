//! In-process engine for testing.

use crate::error::{ErrorKind, Result};
use crate::models::{Database, Disk, Table};
use crate::Engine;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// An engine operation that [`MockEngine`] can be told to fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    Connect,
    Databases,
    Tables,
    Disks,
    DefaultPath,
    /// Freezing the table with this `database.table` name.
    Freeze(String),
    CleanShadow,
    Chown,
}

/// Everything the mock has been asked to do so far.
#[derive(Debug, Clone, Default)]
pub struct MockState {
    pub connected: bool,
    pub connects: usize,
    pub closes: usize,
    /// `(database.table, token)` for every successful freeze.
    pub frozen: Vec<(String, String)>,
    pub cleaned: Vec<String>,
    pub chowned: Vec<PathBuf>,
}

/// Engine that runs against real directories on the local filesystem.
///
/// Table data lives wherever the table's `data_paths` point, one directory per
/// part. Freezing hard-links those part directories into
/// `<disk>/shadow/<token>/<data path relative to disk>/<part>/`, which is the
/// layout the real engine produces. The first disk is the default disk.
///
/// Failures can be injected per operation with [`failing()`](Self::failing),
/// and every call is recorded in [`MockState`].
pub struct MockEngine {
    disks: Vec<Disk>,
    databases: Vec<Database>,
    tables: Vec<Table>,
    version: String,
    failures: Vec<MockOp>,
    state: Mutex<MockState>,
}

impl MockEngine {
    /// Panics without at least one disk. If test setup is wrong, then test
    /// should not pass.
    pub fn new(disks: impl IntoIterator<Item = Disk>) -> Self {
        let disks: Vec<Disk> = disks.into_iter().collect();
        assert!(!disks.is_empty(), "MockEngine::new: at least one disk is required");
        Self {
            disks,
            databases: vec![],
            tables: vec![],
            version: "21.8.4.51".to_string(),
            failures: vec![],
            state: Mutex::new(MockState::default()),
        }
    }

    /// Add a table. Its database is registered too, with the `Atomic` engine.
    pub fn with_table(mut self, table: Table) -> Self {
        if !self.databases.iter().any(|d| d.name == table.database) {
            self.databases.push(Database {
                name: table.database.clone(),
                engine: "Atomic".to_string(),
                query: format!("CREATE DATABASE {} ENGINE = Atomic", table.database),
            });
        }
        self.tables.push(table);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Make `op` fail with [`ErrorKind::Query`] every time it is called.
    pub fn failing(mut self, op: MockOp) -> Self {
        self.failures.push(op);
        self
    }

    pub async fn state(&self) -> MockState {
        self.state.lock().await.clone()
    }

    /// Write one part with the given files under a table data path.
    ///
    /// Panics on I/O errors. The panic here is DELIBERATE, this is test setup.
    pub fn seed_part(data_path: impl AsRef<Path>, part: &str, files: &[(&str, &[u8])]) {
        let part_path = data_path.as_ref().join(part);
        if let Err(e) = std::fs::create_dir_all(&part_path) {
            panic!("MockEngine::seed_part: can't create {}: {e}", part_path.display());
        }
        for (name, data) in files {
            if let Err(e) = std::fs::write(part_path.join(name), data) {
                panic!("MockEngine::seed_part: can't write {name}: {e}");
            }
        }
    }

    async fn check(&self, op: MockOp) -> Result<()> {
        if self.failures.contains(&op) {
            exn::bail!(ErrorKind::Query(format!("injected failure: {op:?}")));
        }
        if op != MockOp::Connect && !self.state.lock().await.connected {
            exn::bail!(ErrorKind::NotConnected);
        }
        Ok(())
    }

    /// Hard-link every part under `data_path` into the shadow for `token`.
    async fn freeze_path(disk: &Disk, data_path: &Path, token: &str) -> Result<()> {
        let Ok(relative) = data_path.strip_prefix(&disk.path) else {
            return Ok(());
        };
        let mut parts = match fs::read_dir(data_path).await {
            Ok(parts) => parts,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => exn::bail!(ErrorKind::from_io(e, data_path)),
        };
        while let Some(part) = parts.next_entry().await.map_err(|e| ErrorKind::from_io(e, data_path))? {
            let part_path = part.path();
            if !part.file_type().await.map_err(|e| ErrorKind::from_io(e, &part_path))?.is_dir() {
                continue;
            }
            let target = disk.path.join("shadow").join(token).join(relative).join(part.file_name());
            fs::create_dir_all(&target).await.map_err(|e| ErrorKind::from_io(e, &target))?;
            let mut files = fs::read_dir(&part_path).await.map_err(|e| ErrorKind::from_io(e, &part_path))?;
            while let Some(file) = files.next_entry().await.map_err(|e| ErrorKind::from_io(e, &part_path))? {
                let file_path = file.path();
                if file.file_type().await.map_err(|e| ErrorKind::from_io(e, &file_path))?.is_file() {
                    fs::hard_link(&file_path, target.join(file.file_name()))
                        .await
                        .map_err(|e| ErrorKind::from_io(e, &file_path))?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Engine for MockEngine {
    async fn connect(&self) -> Result<()> {
        self.check(MockOp::Connect).await?;
        let mut state = self.state.lock().await;
        state.connected = true;
        state.connects += 1;
        Ok(())
    }

    async fn close(&self) {
        let mut state = self.state.lock().await;
        state.connected = false;
        state.closes += 1;
    }

    async fn databases(&self) -> Result<Vec<Database>> {
        self.check(MockOp::Databases).await?;
        Ok(self.databases.clone())
    }

    async fn tables(&self) -> Result<Vec<Table>> {
        self.check(MockOp::Tables).await?;
        Ok(self.tables.clone())
    }

    async fn disks(&self) -> Result<Vec<Disk>> {
        self.check(MockOp::Disks).await?;
        Ok(self.disks.clone())
    }

    async fn default_path(&self) -> Result<PathBuf> {
        self.check(MockOp::DefaultPath).await?;
        Ok(self.disks[0].path.clone())
    }

    async fn freeze_table(&self, table: &Table, token: &str) -> Result<()> {
        self.check(MockOp::Freeze(table.full_name())).await?;
        for data_path in &table.data_paths {
            if let Some(disk) = self.disks.iter().find(|d| data_path.starts_with(&d.path)) {
                Self::freeze_path(disk, data_path, token).await?;
            }
        }
        self.state.lock().await.frozen.push((table.full_name(), token.to_string()));
        Ok(())
    }

    async fn clean_shadow(&self, token: &str) -> Result<()> {
        self.check(MockOp::CleanShadow).await?;
        for disk in &self.disks {
            let shadow = disk.path.join("shadow").join(token);
            match fs::remove_dir_all(&shadow).await {
                Ok(()) => {},
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                Err(e) => exn::bail!(ErrorKind::from_io(e, &shadow)),
            }
        }
        self.state.lock().await.cleaned.push(token.to_string());
        Ok(())
    }

    async fn version(&self) -> String {
        self.version.clone()
    }

    async fn chown(&self, path: &Path) -> Result<()> {
        self.check(MockOp::Chown).await?;
        #[cfg(unix)]
        crate::Ownership::of(&self.disks[0].path).await?.apply(path)?;
        self.state.lock().await.chowned.push(path.to_path_buf());
        Ok(())
    }
}
