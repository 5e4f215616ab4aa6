use crate::create::error::{ErrorKind, Result};
use crate::create::freeze::{Capture, freeze_table};
use crate::create::metadata::{write_backup_metadata, write_table_metadata};
use crate::create::selection::{PatternSelection, RuleSelection, Selection};
use crate::error::{ErrorKind as BackupErrorKind, Result as BackupResult};
use crate::lifecycle::{remove_backup_local, remove_old_backups};
use crate::select::TableRule;
use chbackup_config::Config;
use chbackup_engine::{Database, Disk, EngineHandle, Table};
use chbackup_metadata::{
    BACKUP_METADATA_FILE, BackupMetadata, DatabaseMeta, TableMetadata, TableTitle, new_backup_name,
    validate_backup_name,
};
use exn::ResultExt;
use std::path::Path;
use time::OffsetDateTime;
use tokio::fs;
use tracing::instrument;

/// Running totals of a backup run, filled in one table at a time.
#[derive(Debug, Default)]
struct Totals {
    data_size: u64,
    metadata_size: u64,
    tables: Vec<TableTitle>,
}
impl Totals {
    fn add(&mut self, table: &TableMetadata, metadata_size: u64) {
        self.data_size += table.data_size();
        self.metadata_size += metadata_size;
        self.tables.push(TableTitle {
            database: table.database.clone(),
            table: table.table.clone(),
        });
    }
}

/// Back up every table matching `pattern` (comma-separated globs over
/// `database.table`, empty for all tables).
///
/// Without a `name`, one is generated from the current UTC time. Returns the
/// name of the backup.
///
/// # Errors
/// Returns [`Exn<BackupErrorKind::Create>`](BackupErrorKind::Create) raised
/// from an inner [`Exn<CreateErrorKind>`](ErrorKind).
pub async fn create_backup(
    engine: &EngineHandle,
    config: &Config,
    name: Option<&str>,
    pattern: &str,
    schema_only: bool,
    version: &str,
) -> BackupResult<String> {
    create_backup_with(engine, config, name, &PatternSelection { pattern, schema_only }, version).await
}

/// Back up the tables picked by `rules`, each rule deciding whether its
/// tables are captured schema-only.
///
/// # Errors
/// Same as [`create_backup()`]; an empty `rules` list is rejected with
/// [`ErrorKind::EmptyRules`] before connecting.
pub async fn create_backup_for_agent(
    engine: &EngineHandle,
    config: &Config,
    name: Option<&str>,
    rules: &[TableRule],
    version: &str,
) -> BackupResult<String> {
    create_backup_with(engine, config, name, &RuleSelection { rules }, version).await
}

/// Back up the tables picked by `selection`.
pub async fn create_backup_with(
    engine: &EngineHandle,
    config: &Config,
    name: Option<&str>,
    selection: &dyn Selection,
    version: &str,
) -> BackupResult<String> {
    let backup_name =
        prepare(selection, name).or_raise(|| BackupErrorKind::Create(name.unwrap_or_default().to_string()))?;
    create_backup_inner(engine, config, &backup_name, selection, version)
        .await
        .or_raise(|| BackupErrorKind::Create(backup_name.clone()))?;
    Ok(backup_name)
}

fn prepare(selection: &dyn Selection, name: Option<&str>) -> Result<String> {
    selection.validate()?;
    match name {
        Some(name) if !name.is_empty() => {
            Ok(validate_backup_name(name).or_raise(|| ErrorKind::InvalidName)?.to_string())
        },
        _ => new_backup_name().or_raise(|| ErrorKind::InvalidName),
    }
}

/// Holds the connection for the whole run and releases it on every path.
#[instrument(skip_all, fields(backup = %backup_name, operation = "create"))]
async fn create_backup_inner(
    engine: &EngineHandle,
    config: &Config,
    backup_name: &str,
    selection: &dyn Selection,
    version: &str,
) -> Result<()> {
    engine.connect().await.or_raise(|| ErrorKind::Connect)?;
    // `close()` is async and can't run from `Drop`, so it follows the body
    // directly. The body returns errors and never exits early past it.
    let result = run(engine, config, backup_name, selection, version).await;
    engine.close().await;
    result
}

async fn run(
    engine: &EngineHandle,
    config: &Config,
    backup_name: &str,
    selection: &dyn Selection,
    version: &str,
) -> Result<()> {
    let databases = engine.databases().await.or_raise(|| ErrorKind::Databases)?;
    let tables: Vec<Table> = selection
        .select(engine.tables().await.or_raise(|| ErrorKind::Tables)?)
        .into_iter()
        .filter(|table| !table.skip)
        .collect();
    if tables.is_empty() {
        if !config.general.allow_empty_backups {
            exn::bail!(selection.nothing_selected());
        }
        tracing::warn!("no tables selected, creating an empty backup");
    }

    let disks = engine.disks().await.or_raise(|| ErrorKind::Disks)?;
    for disk in &disks {
        let path = disk.path.join("backup");
        engine.mkdir(&path).await.or_raise(|| ErrorKind::Directory(path.clone()))?;
    }
    let default_path = engine.default_path().await.or_raise(|| ErrorKind::DefaultPath)?;
    let backup_path = default_path.join("backup").join(backup_name);
    // Anything but a definite "no" counts as taken.
    if !matches!(fs::try_exists(backup_path.join(BACKUP_METADATA_FILE)).await, Ok(false)) {
        exn::bail!(ErrorKind::AlreadyExists(backup_name.to_string()));
    }
    engine.mkdir(&backup_path).await.or_raise(|| ErrorKind::Directory(backup_path.clone()))?;

    let completed = async {
        let totals = capture_tables(engine, backup_name, &backup_path, &tables, &disks).await?;
        let metadata = BackupMetadata {
            backup_name: backup_name.to_string(),
            disks: disks.iter().map(|disk| (disk.name.clone(), disk.path.display().to_string())).collect(),
            version: version.to_string(),
            creation_date: OffsetDateTime::now_utc(),
            tags: String::new(),
            clickhouse_version: engine.version().await,
            data_size: totals.data_size,
            metadata_size: totals.metadata_size,
            tables: totals.tables,
            databases: databases.into_iter().map(database_meta).collect(),
        };
        write_backup_metadata(engine, &backup_path, &metadata).await
    }
    .await;
    if let Err(e) = completed {
        rollback(&disks, &default_path, backup_name).await;
        return Err(e);
    }
    tracing::info!("done");

    remove_old_backups(&disks, &default_path, &config.general, Some(backup_name))
        .await
        .or_raise(|| ErrorKind::Retention)?;
    Ok(())
}

async fn capture_tables(
    engine: &EngineHandle,
    backup_name: &str,
    backup_path: &Path,
    tables: &[Table],
    disks: &[Disk],
) -> Result<Totals> {
    let mut totals = Totals::default();
    for table in tables {
        let metadata = capture_table(engine, backup_name, table, disks).await?;
        tracing::debug!(table = %table.full_name(), "create metadata");
        let written = write_table_metadata(engine, backup_path, &metadata).await?;
        totals.add(&metadata, written);
        tracing::info!(table = %table.full_name(), schema_only = table.schema_only, "done");
    }
    Ok(totals)
}

async fn capture_table(
    engine: &EngineHandle,
    backup_name: &str,
    table: &Table,
    disks: &[Disk],
) -> Result<TableMetadata> {
    let mut capture = Capture::default();
    if !table.schema_only {
        tracing::debug!(table = %table.full_name(), "create data");
        if let Err(e) = freeze_table(engine, backup_name, table, disks, &mut capture).await {
            tracing::error!(table = %table.full_name(), parts = capture.part_count(), "capture interrupted");
            return Err(e);
        }
    }
    Ok(TableMetadata {
        table: table.name.clone(),
        database: table.database.clone(),
        query: table.create_table_query.clone(),
        total_bytes: table.total_bytes.unwrap_or_default(),
        size: capture.size,
        parts: capture.parts,
    })
}

fn database_meta(database: Database) -> DatabaseMeta {
    DatabaseMeta {
        name: database.name,
        engine: database.engine,
        query: database.query,
    }
}

/// Best effort. The error that caused the rollback is what gets reported.
async fn rollback(disks: &[Disk], default_path: &Path, backup_name: &str) {
    let mut disks = disks.to_vec();
    if !disks.iter().any(|disk| disk.path == default_path) {
        disks.push(Disk::new("default", default_path));
    }
    match remove_backup_local(&disks, backup_name).await {
        Ok(()) => tracing::warn!("partial backup removed"),
        Err(e) => tracing::error!(error = %*e, "can't remove partial backup"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create::error::{NO_TABLES, NO_TABLES_MATCHING_RULES};
    use chbackup_engine::{MockEngine, MockOp};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        default: Disk,
        cold: Disk,
    }
    impl Fixture {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let default = Disk::new("default", root.path().join("default"));
            let cold = Disk::new("cold", root.path().join("cold"));
            std::fs::create_dir_all(&default.path).unwrap();
            std::fs::create_dir_all(&cold.path).unwrap();
            Self {
                _root: root,
                default,
                cold,
            }
        }

        /// A MergeTree table with one part on each disk.
        fn table(&self, database: &str, name: &str) -> Table {
            let table = Table {
                create_table_query: format!("CREATE TABLE {database}.{name} (id UInt64) ENGINE = MergeTree ORDER BY id"),
                data_paths: [&self.default, &self.cold]
                    .iter()
                    .map(|disk| disk.path.join("data").join(database).join(name))
                    .collect(),
                ..Table::new(database, name, "MergeTree")
            };
            for data_path in &table.data_paths {
                MockEngine::seed_part(data_path, "all_1_1_0", &[("data.bin", b"0123456789")]);
            }
            table
        }

        fn engine(&self) -> MockEngine {
            MockEngine::new([self.default.clone(), self.cold.clone()])
        }

        fn backup_exists(&self, name: &str) -> bool {
            self.default.path.join("backup").join(name).exists() || self.cold.path.join("backup").join(name).exists()
        }
    }

    async fn run_pattern(engine: &Arc<MockEngine>, config: &Config, name: &str, pattern: &str) -> Result<()> {
        let handle: EngineHandle = engine.clone();
        let selection = PatternSelection {
            pattern,
            schema_only: false,
        };
        create_backup_inner(&handle, config, name, &selection, "0.1.0").await
    }

    #[tokio::test]
    async fn test_existing_backup_is_rejected() {
        let fixture = Fixture::new();
        let engine = Arc::new(fixture.engine().with_table(fixture.table("sales", "orders")));
        let marker = fixture.default.path.join("backup/b1").join(BACKUP_METADATA_FILE);
        std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
        std::fs::write(&marker, b"{}").unwrap();

        let err = run_pattern(&engine, &Config::default(), "b1", "").await.unwrap_err();
        assert_eq!(*err, ErrorKind::AlreadyExists("b1".to_string()));
        assert_eq!((*err).to_string(), "'b1' already exists");
        assert_eq!(std::fs::read(&marker).unwrap(), b"{}");
        assert!(!fixture.default.path.join("backup/b1/shadow").exists());
        assert!(engine.state().await.frozen.is_empty());
    }

    #[tokio::test]
    async fn test_no_tables() {
        let fixture = Fixture::new();
        let engine = Arc::new(fixture.engine().with_table(fixture.table("sales", "orders")));

        let err = run_pattern(&engine, &Config::default(), "b1", "missing.*").await.unwrap_err();
        assert_eq!(*err, ErrorKind::NoTables(NO_TABLES));
        assert!(!fixture.default.path.join("backup").exists());
        assert!(!fixture.cold.path.join("backup").exists());
        let state = engine.state().await;
        assert_eq!((state.connects, state.closes), (1, 1));
    }

    #[tokio::test]
    async fn test_no_tables_matching_rules() {
        let fixture = Fixture::new();
        let handle: EngineHandle = Arc::new(fixture.engine().with_table(fixture.table("sales", "orders")));
        let rules = [TableRule::new("missing.*", false)];

        let err = create_backup_inner(&handle, &Config::default(), "b1", &RuleSelection { rules: &rules }, "0.1.0")
            .await
            .unwrap_err();
        assert_eq!(*err, ErrorKind::NoTables(NO_TABLES_MATCHING_RULES));
    }

    #[tokio::test]
    async fn test_skipped_tables_dont_count() {
        let fixture = Fixture::new();
        let skipped = Table {
            skip: true,
            ..fixture.table("system", "parts")
        };
        let engine = Arc::new(fixture.engine().with_table(skipped));

        let err = run_pattern(&engine, &Config::default(), "b1", "").await.unwrap_err();
        assert_eq!(*err, ErrorKind::NoTables(NO_TABLES));
    }

    #[tokio::test]
    async fn test_freeze_failure_rolls_back() {
        let fixture = Fixture::new();
        let engine = Arc::new(
            fixture
                .engine()
                .with_table(fixture.table("sales", "orders"))
                .with_table(fixture.table("sales", "customers"))
                .failing(MockOp::Freeze("sales.customers".to_string())),
        );

        let err = run_pattern(&engine, &Config::default(), "b1", "sales.*").await.unwrap_err();
        assert_eq!(*err, ErrorKind::Freeze("sales.customers".to_string()));
        assert!(!fixture.backup_exists("b1"));
        let state = engine.state().await;
        assert_eq!(state.frozen.len(), 1);
        assert_eq!((state.connects, state.closes), (1, 1));
        assert!(!fixture.default.path.join("shadow").join(&state.frozen[0].1).exists());
    }

    #[tokio::test]
    async fn test_metadata_failure_rolls_back() {
        let fixture = Fixture::new();
        let engine = Arc::new(fixture.engine().with_table(fixture.table("sales", "orders")));
        // A file where the metadata directory should be.
        let backup_path = fixture.default.path.join("backup/b1");
        std::fs::create_dir_all(&backup_path).unwrap();
        std::fs::write(backup_path.join("metadata"), b"").unwrap();

        let err = run_pattern(&engine, &Config::default(), "b1", "").await.unwrap_err();
        assert_eq!(*err, ErrorKind::Directory(backup_path.join("metadata/sales")));
        assert!(!fixture.backup_exists("b1"));
    }

    #[tokio::test]
    async fn test_relocation_failure_rolls_back_every_disk() {
        let fixture = Fixture::new();
        let engine = Arc::new(fixture.engine().with_table(fixture.table("sales", "orders")));
        let blocked = fixture.cold.path.join("backup/b1/shadow/sales/orders/cold/all_1_1_0");
        std::fs::create_dir_all(&blocked).unwrap();
        std::fs::write(blocked.join("stale.bin"), b"stale").unwrap();

        let err = run_pattern(&engine, &Config::default(), "b1", "").await.unwrap_err();
        assert_eq!(*err, ErrorKind::Relocate {
            table: "sales.orders".to_string(),
            disk: "cold".to_string(),
        });
        assert!(!fixture.backup_exists("b1"));
        assert_eq!(engine.state().await.closes, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_backup_metadata_failure_rolls_back() {
        let fixture = Fixture::new();
        let engine = Arc::new(fixture.engine().with_table(fixture.table("sales", "orders")));
        // A dangling link where the completion marker goes, pointing into a
        // directory that doesn't exist.
        let backup_path = fixture.default.path.join("backup/b1");
        std::fs::create_dir_all(&backup_path).unwrap();
        std::os::unix::fs::symlink(fixture.default.path.join("missing/metadata.json"), backup_path.join(BACKUP_METADATA_FILE))
            .unwrap();

        let err = run_pattern(&engine, &Config::default(), "b1", "").await.unwrap_err();
        assert_eq!(*err, ErrorKind::BackupMetadata);
        assert!(!err.is_backup_complete());
        assert!(!fixture.backup_exists("b1"));
        assert_eq!(engine.state().await.closes, 1);
    }

    #[tokio::test]
    async fn test_retention_failure_keeps_completed_backup() {
        let fixture = Fixture::new();
        let engine = Arc::new(fixture.engine().with_table(fixture.table("sales", "orders")));
        run_pattern(&engine, &Config::default(), "b0", "").await.unwrap();
        // A file where a backup directory is expected can't be removed as one.
        let stray = fixture.cold.path.join("backup/b0");
        std::fs::remove_dir_all(&stray).unwrap();
        std::fs::write(&stray, b"").unwrap();
        let mut config = Config::default();
        config.general.backups_to_keep_local = 1;

        let err = run_pattern(&engine, &config, "b1", "").await.unwrap_err();
        assert_eq!(*err, ErrorKind::Retention);
        assert!(err.is_backup_complete());
        assert!(fixture.default.path.join("backup/b1").join(BACKUP_METADATA_FILE).is_file());
        assert!(fixture.cold.path.join("backup/b1/shadow/sales/orders/cold/all_1_1_0").is_dir());
        assert!(!fixture.default.path.join("backup/b0").exists());
        assert_eq!(engine.state().await.closes, 2);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let fixture = Fixture::new();
        let engine = Arc::new(fixture.engine().failing(MockOp::Connect));

        let err = run_pattern(&engine, &Config::default(), "b1", "").await.unwrap_err();
        assert_eq!(*err, ErrorKind::Connect);
        assert!(err.is_retryable());
        assert_eq!(engine.state().await.closes, 0);
    }

    #[tokio::test]
    async fn test_engine_failure_closes_connection() {
        let fixture = Fixture::new();
        let engine = Arc::new(fixture.engine().with_table(fixture.table("sales", "orders")).failing(MockOp::Disks));

        let err = run_pattern(&engine, &Config::default(), "b1", "").await.unwrap_err();
        assert_eq!(*err, ErrorKind::Disks);
        let state = engine.state().await;
        assert_eq!((state.connects, state.closes, state.connected), (1, 1, false));
    }

    #[test]
    fn test_prepare_name() {
        let selection = PatternSelection {
            pattern: "",
            schema_only: false,
        };
        assert_eq!(prepare(&selection, Some("nightly")).unwrap(), "nightly");
        assert_eq!(prepare(&selection, Some("")).unwrap().len(), "2024-03-02T10-15-30".len());
        assert_eq!(*prepare(&selection, Some("../x")).unwrap_err(), ErrorKind::InvalidName);
        assert_eq!(*prepare(&RuleSelection { rules: &[] }, None).unwrap_err(), ErrorKind::EmptyRules);
    }
}
