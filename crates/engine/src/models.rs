//! Engine models.
//!
//! These are what the engine reports about itself at the start of every run.
//! None of them are persisted by the backup core as-is.

use std::path::PathBuf;

/// Engines whose name ends with this suffix support `ALTER TABLE ... FREEZE`.
pub const FREEZABLE_ENGINE_SUFFIX: &str = "MergeTree";

/// A table as reported by `system.tables`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    pub database: String,
    pub name: String,
    /// Storage engine name (`MergeTree`, `ReplicatedMergeTree`, `View`, ...)
    pub engine: String,
    pub create_table_query: String,
    /// Reported by the engine; unknown for engines that don't track it.
    pub total_bytes: Option<u64>,
    /// Every data directory the table owns, across all disks.
    pub data_paths: Vec<PathBuf>,
    /// Excluded by the engine layer (system databases, temporary tables...).
    pub skip: bool,
    /// Capture the definition only, never the data parts.
    pub schema_only: bool,
}
impl Table {
    pub fn new(database: impl Into<String>, name: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
            engine: engine.into(),
            ..Self::default()
        }
    }

    /// The `database.table` identifier used for pattern matching and logging.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }

    /// Whether the engine can snapshot this table with a freeze.
    pub fn is_freezable(&self) -> bool {
        self.engine.ends_with(FREEZABLE_ENGINE_SUFFIX)
    }
}

/// A storage volume the engine writes data under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    pub name: String,
    /// Root path of the disk, e.g. `/var/lib/clickhouse`
    pub path: PathBuf,
    /// Engine-reported disk type (`local`, `s3`, ...), informational only.
    pub kind: String,
}
impl Disk {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: "local".to_string(),
        }
    }
}

/// A database and its engine, as reported by `system.databases`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    pub name: String,
    pub engine: String,
    pub query: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name() {
        assert_eq!(Table::new("sales", "orders", "MergeTree").full_name(), "sales.orders");
    }

    #[test]
    fn test_freezable_engines() {
        assert!(Table::new("db", "t", "MergeTree").is_freezable());
        assert!(Table::new("db", "t", "ReplicatedReplacingMergeTree").is_freezable());
        assert!(!Table::new("db", "t", "View").is_freezable());
        assert!(!Table::new("db", "t", "MergeTreeLike").is_freezable());
        assert!(!Table::new("db", "t", "Distributed").is_freezable());
    }
}
