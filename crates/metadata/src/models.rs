//! Metadata documents written into every backup.
//!
//! A backup directory contains one [`TableMetadata`] document per table under
//! `metadata/<database>/<table>.json`, and a single [`BackupMetadata`]
//! document at `metadata.json`. The backup document is written last: a backup
//! without one is incomplete, no matter what else is on disk.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// File name of the backup-level document (the completion marker).
pub const BACKUP_METADATA_FILE: &str = "metadata.json";

/// One captured part directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub name: String,
    /// Sum of the sizes of the regular files in the part, in bytes.
    pub size: u64,
}

/// Everything captured for one table in one backup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableMetadata {
    pub table: String,
    pub database: String,
    /// `CREATE TABLE` statement, always present even for schema-only tables.
    pub query: String,
    /// Size reported by the engine at capture time.
    pub total_bytes: u64,
    /// Bytes captured per disk name.
    #[serde(default)]
    pub size: BTreeMap<String, u64>,
    /// Parts captured per disk name, in capture order.
    #[serde(default)]
    pub parts: BTreeMap<String, Vec<Part>>,
}
impl TableMetadata {
    /// Total captured bytes across all disks.
    pub fn data_size(&self) -> u64 {
        self.size.values().sum()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        to_json_indented(self, b" ").or_raise(|| ErrorKind::Serialize("table metadata"))
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).or_raise(|| ErrorKind::Deserialize("table metadata"))
    }
}

/// A `(database, table)` entry in [`BackupMetadata::tables`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableTitle {
    pub database: String,
    pub table: String,
}

/// A database as it existed when the backup was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMeta {
    pub name: String,
    pub engine: String,
    pub query: String,
}

/// The backup-level document and completion marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub backup_name: String,
    /// Disk name to disk root path at capture time, needed to rebuild the
    /// layout on restore.
    pub disks: BTreeMap<String, String>,
    /// Version of the tool that created the backup.
    pub version: String,
    #[serde(with = "time::serde::rfc3339")]
    pub creation_date: OffsetDateTime,
    /// Kept empty; consumers of the format expect the field.
    #[serde(default)]
    pub tags: String,
    pub clickhouse_version: String,
    pub data_size: u64,
    pub metadata_size: u64,
    pub tables: Vec<TableTitle>,
    pub databases: Vec<DatabaseMeta>,
}
impl BackupMetadata {
    pub fn to_json(&self) -> Result<Vec<u8>> {
        to_json_indented(self, b"\t").or_raise(|| ErrorKind::Serialize(BACKUP_METADATA_FILE))
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).or_raise(|| ErrorKind::Deserialize(BACKUP_METADATA_FILE))
    }
}

/// Both documents are meant to be read (and diffed) by humans.
fn to_json_indented<T: Serialize>(value: &T, indent: &[u8]) -> serde_json::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(indent));
    value.serialize(&mut serializer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn table_metadata() -> TableMetadata {
        TableMetadata {
            table: "orders".to_string(),
            database: "sales".to_string(),
            query: "CREATE TABLE sales.orders (id UInt64) ENGINE = MergeTree ORDER BY id".to_string(),
            total_bytes: 4096,
            size: BTreeMap::from([("cold".to_string(), 1000), ("default".to_string(), 24)]),
            parts: BTreeMap::from([
                ("cold".to_string(), vec![Part { name: "all_1_1_0".to_string(), size: 1000 }]),
                ("default".to_string(), vec![Part { name: "all_2_2_0".to_string(), size: 24 }]),
            ]),
        }
    }

    #[test]
    fn test_table_metadata_data_size() {
        assert_eq!(table_metadata().data_size(), 1024);
        assert_eq!(TableMetadata::default().data_size(), 0);
    }

    #[test]
    fn test_table_metadata_uses_single_space_indent() {
        let json = String::from_utf8(table_metadata().to_json().unwrap()).unwrap();
        assert!(json.starts_with("{\n \"table\": \"orders\",\n \"database\": \"sales\","));
        assert!(json.contains("\n  \"cold\": 1000"));
    }

    #[test]
    fn test_schema_only_table_keeps_empty_maps() {
        let metadata = TableMetadata {
            table: "events".to_string(),
            database: "logs".to_string(),
            query: "CREATE VIEW logs.events AS SELECT 1".to_string(),
            ..TableMetadata::default()
        };
        let value: serde_json::Value = serde_json::from_slice(&metadata.to_json().unwrap()).unwrap();
        assert_eq!(value["size"], serde_json::json!({}));
        assert_eq!(value["parts"], serde_json::json!({}));
        assert_eq!(value["query"], "CREATE VIEW logs.events AS SELECT 1");
    }

    #[test]
    fn test_backup_metadata_format() {
        let metadata = BackupMetadata {
            backup_name: "2024-03-02T10-15-30".to_string(),
            disks: BTreeMap::from([("default".to_string(), "/var/lib/clickhouse".to_string())]),
            version: "1.0.0".to_string(),
            creation_date: datetime!(2024-03-02 10:15:30 UTC),
            tags: String::new(),
            clickhouse_version: "21.8.4.51".to_string(),
            data_size: 1024,
            metadata_size: 312,
            tables: vec![TableTitle { database: "sales".to_string(), table: "orders".to_string() }],
            databases: vec![DatabaseMeta {
                name: "sales".to_string(),
                engine: "Atomic".to_string(),
                query: "CREATE DATABASE sales ENGINE = Atomic".to_string(),
            }],
        };
        let json = String::from_utf8(metadata.to_json().unwrap()).unwrap();
        assert!(json.starts_with("{\n\t\"backup_name\": \"2024-03-02T10-15-30\",\n"));
        assert!(json.contains("\t\"creation_date\": \"2024-03-02T10:15:30Z\",\n"));
        assert_eq!(BackupMetadata::from_json(json.as_bytes()).unwrap(), metadata);
    }

    #[test]
    fn test_backup_metadata_rejects_garbage() {
        let err = BackupMetadata::from_json(b"{\"backup_name\": 5}").unwrap_err();
        assert_eq!(*err, ErrorKind::Deserialize(BACKUP_METADATA_FILE));
    }
}
