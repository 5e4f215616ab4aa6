use crate::create::error::{ErrorKind, NO_TABLES, NO_TABLES_MATCHING_RULES, Result};
use crate::select::{TableRule, filter_tables_by_params, filter_tables_by_pattern};
use chbackup_engine::Table;

/// How a backup run picks its tables from everything the engine reports.
pub trait Selection: Send + Sync {
    /// Reject a selection that can never match, before anything else runs.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Tables to back up, with `schema_only` set as they should be captured.
    fn select(&self, tables: Vec<Table>) -> Vec<Table>;

    /// Error returned when nothing was selected and empty backups are not
    /// allowed.
    fn nothing_selected(&self) -> ErrorKind {
        ErrorKind::NoTables(NO_TABLES)
    }
}

/// Comma-separated globs with one schema-only flag for every table.
#[derive(Debug, Clone, Copy)]
pub struct PatternSelection<'a> {
    pub pattern: &'a str,
    pub schema_only: bool,
}
impl Selection for PatternSelection<'_> {
    fn select(&self, tables: Vec<Table>) -> Vec<Table> {
        filter_tables_by_pattern(tables, self.pattern)
            .into_iter()
            .map(|table| Table {
                schema_only: self.schema_only,
                ..table
            })
            .collect()
    }
}

/// Per-table rules, each with its own schema-only flag.
#[derive(Debug, Clone, Copy)]
pub struct RuleSelection<'a> {
    pub rules: &'a [TableRule],
}
impl Selection for RuleSelection<'_> {
    fn validate(&self) -> Result<()> {
        if self.rules.is_empty() {
            exn::bail!(ErrorKind::EmptyRules);
        }
        Ok(())
    }

    fn select(&self, tables: Vec<Table>) -> Vec<Table> {
        filter_tables_by_params(tables, self.rules)
    }

    fn nothing_selected(&self) -> ErrorKind {
        ErrorKind::NoTables(NO_TABLES_MATCHING_RULES)
    }
}
