//! Table selection.
//!
//! Two ways to pick tables out of the engine's list: a comma-separated
//! pattern string with one global schema-only flag, or a list of
//! [`TableRule`]s that each carry their own flag. Both keep the engine's
//! ordering and never return the same `database.table` twice.

use crate::glob::Glob;
use chbackup_engine::Table;
use serde::{Deserialize, Serialize};

/// One entry of an agent's `backup_tables` list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRule {
    /// Glob matched against `database.table`. Empty means "every table".
    #[serde(rename = "name", default)]
    pub pattern: String,
    #[serde(default)]
    pub schema_only: bool,
}
impl TableRule {
    pub fn new(pattern: impl Into<String>, schema_only: bool) -> Self {
        Self {
            pattern: pattern.into(),
            schema_only,
        }
    }
}

/// Keep tables whose `database.table` matches any comma-separated glob in
/// `pattern`. An empty pattern keeps everything.
///
/// Whitespace around each glob is ignored, so `"sales.*, infra.logs"` reads
/// as two globs. A malformed glob matches nothing.
pub fn filter_tables_by_pattern(tables: Vec<Table>, pattern: &str) -> Vec<Table> {
    if pattern.is_empty() {
        return dedup(tables);
    }
    let globs: Vec<Glob> = pattern.split(',').map(str::trim).filter(|p| !p.is_empty()).filter_map(Glob::new).collect();
    let mut selected = Vec::new();
    for table in tables {
        let full_name = table.full_name();
        if globs.iter().any(|glob| glob.is_match(&full_name)) {
            add_table(&mut selected, table);
        }
    }
    selected
}

/// Keep tables matched by at least one rule, taking `schema_only` from the
/// first rule that matches.
///
/// A single rule with an empty pattern keeps every table and applies its
/// flag to all of them. In any longer list an empty pattern matches nothing.
/// Whitespace around a rule's pattern is ignored, as for
/// [`filter_tables_by_pattern()`].
pub fn filter_tables_by_params(tables: Vec<Table>, rules: &[TableRule]) -> Vec<Table> {
    if let [rule] = rules
        && rule.pattern.is_empty()
    {
        return dedup(tables)
            .into_iter()
            .map(|table| Table {
                schema_only: rule.schema_only,
                ..table
            })
            .collect();
    }
    let globs: Vec<(Option<Glob>, bool)> =
        rules.iter().map(|rule| (Glob::new(rule.pattern.trim()), rule.schema_only)).collect();
    let mut selected = Vec::new();
    for mut table in tables {
        let full_name = table.full_name();
        let matched = globs.iter().find_map(|(glob, schema_only)| {
            glob.as_ref().is_some_and(|glob| glob.is_match(&full_name)).then_some(*schema_only)
        });
        if let Some(schema_only) = matched {
            table.schema_only = schema_only;
            add_table(&mut selected, table);
        }
    }
    selected
}

fn dedup(tables: Vec<Table>) -> Vec<Table> {
    let mut selected = Vec::with_capacity(tables.len());
    for table in tables {
        add_table(&mut selected, table);
    }
    selected
}

/// First one wins.
fn add_table(selected: &mut Vec<Table>, table: Table) {
    if !selected.iter().any(|t| t.database == table.database && t.name == table.name) {
        selected.push(table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tables() -> Vec<Table> {
        vec![
            Table::new("sales", "orders", "MergeTree"),
            Table::new("sales", "customers", "ReplacingMergeTree"),
            Table::new("infra", "logs", "MergeTree"),
            Table::new("infra", "hosts", "Memory"),
        ]
    }

    fn names(tables: &[Table]) -> Vec<String> {
        tables.iter().map(Table::full_name).collect()
    }

    #[rstest]
    #[case("", &["sales.orders", "sales.customers", "infra.logs", "infra.hosts"])]
    #[case("sales.*", &["sales.orders", "sales.customers"])]
    #[case("*.logs", &["infra.logs"])]
    #[case("infra.logs,sales.orders", &["sales.orders", "infra.logs"])]
    #[case("sales.*, infra.logs", &["sales.orders", "sales.customers", "infra.logs"])]
    #[case("sales.*,sales.orders", &["sales.orders", "sales.customers"])]
    #[case("sales.[,infra.*", &["infra.logs", "infra.hosts"])]
    #[case("missing.*", &[])]
    #[case(",", &[])]
    #[case(" sales.orders ,\tinfra.logs", &["sales.orders", "infra.logs"])]
    #[case("  ,  ", &[])]
    fn test_filter_by_pattern(#[case] pattern: &str, #[case] expected: &[&str]) {
        assert_eq!(names(&filter_tables_by_pattern(tables(), pattern)), expected);
    }

    #[test]
    fn test_filter_by_pattern_is_idempotent() {
        let once = filter_tables_by_pattern(tables(), "sales.*,*.logs");
        let twice = filter_tables_by_pattern(once.clone(), "sales.*,*.logs");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filter_by_pattern_drops_duplicate_input() {
        let mut input = tables();
        input.push(Table::new("sales", "orders", "MergeTree"));
        assert_eq!(filter_tables_by_pattern(input.clone(), "sales.orders").len(), 1);
        assert_eq!(filter_tables_by_pattern(input, "").len(), 4);
    }

    #[test]
    fn test_filter_by_pattern_keeps_flags() {
        let mut input = tables();
        input[0].schema_only = true;
        let selected = filter_tables_by_pattern(input, "sales.orders");
        assert!(selected[0].schema_only);
    }

    #[test]
    fn test_filter_by_params_first_rule_wins() {
        let rules = [TableRule::new("sales.orders", true), TableRule::new("sales.*", false)];
        let selected = filter_tables_by_params(tables(), &rules);
        assert_eq!(names(&selected), ["sales.orders", "sales.customers"]);
        assert!(selected[0].schema_only);
        assert!(!selected[1].schema_only);
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_filter_by_params_single_empty_rule(#[case] schema_only: bool) {
        let selected = filter_tables_by_params(tables(), &[TableRule::new("", schema_only)]);
        assert_eq!(selected.len(), 4);
        assert!(selected.iter().all(|t| t.schema_only == schema_only));
    }

    #[test]
    fn test_filter_by_params_empty_rule_among_others() {
        let rules = [TableRule::new("", true), TableRule::new("infra.logs", false)];
        let selected = filter_tables_by_params(tables(), &rules);
        assert_eq!(names(&selected), ["infra.logs"]);
        assert!(!selected[0].schema_only);
    }

    #[test]
    fn test_filter_by_params_trims_patterns() {
        let rules = [TableRule::new(" sales.orders", true), TableRule::new("   ", false)];
        let selected = filter_tables_by_params(tables(), &rules);
        assert_eq!(names(&selected), ["sales.orders"]);
        assert!(selected[0].schema_only);
    }

    #[test]
    fn test_filter_by_params_no_rules() {
        assert!(filter_tables_by_params(tables(), &[]).is_empty());
    }

    #[test]
    fn test_rule_deserialize() {
        let rules: Vec<TableRule> =
            serde_json::from_str(r#"[{"name": "sales.*", "schema_only": true}, {"name": "infra.logs"}]"#).unwrap();
        assert_eq!(rules, [TableRule::new("sales.*", true), TableRule::new("infra.logs", false)]);
    }
}
