//! Dialect adapters
//!
//! One adapter per target RDBMS. Adapters are stateless: they map value
//! kinds to native type names, render DDL/DML text for a table layout and
//! supply the catalog queries behind the existence probes. They never
//! touch a connection themselves; [`table_exists`] and friends run the
//! probe through a `SqlConnection` and collapse any failure to `false`.

mod mysql;
mod oracle;
mod postgres;
mod sqlite;
mod tsql;

use std::fmt;
use std::str::FromStr;

use jds_core::errors::{JdsError, JdsErrorKind};
use jds_core::ScalarKind;

use crate::connection::{SqlConnection, SqlValue};
use crate::schema::{ColumnType, TableDef};

pub use mysql::{MariaDb, MySql};
pub use oracle::Oracle;
pub use postgres::PostgreSql;
pub use sqlite::Sqlite;
pub use tsql::TransactSql;

/// Target database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DialectKind {
    Sqlite,
    PostgreSql,
    MySql,
    MariaDb,
    TransactSql,
    Oracle,
}

impl DialectKind {
    pub const ALL: [DialectKind; 6] = [
        DialectKind::Sqlite,
        DialectKind::PostgreSql,
        DialectKind::MySql,
        DialectKind::MariaDb,
        DialectKind::TransactSql,
        DialectKind::Oracle,
    ];

    /// Short lowercase name, also the DDL template subdirectory
    pub fn name(&self) -> &'static str {
        match self {
            DialectKind::Sqlite => "sqlite",
            DialectKind::PostgreSql => "postgresql",
            DialectKind::MySql => "mysql",
            DialectKind::MariaDb => "mariadb",
            DialectKind::TransactSql => "tsql",
            DialectKind::Oracle => "oracle",
        }
    }

    pub fn adapter(&self) -> &'static dyn Dialect {
        match self {
            DialectKind::Sqlite => &Sqlite,
            DialectKind::PostgreSql => &PostgreSql,
            DialectKind::MySql => &MySql,
            DialectKind::MariaDb => &MariaDb,
            DialectKind::TransactSql => &TransactSql,
            DialectKind::Oracle => &Oracle,
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DialectKind {
    type Err = JdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(DialectKind::Sqlite),
            "postgresql" | "postgres" | "pg" => Ok(DialectKind::PostgreSql),
            "mysql" => Ok(DialectKind::MySql),
            "mariadb" => Ok(DialectKind::MariaDb),
            "tsql" | "mssql" | "sqlserver" => Ok(DialectKind::TransactSql),
            "oracle" => Ok(DialectKind::Oracle),
            other => Err(JdsError::new(JdsErrorKind::InvalidInput)
                .with_op("parse_dialect")
                .with_message(format!("Unknown dialect '{}'", other))),
        }
    }
}

/// A catalog query whose first column of the first row is a count
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Probe {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Capability contract every adapter satisfies
pub trait Dialect: Send + Sync {
    fn kind(&self) -> DialectKind;

    /// Bind marker for the 1-based parameter `index`
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Native type for a value kind; `max_len` 0 means unbounded
    fn type_name(&self, kind: ScalarKind, max_len: usize) -> String;

    fn column_type(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::Uuid => self.type_name(ScalarKind::Text, crate::schema::UUID_LENGTH),
            ColumnType::BigInt => self.type_name(ScalarKind::Long, 0),
            ColumnType::Int => self.type_name(ScalarKind::Integer, 0),
            ColumnType::Bool => self.type_name(ScalarKind::Boolean, 0),
            ColumnType::Text(max_len) => self.type_name(ScalarKind::Text, *max_len),
            ColumnType::Timestamp => self.type_name(ScalarKind::DateTime, 0),
            ColumnType::Value(kind) => self.type_name(*kind, 0),
        }
    }

    /// Comma-separated bind markers `1..=count`
    fn placeholders(&self, count: usize) -> String {
        (1..=count)
            .map(|i| self.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn create_table_sql(&self, table: &TableDef) -> String {
        let mut lines: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                let not_null = if table.is_key(&c.name) { " NOT NULL" } else { "" };
                format!("    {} {}{}", c.name, self.column_type(&c.column_type), not_null)
            })
            .collect();
        if !table.key.is_empty() {
            lines.push(format!("    PRIMARY KEY ({})", table.key.join(", ")));
        }
        format!("CREATE TABLE {} (\n{}\n)", table.name, lines.join(",\n"))
    }

    fn add_column_sql(&self, table: &str, column: &str, type_name: &str) -> String {
        format!("ALTER TABLE {} ADD {} {}", table, column, type_name)
    }

    fn insert_sql(&self, table: &str, columns: &[String]) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            self.placeholders(columns.len())
        )
    }

    /// DELETE matching every column in `keys`
    fn delete_sql(&self, table: &str, keys: &[&str]) -> String {
        let predicate = keys
            .iter()
            .enumerate()
            .map(|(i, k)| format!("{} = {}", k, self.placeholder(i + 1)))
            .collect::<Vec<_>>()
            .join(" AND ");
        format!("DELETE FROM {} WHERE {}", table, predicate)
    }

    /// Insert-or-update keyed on `keys`, with bind markers as values
    fn upsert_sql(&self, table: &str, columns: &[String], keys: &[String]) -> String {
        let values: Vec<String> = (1..=columns.len()).map(|i| self.placeholder(i)).collect();
        self.merge_sql(table, columns, keys, &values)
    }

    /// Insert-or-update keyed on `keys` with arbitrary value expressions
    fn merge_sql(&self, table: &str, columns: &[String], keys: &[String], values: &[String]) -> String;

    fn supports_procedures(&self) -> bool {
        false
    }

    /// Procedure upserting one row of `table`
    fn upsert_procedure_sql(&self, _name: &str, _table: &TableDef) -> Option<String> {
        None
    }

    fn call_sql(&self, _name: &str, _arity: usize) -> Option<String> {
        None
    }

    fn table_probe(&self, catalog: Option<&str>, table: &str) -> Probe;

    fn column_probe(&self, catalog: Option<&str>, table: &str, column: &str) -> Probe;

    /// `None` when the engine has no procedures at all
    fn procedure_probe(&self, _catalog: Option<&str>, _name: &str) -> Option<Probe> {
        None
    }

    fn view_probe(&self, catalog: Option<&str>, view: &str) -> Probe;
}

/// Name of the upsert procedure backing `table`
pub fn procedure_name(table: &str) -> String {
    format!("proc_{}", table)
}

/// Columns of `columns` not in `keys`
pub(crate) fn non_key<'a>(columns: &'a [String], keys: &[String]) -> Vec<&'a String> {
    columns.iter().filter(|c| !keys.contains(c)).collect()
}

pub fn table_exists(conn: &mut dyn SqlConnection, table: &str) -> bool {
    let catalog = conn.catalog();
    let probe = conn.dialect().adapter().table_probe(catalog.as_deref(), table);
    run_probe(conn, "table", table, probe)
}

pub fn column_exists(conn: &mut dyn SqlConnection, table: &str, column: &str) -> bool {
    let catalog = conn.catalog();
    let probe = conn
        .dialect()
        .adapter()
        .column_probe(catalog.as_deref(), table, column);
    run_probe(conn, "column", column, probe)
}

pub fn procedure_exists(conn: &mut dyn SqlConnection, name: &str) -> bool {
    let catalog = conn.catalog();
    match conn
        .dialect()
        .adapter()
        .procedure_probe(catalog.as_deref(), name)
    {
        Some(probe) => run_probe(conn, "procedure", name, probe),
        None => false,
    }
}

pub fn view_exists(conn: &mut dyn SqlConnection, view: &str) -> bool {
    let catalog = conn.catalog();
    let probe = conn.dialect().adapter().view_probe(catalog.as_deref(), view);
    run_probe(conn, "view", view, probe)
}

// Driver errors mean "absent": schema setup re-creates rather than aborts.
fn run_probe(conn: &mut dyn SqlConnection, object: &str, name: &str, probe: Probe) -> bool {
    match conn.query(&probe.sql, &probe.params) {
        Ok(rows) => rows
            .first()
            .and_then(|row| row.first())
            .and_then(SqlValue::as_i64)
            .is_some_and(|count| count > 0),
        Err(err) => {
            tracing::warn!(
                object,
                name,
                err_code = JdsErrorKind::DriverProbe.code(),
                error = %err,
                "existence probe failed, treating as absent"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::schema::tables;

    #[test]
    fn test_parse_dialect_names() {
        for kind in DialectKind::ALL {
            assert_eq!(kind.name().parse::<DialectKind>().unwrap(), kind);
            assert_eq!(kind.adapter().kind(), kind);
        }
        assert_eq!("MSSQL".parse::<DialectKind>().unwrap(), DialectKind::TransactSql);
        assert_eq!(
            "db2".parse::<DialectKind>().unwrap_err().kind(),
            JdsErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_probes_see_created_objects() {
        let mut conn = db::open_in_memory().unwrap();
        assert!(!table_exists(&mut conn, "things"));

        conn.execute_script("CREATE TABLE things (a INTEGER); CREATE VIEW v_things AS SELECT a FROM things")
            .unwrap();

        assert!(table_exists(&mut conn, "things"));
        assert!(column_exists(&mut conn, "things", "a"));
        assert!(!column_exists(&mut conn, "things", "b"));
        assert!(view_exists(&mut conn, "v_things"));
        assert!(!procedure_exists(&mut conn, "anything"));
    }

    #[test]
    fn test_delete_sql_uses_dialect_markers() {
        let keys = ["uuid", "edit_version", "field_id"];
        assert_eq!(
            DialectKind::PostgreSql.adapter().delete_sql("t", &keys),
            "DELETE FROM t WHERE uuid = $1 AND edit_version = $2 AND field_id = $3"
        );
        assert_eq!(
            DialectKind::Oracle.adapter().delete_sql("t", &keys[..1]),
            "DELETE FROM t WHERE uuid = :1"
        );
    }

    #[test]
    fn test_create_table_marks_key_columns_not_null() {
        let sql = DialectKind::Sqlite
            .adapter()
            .create_table_sql(&tables::overview_table());
        assert!(sql.starts_with("CREATE TABLE jds_entity_overview ("));
        assert!(sql.contains("uuid TEXT NOT NULL"));
        assert!(sql.contains("parent_uuid TEXT,"));
        assert!(sql.contains("PRIMARY KEY (uuid, edit_version)"));
    }
}
