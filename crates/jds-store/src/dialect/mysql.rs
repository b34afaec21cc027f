use jds_core::ScalarKind;

use super::{non_key, Dialect, DialectKind, Probe};
use crate::connection::SqlValue;
use crate::schema::TableDef;

/// MySQL 8.0.19+ (row alias upserts)
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

/// MariaDB keeps the `VALUES(col)` upsert form MySQL deprecated
#[derive(Debug, Clone, Copy, Default)]
pub struct MariaDb;

fn type_name(kind: ScalarKind, max_len: usize) -> String {
    match kind {
        ScalarKind::Text if max_len == 0 => "TEXT".to_string(),
        ScalarKind::Text => format!("VARCHAR({})", max_len),
        ScalarKind::Integer | ScalarKind::Enum => "INT".to_string(),
        ScalarKind::Long | ScalarKind::Duration => "BIGINT".to_string(),
        ScalarKind::Float => "FLOAT".to_string(),
        ScalarKind::Double => "DOUBLE".to_string(),
        ScalarKind::Boolean => "BOOLEAN".to_string(),
        ScalarKind::Blob => "LONGBLOB".to_string(),
        ScalarKind::Date => "DATE".to_string(),
        ScalarKind::DateTime => "DATETIME(6)".to_string(),
        ScalarKind::ZonedDateTime => "VARCHAR(40)".to_string(),
        ScalarKind::Time => "TIME(6)".to_string(),
        ScalarKind::Period | ScalarKind::YearMonth | ScalarKind::MonthDay => {
            "VARCHAR(32)".to_string()
        }
    }
}

fn insert_head(table: &str, columns: &[String], values: &[String], ignore: bool) -> String {
    format!(
        "INSERT {}INTO {} ({}) VALUES ({})",
        if ignore { "IGNORE " } else { "" },
        table,
        columns.join(", "),
        values.join(", ")
    )
}

fn procedure_sql(dialect: &dyn Dialect, name: &str, table: &TableDef) -> String {
    let columns = table.column_names();
    let params: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("IN p_{} {}", c.name, dialect.column_type(&c.column_type)))
        .collect();
    let values: Vec<String> = columns.iter().map(|c| format!("p_{}", c)).collect();
    format!(
        "CREATE PROCEDURE {}({})\nBEGIN\n    {};\nEND",
        name,
        params.join(", "),
        dialect.merge_sql(&table.name, &columns, &table.key, &values)
    )
}

fn table_probe(catalog: Option<&str>, table: &str) -> Probe {
    Probe::new(
        "SELECT COUNT(table_schema) FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_NAME = ? AND TABLE_SCHEMA = ?",
        vec![SqlValue::from(table), SqlValue::from(catalog.map(str::to_string))],
    )
}

fn column_probe(catalog: Option<&str>, table: &str, column: &str) -> Probe {
    Probe::new(
        "SELECT COUNT(COLUMN_NAME) FROM INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND COLUMN_NAME = ?",
        vec![
            SqlValue::from(catalog.map(str::to_string)),
            SqlValue::from(table),
            SqlValue::from(column),
        ],
    )
}

fn procedure_probe(catalog: Option<&str>, name: &str) -> Probe {
    Probe::new(
        "SELECT COUNT(ROUTINE_NAME) FROM INFORMATION_SCHEMA.ROUTINES \
         WHERE ROUTINE_TYPE = 'PROCEDURE' AND ROUTINE_NAME = ? AND ROUTINE_SCHEMA = ?",
        vec![SqlValue::from(name), SqlValue::from(catalog.map(str::to_string))],
    )
}

fn view_probe(catalog: Option<&str>, view: &str) -> Probe {
    Probe::new(
        "SELECT COUNT(TABLE_NAME) FROM INFORMATION_SCHEMA.VIEWS WHERE TABLE_NAME = ? AND TABLE_SCHEMA = ?",
        vec![SqlValue::from(view), SqlValue::from(catalog.map(str::to_string))],
    )
}

impl Dialect for MySql {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn type_name(&self, kind: ScalarKind, max_len: usize) -> String {
        type_name(kind, max_len)
    }

    fn merge_sql(&self, table: &str, columns: &[String], keys: &[String], values: &[String]) -> String {
        let updates = non_key(columns, keys);
        if updates.is_empty() {
            return insert_head(table, columns, values, true);
        }
        format!(
            "{} AS new ON DUPLICATE KEY UPDATE {}",
            insert_head(table, columns, values, false),
            updates
                .iter()
                .map(|c| format!("{c} = new.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    fn supports_procedures(&self) -> bool {
        true
    }

    fn upsert_procedure_sql(&self, name: &str, table: &TableDef) -> Option<String> {
        Some(procedure_sql(self, name, table))
    }

    fn call_sql(&self, name: &str, arity: usize) -> Option<String> {
        Some(format!("CALL {}({})", name, self.placeholders(arity)))
    }

    fn table_probe(&self, catalog: Option<&str>, table: &str) -> Probe {
        table_probe(catalog, table)
    }

    fn column_probe(&self, catalog: Option<&str>, table: &str, column: &str) -> Probe {
        column_probe(catalog, table, column)
    }

    fn procedure_probe(&self, catalog: Option<&str>, name: &str) -> Option<Probe> {
        Some(procedure_probe(catalog, name))
    }

    fn view_probe(&self, catalog: Option<&str>, view: &str) -> Probe {
        view_probe(catalog, view)
    }
}

impl Dialect for MariaDb {
    fn kind(&self) -> DialectKind {
        DialectKind::MariaDb
    }

    fn type_name(&self, kind: ScalarKind, max_len: usize) -> String {
        type_name(kind, max_len)
    }

    fn merge_sql(&self, table: &str, columns: &[String], keys: &[String], values: &[String]) -> String {
        let updates = non_key(columns, keys);
        if updates.is_empty() {
            return insert_head(table, columns, values, true);
        }
        format!(
            "{} ON DUPLICATE KEY UPDATE {}",
            insert_head(table, columns, values, false),
            updates
                .iter()
                .map(|c| format!("{c} = VALUES({c})"))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    fn supports_procedures(&self) -> bool {
        true
    }

    fn upsert_procedure_sql(&self, name: &str, table: &TableDef) -> Option<String> {
        Some(procedure_sql(self, name, table))
    }

    fn call_sql(&self, name: &str, arity: usize) -> Option<String> {
        Some(format!("CALL {}({})", name, self.placeholders(arity)))
    }

    fn table_probe(&self, catalog: Option<&str>, table: &str) -> Probe {
        table_probe(catalog, table)
    }

    fn column_probe(&self, catalog: Option<&str>, table: &str, column: &str) -> Probe {
        column_probe(catalog, table, column)
    }

    fn procedure_probe(&self, catalog: Option<&str>, name: &str) -> Option<Probe> {
        Some(procedure_probe(catalog, name))
    }

    fn view_probe(&self, catalog: Option<&str>, view: &str) -> Probe {
        view_probe(catalog, view)
    }
}
