use jds_core::ScalarKind;

use super::{non_key, Dialect, DialectKind, Probe};
use crate::connection::SqlValue;

/// SQLite: no procedures, temporal values stored as text/integers
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn type_name(&self, kind: ScalarKind, _max_len: usize) -> String {
        match kind {
            ScalarKind::Text
            | ScalarKind::Date
            | ScalarKind::DateTime
            | ScalarKind::ZonedDateTime
            | ScalarKind::Period
            | ScalarKind::YearMonth
            | ScalarKind::MonthDay => "TEXT",
            ScalarKind::Integer | ScalarKind::Enum => "INTEGER",
            ScalarKind::Long | ScalarKind::Time | ScalarKind::Duration => "BIGINT",
            ScalarKind::Float => "REAL",
            ScalarKind::Double => "DOUBLE",
            ScalarKind::Boolean => "BOOLEAN",
            ScalarKind::Blob => "BLOB",
        }
        .to_string()
    }

    fn add_column_sql(&self, table: &str, column: &str, type_name: &str) -> String {
        format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, type_name)
    }

    fn merge_sql(&self, table: &str, columns: &[String], keys: &[String], values: &[String]) -> String {
        on_conflict(table, columns, keys, values)
    }

    fn table_probe(&self, _catalog: Option<&str>, table: &str) -> Probe {
        Probe::new(
            "SELECT COUNT(name) FROM sqlite_master WHERE type = 'table' AND name = ?",
            vec![SqlValue::from(table)],
        )
    }

    fn column_probe(&self, _catalog: Option<&str>, table: &str, column: &str) -> Probe {
        Probe::new(
            "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?",
            vec![SqlValue::from(table), SqlValue::from(column)],
        )
    }

    fn view_probe(&self, _catalog: Option<&str>, view: &str) -> Probe {
        Probe::new(
            "SELECT COUNT(name) FROM sqlite_master WHERE type = 'view' AND name = ?",
            vec![SqlValue::from(view)],
        )
    }
}

/// `INSERT ... ON CONFLICT` shared by SQLite and PostgreSQL
pub(super) fn on_conflict(table: &str, columns: &[String], keys: &[String], values: &[String]) -> String {
    let updates = non_key(columns, keys);
    let action = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!(
            "DO UPDATE SET {}",
            updates
                .iter()
                .map(|c| format!("{c} = EXCLUDED.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        )
    };
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
        table,
        columns.join(", "),
        values.join(", "),
        keys.join(", "),
        action
    )
}
