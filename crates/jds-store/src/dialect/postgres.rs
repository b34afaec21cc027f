use jds_core::ScalarKind;

use super::sqlite::on_conflict;
use super::{Dialect, DialectKind, Probe};
use crate::connection::SqlValue;
use crate::schema::TableDef;

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgreSql;

impl Dialect for PostgreSql {
    fn kind(&self) -> DialectKind {
        DialectKind::PostgreSql
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn type_name(&self, kind: ScalarKind, max_len: usize) -> String {
        match kind {
            ScalarKind::Text if max_len == 0 => "TEXT".to_string(),
            ScalarKind::Text => format!("VARCHAR({})", max_len),
            ScalarKind::Integer | ScalarKind::Enum => "INTEGER".to_string(),
            ScalarKind::Long | ScalarKind::Duration => "BIGINT".to_string(),
            ScalarKind::Float => "REAL".to_string(),
            ScalarKind::Double => "FLOAT".to_string(),
            ScalarKind::Boolean => "BOOLEAN".to_string(),
            ScalarKind::Blob => "BYTEA".to_string(),
            ScalarKind::Date => "DATE".to_string(),
            ScalarKind::DateTime => "TIMESTAMP".to_string(),
            ScalarKind::ZonedDateTime => "TIMESTAMP WITH TIME ZONE".to_string(),
            ScalarKind::Time => "TIME WITHOUT TIME ZONE".to_string(),
            ScalarKind::Period | ScalarKind::YearMonth | ScalarKind::MonthDay => {
                "VARCHAR(32)".to_string()
            }
        }
    }

    fn add_column_sql(&self, table: &str, column: &str, type_name: &str) -> String {
        format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, type_name)
    }

    fn merge_sql(&self, table: &str, columns: &[String], keys: &[String], values: &[String]) -> String {
        on_conflict(table, columns, keys, values)
    }

    fn supports_procedures(&self) -> bool {
        true
    }

    fn upsert_procedure_sql(&self, name: &str, table: &TableDef) -> Option<String> {
        let columns = table.column_names();
        let params: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("p_{} {}", c.name, self.column_type(&c.column_type)))
            .collect();
        let values: Vec<String> = columns.iter().map(|c| format!("p_{}", c)).collect();
        Some(format!(
            "CREATE OR REPLACE PROCEDURE {}({})\nLANGUAGE plpgsql AS $$\nBEGIN\n    {};\nEND $$",
            name,
            params.join(", "),
            self.merge_sql(&table.name, &columns, &table.key, &values)
        ))
    }

    fn call_sql(&self, name: &str, arity: usize) -> Option<String> {
        Some(format!("CALL {}({})", name, self.placeholders(arity)))
    }

    fn table_probe(&self, catalog: Option<&str>, table: &str) -> Probe {
        Probe::new(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_catalog = $1 AND table_name = $2",
            vec![SqlValue::from(catalog.map(str::to_string)), SqlValue::from(table)],
        )
    }

    fn column_probe(&self, catalog: Option<&str>, table: &str, column: &str) -> Probe {
        Probe::new(
            "SELECT COUNT(*) FROM information_schema.columns \
             WHERE table_catalog = $1 AND table_name = $2 AND column_name = $3",
            vec![
                SqlValue::from(catalog.map(str::to_string)),
                SqlValue::from(table),
                SqlValue::from(column),
            ],
        )
    }

    fn procedure_probe(&self, catalog: Option<&str>, name: &str) -> Option<Probe> {
        Some(Probe::new(
            "SELECT COUNT(*) FROM information_schema.routines WHERE routine_catalog = $1 AND routine_name = $2",
            vec![SqlValue::from(catalog.map(str::to_string)), SqlValue::from(name)],
        ))
    }

    fn view_probe(&self, catalog: Option<&str>, view: &str) -> Probe {
        Probe::new(
            "SELECT COUNT(*) FROM information_schema.views WHERE table_catalog = $1 AND table_name = $2",
            vec![SqlValue::from(catalog.map(str::to_string)), SqlValue::from(view)],
        )
    }
}
