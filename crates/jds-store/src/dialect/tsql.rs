use jds_core::ScalarKind;

use super::{non_key, Dialect, DialectKind, Probe};
use crate::connection::SqlValue;
use crate::schema::TableDef;

/// SQL Server (Transact-SQL)
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactSql;

impl TransactSql {
    fn sysobject_probe(name: &str, xtype: &str) -> Probe {
        Probe::new(
            "SELECT COUNT(*) FROM sysobjects WHERE NAME = ? AND XTYPE = ?",
            vec![SqlValue::from(name), SqlValue::from(xtype)],
        )
    }
}

impl Dialect for TransactSql {
    fn kind(&self) -> DialectKind {
        DialectKind::TransactSql
    }

    fn type_name(&self, kind: ScalarKind, max_len: usize) -> String {
        match kind {
            ScalarKind::Text if max_len == 0 => "NVARCHAR(MAX)".to_string(),
            ScalarKind::Text => format!("NVARCHAR({})", max_len),
            ScalarKind::Integer | ScalarKind::Enum => "INTEGER".to_string(),
            ScalarKind::Long | ScalarKind::Duration => "BIGINT".to_string(),
            ScalarKind::Float => "REAL".to_string(),
            ScalarKind::Double => "FLOAT".to_string(),
            ScalarKind::Boolean => "BIT".to_string(),
            ScalarKind::Blob => "VARBINARY(MAX)".to_string(),
            ScalarKind::Date => "DATE".to_string(),
            ScalarKind::DateTime => "DATETIME2(7)".to_string(),
            ScalarKind::ZonedDateTime => "DATETIMEOFFSET(7)".to_string(),
            ScalarKind::Time => "TIME(7)".to_string(),
            ScalarKind::Period | ScalarKind::YearMonth | ScalarKind::MonthDay => {
                "NVARCHAR(32)".to_string()
            }
        }
    }

    fn merge_sql(&self, table: &str, columns: &[String], keys: &[String], values: &[String]) -> String {
        let on = keys
            .iter()
            .map(|k| format!("dest.{k} = src.{k}"))
            .collect::<Vec<_>>()
            .join(" AND ");
        let updates = non_key(columns, keys);
        let matched = if updates.is_empty() {
            String::new()
        } else {
            format!(
                " WHEN MATCHED THEN UPDATE SET {}",
                updates
                    .iter()
                    .map(|c| format!("dest.{c} = src.{c}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        format!(
            "MERGE {table} AS dest USING (VALUES ({})) AS src ({}) ON {on}{matched} \
             WHEN NOT MATCHED THEN INSERT ({}) VALUES ({});",
            values.join(", "),
            columns.join(", "),
            columns.join(", "),
            columns
                .iter()
                .map(|c| format!("src.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    fn supports_procedures(&self) -> bool {
        true
    }

    fn upsert_procedure_sql(&self, name: &str, table: &TableDef) -> Option<String> {
        let columns = table.column_names();
        let params: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("@{} {}", c.name, self.column_type(&c.column_type)))
            .collect();
        let values: Vec<String> = columns.iter().map(|c| format!("@{}", c)).collect();
        Some(format!(
            "CREATE PROCEDURE {} {}\nAS\nBEGIN\n    {}\nEND",
            name,
            params.join(", "),
            self.merge_sql(&table.name, &columns, &table.key, &values)
        ))
    }

    fn call_sql(&self, name: &str, arity: usize) -> Option<String> {
        Some(format!("EXEC {} {}", name, self.placeholders(arity)))
    }

    fn table_probe(&self, catalog: Option<&str>, table: &str) -> Probe {
        Probe::new(
            "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_CATALOG = ? AND TABLE_NAME = ?",
            vec![SqlValue::from(catalog.map(str::to_string)), SqlValue::from(table)],
        )
    }

    fn column_probe(&self, catalog: Option<&str>, table: &str, column: &str) -> Probe {
        Probe::new(
            "SELECT COUNT(COLUMN_NAME) FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_CATALOG = ? AND TABLE_NAME = ? AND COLUMN_NAME = ?",
            vec![
                SqlValue::from(catalog.map(str::to_string)),
                SqlValue::from(table),
                SqlValue::from(column),
            ],
        )
    }

    fn procedure_probe(&self, _catalog: Option<&str>, name: &str) -> Option<Probe> {
        Some(Self::sysobject_probe(name, "P"))
    }

    fn view_probe(&self, _catalog: Option<&str>, view: &str) -> Probe {
        Self::sysobject_probe(view, "V")
    }
}
