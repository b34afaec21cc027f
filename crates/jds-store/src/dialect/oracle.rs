use jds_core::ScalarKind;

use super::{non_key, Dialect, DialectKind, Probe};
use crate::connection::SqlValue;
use crate::schema::TableDef;

/// Oracle: upper-case catalog names, `:n` markers, MERGE from DUAL
#[derive(Debug, Clone, Copy, Default)]
pub struct Oracle;

impl Oracle {
    fn object_probe(name: &str, object_type: &str) -> Probe {
        Probe::new(
            "SELECT COUNT(*) FROM all_objects WHERE object_type = :1 AND object_name = :2",
            vec![SqlValue::from(object_type), SqlValue::from(name.to_uppercase())],
        )
    }
}

// Procedure parameters take unsized types
fn strip_length(type_name: &str) -> &str {
    type_name.split('(').next().unwrap_or(type_name).trim()
}

impl Dialect for Oracle {
    fn kind(&self) -> DialectKind {
        DialectKind::Oracle
    }

    fn placeholder(&self, index: usize) -> String {
        format!(":{}", index)
    }

    fn type_name(&self, kind: ScalarKind, max_len: usize) -> String {
        match kind {
            ScalarKind::Text if max_len == 0 => "NCLOB".to_string(),
            ScalarKind::Text => format!("NVARCHAR2({})", max_len),
            ScalarKind::Integer | ScalarKind::Enum => "NUMBER(10)".to_string(),
            ScalarKind::Long | ScalarKind::Duration | ScalarKind::Time => "NUMBER(19)".to_string(),
            ScalarKind::Float => "BINARY_FLOAT".to_string(),
            ScalarKind::Double => "BINARY_DOUBLE".to_string(),
            ScalarKind::Boolean => "NUMBER(1)".to_string(),
            ScalarKind::Blob => "BLOB".to_string(),
            ScalarKind::Date => "DATE".to_string(),
            ScalarKind::DateTime => "TIMESTAMP".to_string(),
            ScalarKind::ZonedDateTime => "TIMESTAMP WITH TIME ZONE".to_string(),
            ScalarKind::Period | ScalarKind::YearMonth | ScalarKind::MonthDay => {
                "NVARCHAR2(32)".to_string()
            }
        }
    }

    fn add_column_sql(&self, table: &str, column: &str, type_name: &str) -> String {
        format!("ALTER TABLE {} ADD ({} {})", table, column, type_name)
    }

    fn merge_sql(&self, table: &str, columns: &[String], keys: &[String], values: &[String]) -> String {
        let selected = columns
            .iter()
            .zip(values)
            .map(|(c, v)| format!("{v} AS {c}"))
            .collect::<Vec<_>>()
            .join(", ");
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
            "MERGE INTO {table} dest USING (SELECT {selected} FROM DUAL) src ON ({on}){matched} \
             WHEN NOT MATCHED THEN INSERT ({}) VALUES ({})",
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
            .map(|c| {
                format!(
                    "p_{} IN {}",
                    c.name,
                    strip_length(&self.column_type(&c.column_type))
                )
            })
            .collect();
        let values: Vec<String> = columns.iter().map(|c| format!("p_{}", c)).collect();
        Some(format!(
            "CREATE OR REPLACE PROCEDURE {}({})\nAS\nBEGIN\n    {};\nEND;",
            name,
            params.join(", "),
            self.merge_sql(&table.name, &columns, &table.key, &values)
        ))
    }

    fn call_sql(&self, name: &str, arity: usize) -> Option<String> {
        Some(format!("CALL {}({})", name, self.placeholders(arity)))
    }

    fn table_probe(&self, _catalog: Option<&str>, table: &str) -> Probe {
        Self::object_probe(table, "TABLE")
    }

    fn column_probe(&self, _catalog: Option<&str>, table: &str, column: &str) -> Probe {
        Probe::new(
            "SELECT COUNT(COLUMN_NAME) FROM ALL_TAB_COLUMNS WHERE TABLE_NAME = :1 AND COLUMN_NAME = :2",
            vec![
                SqlValue::from(table.to_uppercase()),
                SqlValue::from(column.to_uppercase()),
            ],
        )
    }

    fn procedure_probe(&self, _catalog: Option<&str>, name: &str) -> Option<Probe> {
        Some(Self::object_probe(name, "PROCEDURE"))
    }

    fn view_probe(&self, _catalog: Option<&str>, view: &str) -> Probe {
        Self::object_probe(view, "VIEW")
    }
}
