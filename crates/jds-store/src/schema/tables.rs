//! Persisted table layouts
//!
//! Names and key layouts here are the on-disk contract shared by the
//! installer, the save engine and the load engine.

use jds_core::ScalarKind;

pub const OVERVIEW_TABLE: &str = "jds_entity_overview";
pub const INSTANCE_TABLE: &str = "jds_entity_instance";
pub const BINDING_TABLE: &str = "jds_entity_binding";
pub const SCHEMA_LOG_TABLE: &str = "jds_schema_log";

pub const REF_ENTITY_TABLE: &str = "jds_ref_entity";
pub const REF_FIELD_TABLE: &str = "jds_ref_field";
pub const REF_FIELD_TYPE_TABLE: &str = "jds_ref_field_type";
pub const REF_ENUM_TABLE: &str = "jds_ref_enum";
pub const REF_ENTITY_FIELD_TABLE: &str = "jds_ref_entity_field";
pub const REF_INHERITANCE_TABLE: &str = "jds_ref_entity_inheritance";

/// Width of instance uuid columns
pub const UUID_LENGTH: usize = 96;
const NAME_LENGTH: usize = 256;

/// Abstract column type, mapped to a native name by the dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    /// Type and field ids
    BigInt,
    /// Edit versions, sequence numbers, codes
    Int,
    Bool,
    Text(usize),
    Timestamp,
    Value(ScalarKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Uniqueness key, in order
    pub key: Vec<String>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            key: Vec::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            column_type,
        });
        self
    }

    pub fn key(mut self, key: &[&str]) -> Self {
        self.key = key.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn is_key(&self, column: &str) -> bool {
        self.key.iter().any(|k| k == column)
    }
}

pub fn value_table(kind: ScalarKind) -> String {
    format!("jds_store_{}", kind.stem())
}

pub fn collection_table(kind: ScalarKind) -> String {
    format!("jds_store_{}_collection", kind.stem())
}

pub fn overview_table() -> TableDef {
    TableDef::new(OVERVIEW_TABLE)
        .column("uuid", ColumnType::Uuid)
        .column("edit_version", ColumnType::Int)
        .column("entity_id", ColumnType::BigInt)
        .column("parent_uuid", ColumnType::Uuid)
        .column("date_created", ColumnType::Timestamp)
        .column("date_modified", ColumnType::Timestamp)
        .key(&["uuid", "edit_version"])
}

/// One row per type in an instance's ancestry chain
pub fn instance_table() -> TableDef {
    TableDef::new(INSTANCE_TABLE)
        .column("uuid", ColumnType::Uuid)
        .column("entity_id", ColumnType::BigInt)
        .key(&["uuid", "entity_id"])
}

pub fn binding_table() -> TableDef {
    TableDef::new(BINDING_TABLE)
        .column("parent_uuid", ColumnType::Uuid)
        .column("parent_edit_version", ColumnType::Int)
        .column("field_id", ColumnType::BigInt)
        .column("sequence", ColumnType::Int)
        .column("child_uuid", ColumnType::Uuid)
        .column("child_edit_version", ColumnType::Int)
        .key(&["parent_uuid", "parent_edit_version", "field_id", "sequence"])
}

pub fn value_table_def(kind: ScalarKind) -> TableDef {
    TableDef::new(value_table(kind))
        .column("uuid", ColumnType::Uuid)
        .column("edit_version", ColumnType::Int)
        .column("field_id", ColumnType::BigInt)
        .column("value", ColumnType::Value(kind))
        .key(&["uuid", "edit_version", "field_id"])
}

pub fn collection_table_def(kind: ScalarKind) -> TableDef {
    TableDef::new(collection_table(kind))
        .column("uuid", ColumnType::Uuid)
        .column("edit_version", ColumnType::Int)
        .column("field_id", ColumnType::BigInt)
        .column("sequence", ColumnType::Int)
        .column("value", ColumnType::Value(kind))
        .key(&["uuid", "edit_version", "field_id", "sequence"])
}

pub fn schema_log_table() -> TableDef {
    TableDef::new(SCHEMA_LOG_TABLE)
        .column("template_name", ColumnType::Text(NAME_LENGTH))
        .column("checksum", ColumnType::Text(64))
        .column("applied_at", ColumnType::Timestamp)
        .key(&["template_name"])
}

pub fn reference_tables() -> Vec<TableDef> {
    vec![
        TableDef::new(REF_ENTITY_TABLE)
            .column("entity_id", ColumnType::BigInt)
            .column("name", ColumnType::Text(NAME_LENGTH))
            .column("version", ColumnType::Int)
            .key(&["entity_id"]),
        TableDef::new(REF_FIELD_TABLE)
            .column("field_id", ColumnType::BigInt)
            .column("name", ColumnType::Text(NAME_LENGTH))
            .column("description", ColumnType::Text(0))
            .column("kind_code", ColumnType::Int)
            .key(&["field_id"]),
        TableDef::new(REF_FIELD_TYPE_TABLE)
            .column("kind_code", ColumnType::Int)
            .column("name", ColumnType::Text(64))
            .key(&["kind_code"]),
        TableDef::new(REF_ENUM_TABLE)
            .column("field_id", ColumnType::BigInt)
            .column("ordinal", ColumnType::Int)
            .column("name", ColumnType::Text(NAME_LENGTH))
            .key(&["field_id", "ordinal"]),
        TableDef::new(REF_ENTITY_FIELD_TABLE)
            .column("entity_id", ColumnType::BigInt)
            .column("field_id", ColumnType::BigInt)
            .key(&["entity_id", "field_id"]),
        TableDef::new(REF_INHERITANCE_TABLE)
            .column("parent_id", ColumnType::BigInt)
            .column("child_id", ColumnType::BigInt)
            .key(&["parent_id", "child_id"]),
    ]
}

/// Every engine table, in creation order
pub fn core_tables() -> Vec<TableDef> {
    let mut tables = vec![overview_table(), instance_table(), binding_table()];
    for kind in ScalarKind::ALL {
        tables.push(value_table_def(kind));
        tables.push(collection_table_def(kind));
    }
    tables.extend(reference_tables());
    tables.push(schema_log_table());
    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_table_names_are_unique() {
        let tables = core_tables();
        let mut names: Vec<_> = tables.iter().map(|t| t.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), tables.len());
        assert_eq!(tables.len(), 3 + 32 + 6 + 1);
    }

    #[test]
    fn test_every_key_column_exists() {
        for table in core_tables() {
            for key in &table.key {
                assert!(
                    table.columns.iter().any(|c| &c.name == key),
                    "{} key {} missing",
                    table.name,
                    key
                );
            }
        }
    }

    #[test]
    fn test_value_table_names() {
        assert_eq!(value_table(ScalarKind::DateTime), "jds_store_date_time");
        assert_eq!(collection_table(ScalarKind::Enum), "jds_store_enum_collection");
    }
}
