//! Schema compiler
//!
//! Pure function of registry metadata and a dialect: emits DDL text and
//! reporting-table layouts, never touches a connection.

use std::collections::{BTreeMap, BTreeSet};

use jds_core::{Entity, MetadataRegistry, Scalar, ScalarKind, Value, ValueKind};

use super::tables::{self, ColumnType, TableDef};
use crate::codec;
use crate::connection::{ConnectionSlot, Row, SqlValue};
use crate::dialect::{procedure_name, Dialect};
use crate::errors::Result;

/// A flat, one-row-per-instance reporting table
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub name: String,
    /// Instances of these types (or their subtypes) are reported
    pub entity_types: Vec<u64>,
    /// Restrict to these field ids; all reportable fields when `None`
    pub fields: Option<Vec<u64>>,
    pub slot: ConnectionSlot,
}

impl ReportTable {
    pub fn new(name: impl Into<String>, entity_types: &[u64]) -> Self {
        Self {
            name: name.into(),
            entity_types: entity_types.to_vec(),
            fields: None,
            slot: ConnectionSlot::Default,
        }
    }

    pub fn with_fields(mut self, fields: &[u64]) -> Self {
        self.fields = Some(fields.to_vec());
        self
    }

    /// Write rows through an auxiliary connection
    pub fn on_slot(mut self, slot: u32) -> Self {
        self.slot = ConnectionSlot::Aux(slot);
        self
    }
}

/// Where a reporting column takes its value from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSource {
    Uuid,
    EditVersion,
    EntityId,
    ParentUuid,
    Field(u64),
    /// 1 when the enum collection contains the ordinal
    EnumFlag { field_id: u64, ordinal: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportColumn {
    pub name: String,
    pub source: ReportSource,
}

/// A reporting table resolved against the registry for one dialect
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledReport {
    pub table: TableDef,
    /// Parallel to `table.columns`
    pub columns: Vec<ReportColumn>,
    pub entity_types: Vec<u64>,
    pub slot: ConnectionSlot,
    pub upsert_sql: String,
}

impl CompiledReport {
    pub fn matches(&self, entity: &Entity) -> bool {
        self.entity_types.iter().any(|t| entity.is_a(*t))
    }

    /// Parameter row for the upsert; unset fields bind as NULL
    ///
    /// # Errors
    ///
    /// `Serialization` if a value cannot be encoded.
    pub fn row(&self, entity: &Entity) -> Result<Row> {
        let overview = entity.overview();
        self.columns
            .iter()
            .map(|column| {
                Ok(match column.source {
                    ReportSource::Uuid => SqlValue::from(overview.uuid.as_str()),
                    ReportSource::EditVersion => SqlValue::from(overview.edit_version),
                    ReportSource::EntityId => SqlValue::Integer(overview.type_id as i64),
                    ReportSource::ParentUuid => SqlValue::from(overview.parent_uuid.clone()),
                    ReportSource::Field(field_id) => match entity.scalar(field_id) {
                        Some(scalar) => codec::encode(scalar)?,
                        None => SqlValue::Null,
                    },
                    ReportSource::EnumFlag { field_id, ordinal } => {
                        let present = matches!(
                            entity.value(field_id),
                            Some(Value::Collection(_, items)) if items.contains(&Scalar::Enum(ordinal))
                        );
                        SqlValue::Integer(i64::from(present))
                    }
                })
            })
            .collect()
    }
}

/// Lowercase identifier safe for every dialect
pub fn column_name(field_name: &str) -> String {
    field_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// `(table name, CREATE TABLE text)` for every engine table
pub fn core_tables_ddl(dialect: &dyn Dialect) -> Vec<(String, String)> {
    tables::core_tables()
        .iter()
        .map(|t| (t.name.clone(), dialect.create_table_sql(t)))
        .collect()
}

/// Tables whose upserts can go through stored procedures
pub fn procedure_tables() -> Vec<TableDef> {
    let mut defs = vec![tables::overview_table()];
    defs.extend(ScalarKind::ALL.into_iter().map(tables::value_table_def));
    defs
}

/// `(procedure name, CREATE PROCEDURE text)`; empty for engines without procedures
pub fn procedures_ddl(dialect: &dyn Dialect) -> Vec<(String, String)> {
    procedure_tables()
        .iter()
        .filter_map(|t| {
            let name = procedure_name(&t.name);
            dialect.upsert_procedure_sql(&name, t).map(|sql| (name, sql))
        })
        .collect()
}

pub struct SchemaCompiler<'a> {
    registry: &'a MetadataRegistry,
    dialect: &'a dyn Dialect,
}

impl<'a> SchemaCompiler<'a> {
    pub fn new(registry: &'a MetadataRegistry, dialect: &'a dyn Dialect) -> Self {
        Self { registry, dialect }
    }

    pub fn dialect(&self) -> &'a dyn Dialect {
        self.dialect
    }

    /// Resolve a reporting table's columns
    ///
    /// Fixed columns come first, then fields sorted by column name. Blob,
    /// nested and scalar-collection fields are not reportable; enum
    /// collections expand to one flag column per enum value.
    ///
    /// # Errors
    ///
    /// `UnknownType` if a listed entity type is not registered.
    pub fn report_table(&self, report: &ReportTable) -> Result<CompiledReport> {
        let mut fields = BTreeMap::new();
        for type_id in &report.entity_types {
            self.registry.type_descriptor(*type_id)?;
            for subtype in self.registry.subtypes_of(*type_id) {
                let descriptor = self.registry.type_descriptor(subtype)?;
                for field in descriptor.fields() {
                    fields.entry(field.id).or_insert_with(|| field.clone());
                }
            }
        }
        if let Some(subset) = &report.fields {
            let wanted: BTreeSet<u64> = subset.iter().copied().collect();
            fields.retain(|id, _| wanted.contains(id));
        }

        let mut field_columns: Vec<(ReportColumn, ColumnType)> = Vec::new();
        for field in fields.values() {
            match field.kind {
                ValueKind::Scalar(ScalarKind::Blob) => {}
                ValueKind::Scalar(kind) => field_columns.push((
                    ReportColumn {
                        name: column_name(&field.name),
                        source: ReportSource::Field(field.id),
                    },
                    ColumnType::Value(kind),
                )),
                ValueKind::Collection(ScalarKind::Enum) => {
                    for ordinal in 0..field.enum_values.len() as u32 {
                        field_columns.push((
                            ReportColumn {
                                name: format!("{}_{}", column_name(&field.name), ordinal),
                                source: ReportSource::EnumFlag {
                                    field_id: field.id,
                                    ordinal,
                                },
                            },
                            ColumnType::Bool,
                        ));
                    }
                }
                ValueKind::Collection(_) | ValueKind::Entity | ValueKind::EntityCollection => {}
            }
        }
        field_columns.sort_by(|a, b| a.0.name.cmp(&b.0.name));

        let mut table = TableDef::new(report.name.clone())
            .column("uuid", ColumnType::Uuid)
            .column("edit_version", ColumnType::Int)
            .column("entity_id", ColumnType::BigInt)
            .column("parent_uuid", ColumnType::Uuid)
            .key(&["uuid"]);
        let mut columns = vec![
            ReportColumn {
                name: "uuid".to_string(),
                source: ReportSource::Uuid,
            },
            ReportColumn {
                name: "edit_version".to_string(),
                source: ReportSource::EditVersion,
            },
            ReportColumn {
                name: "entity_id".to_string(),
                source: ReportSource::EntityId,
            },
            ReportColumn {
                name: "parent_uuid".to_string(),
                source: ReportSource::ParentUuid,
            },
        ];
        let mut seen: BTreeSet<String> = columns.iter().map(|c| c.name.clone()).collect();
        for (mut column, column_type) in field_columns {
            if !seen.insert(column.name.clone()) {
                // Two fields share a name; the id keeps them apart
                let field_id = match column.source {
                    ReportSource::Field(id) | ReportSource::EnumFlag { field_id: id, .. } => id,
                    _ => 0,
                };
                column.name = format!("{}_{}", column.name, field_id);
                seen.insert(column.name.clone());
            }
            table = table.column(column.name.clone(), column_type);
            columns.push(column);
        }

        let upsert_sql = self
            .dialect
            .upsert_sql(&table.name, &table.column_names(), &table.key);
        tracing::debug!(
            table = %table.name,
            columns = columns.len(),
            dialect = %self.dialect.kind(),
            "compiled reporting table"
        );
        Ok(CompiledReport {
            table,
            columns,
            entity_types: report.entity_types.clone(),
            slot: report.slot,
            upsert_sql,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;
    use jds_core::kinds::{Blob, CollectionOf, Enum, Integer, Nested, Text};
    use jds_core::{persisted_enum, EntityDecl, Field};

    persisted_enum! {
        pub enum Channel { Email, Phone, Post }
    }

    const NAME: Field<Text> = Field::new(1, "Full Name");
    const AGE: Field<Integer> = Field::new(2, "age");
    const PHOTO: Field<Blob> = Field::new(3, "photo");
    const CHANNELS: Field<CollectionOf<Enum<Channel>>> = Field::new(4, "channels");
    const TAGS: Field<CollectionOf<Text>> = Field::new(5, "tags");
    const SPOUSE: Field<Nested> = Field::new(6, "spouse");

    fn registry() -> MetadataRegistry {
        let mut registry = MetadataRegistry::new();
        registry
            .register_type(
                EntityDecl::new(1, "Person")
                    .field(&NAME)
                    .field(&PHOTO)
                    .field(&CHANNELS)
                    .field(&TAGS)
                    .field(&SPOUSE),
            )
            .unwrap();
        registry
            .register_type(EntityDecl::new(2, "Employee").parent(1).field(&AGE))
            .unwrap();
        registry
    }

    #[test]
    fn test_report_columns_fixed_then_sorted() {
        let registry = registry();
        let compiler = SchemaCompiler::new(&registry, DialectKind::Sqlite.adapter());

        let report = compiler
            .report_table(&ReportTable::new("report_person", &[1]))
            .unwrap();

        let names: Vec<_> = report.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "uuid",
                "edit_version",
                "entity_id",
                "parent_uuid",
                "age",
                "channels_0",
                "channels_1",
                "channels_2",
                "full_name",
            ]
        );
        assert_eq!(report.table.key, vec!["uuid".to_string()]);
    }

    #[test]
    fn test_field_subset() {
        let registry = registry();
        let compiler = SchemaCompiler::new(&registry, DialectKind::PostgreSql.adapter());

        let report = compiler
            .report_table(&ReportTable::new("r", &[2]).with_fields(&[AGE.id()]).on_slot(1))
            .unwrap();

        assert_eq!(report.columns.len(), 5);
        assert_eq!(report.slot, ConnectionSlot::Aux(1));
        assert!(report.upsert_sql.contains("ON CONFLICT (uuid)"));
    }

    #[test]
    fn test_row_values() {
        let registry = registry();
        let compiler = SchemaCompiler::new(&registry, DialectKind::Sqlite.adapter());
        let report = compiler
            .report_table(&ReportTable::new("r", &[1]))
            .unwrap();

        let mut entity = registry.create(2).unwrap();
        entity.set(&NAME, "Ada".to_string()).unwrap();
        entity
            .set(&CHANNELS, vec![Channel::Post, Channel::Email])
            .unwrap();

        assert!(report.matches(&entity));
        let row = report.row(&entity).unwrap();
        assert_eq!(row[2], SqlValue::Integer(2));
        assert_eq!(row[3], SqlValue::Null);
        assert_eq!(row[4], SqlValue::Null);
        assert_eq!(&row[5..8], &[SqlValue::Integer(1), SqlValue::Integer(0), SqlValue::Integer(1)]);
        assert_eq!(row[8], SqlValue::from("Ada"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let registry = registry();
        let compiler = SchemaCompiler::new(&registry, DialectKind::Sqlite.adapter());
        let err = compiler
            .report_table(&ReportTable::new("r", &[99]))
            .unwrap_err();
        assert_eq!(err.code(), "ERR_UNKNOWN_TYPE");
    }

    #[test]
    fn test_procedures_only_where_supported() {
        assert!(procedures_ddl(DialectKind::Sqlite.adapter()).is_empty());
        let procedures = procedures_ddl(DialectKind::MySql.adapter());
        assert_eq!(procedures.len(), 17);
        assert_eq!(procedures[0].0, "proc_jds_entity_overview");
    }

    #[test]
    fn test_core_ddl_covers_every_table() {
        let ddl = core_tables_ddl(DialectKind::TransactSql.adapter());
        assert_eq!(ddl.len(), tables::core_tables().len());
        assert!(ddl.iter().all(|(name, sql)| sql.starts_with(&format!("CREATE TABLE {} (", name))));
    }
}
