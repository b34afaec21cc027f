//! Schema Compiler and installer
//!
//! - `tables`: the persisted table layouts (names, columns, keys)
//! - `compiler`: DDL text and reporting-table layouts for a dialect
//! - `installer`: create-if-missing installation, DDL templates, reference metadata

pub mod compiler;
pub mod installer;
pub mod tables;

pub use compiler::{
    core_tables_ddl, procedures_ddl, CompiledReport, ReportColumn, ReportSource, ReportTable,
    SchemaCompiler,
};
pub use installer::{
    install_core_schema, install_report_table, install_templates, register_metadata,
};
pub use tables::{ColumnDef, ColumnType, TableDef, UUID_LENGTH};
