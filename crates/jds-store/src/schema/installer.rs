//! Schema installation
//!
//! Everything here is "create if missing": existence probes are consulted
//! before each CREATE, so re-running an install is a no-op.
//!
//! ## Logging Ownership
//!
//! Each public function owns lifecycle logging for its operation
//! (`log_op_start!` / `log_op_end!` / `log_op_error!`); helpers use
//! `tracing::debug!` only.

#![allow(clippy::result_large_err)]

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use jds_core::{log_op_end, log_op_error, log_op_start, MetadataRegistry, ValueKind};
use sha2::{Digest, Sha256};

use super::compiler::{self, CompiledReport};
use super::tables::{self, TableDef};
use crate::codec;
use crate::connection::{SqlConnection, SqlValue};
use crate::dialect::{self, Dialect};
use crate::errors::{checksum_mismatch, io_error, Result};
use crate::events::{execute_batches, in_transaction, Connections, EventArguments};

/// Compute SHA256 checksum of a string
pub fn compute_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create every missing engine table, and the upsert procedures when asked
///
/// Returns the names of the objects created.
///
/// # Errors
///
/// Driver failures while creating an object.
pub fn install_core_schema(conn: &mut dyn SqlConnection, procedures: bool) -> Result<Vec<String>> {
    log_op_start!("install_core_schema", dialect = %conn.dialect());
    let start = Instant::now();

    let created = install_core_schema_impl(conn, procedures).map_err(|e| {
        log_op_error!(
            "install_core_schema",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "install_core_schema",
        duration_ms = start.elapsed().as_millis() as u64,
        created = created.len()
    );
    Ok(created)
}

fn install_core_schema_impl(conn: &mut dyn SqlConnection, procedures: bool) -> Result<Vec<String>> {
    let adapter = conn.dialect().adapter();
    let mut created = Vec::new();

    for (table, sql) in compiler::core_tables_ddl(adapter) {
        if dialect::table_exists(conn, &table) {
            continue;
        }
        conn.execute_script(&sql)?;
        tracing::debug!(table = %table, "created table");
        created.push(table);
    }

    if procedures {
        for (name, sql) in compiler::procedures_ddl(adapter) {
            if dialect::procedure_exists(conn, &name) {
                continue;
            }
            conn.execute_script(&sql)?;
            tracing::debug!(procedure = %name, "created procedure");
            created.push(name);
        }
    }
    Ok(created)
}

/// Apply `<dir>/<dialect>/*.sql` in file name order, each at most once
///
/// Applied templates are recorded with their SHA-256 checksum in
/// `jds_schema_log`. A template whose content changed after it was
/// applied is rejected. Returns the names of the templates applied now.
///
/// # Errors
///
/// `Io` if the directory cannot be read, `ChecksumMismatch` for a changed
/// template, driver failures while executing one (that template is
/// rolled back, earlier ones stay applied).
pub fn install_templates(conn: &mut dyn SqlConnection, dir: &Path) -> Result<Vec<String>> {
    log_op_start!("install_templates", dir = %dir.display());
    let start = Instant::now();

    let applied = install_templates_impl(conn, dir).map_err(|e| {
        log_op_error!(
            "install_templates",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "install_templates",
        duration_ms = start.elapsed().as_millis() as u64,
        applied = applied.len()
    );
    Ok(applied)
}

fn template_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "no templates for dialect");
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| io_error("install_templates", e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "sql"))
        .collect();
    files.sort();
    Ok(files)
}

fn install_templates_impl(conn: &mut dyn SqlConnection, dir: &Path) -> Result<Vec<String>> {
    let adapter = conn.dialect().adapter();
    let log_table = tables::schema_log_table();
    if !dialect::table_exists(conn, &log_table.name) {
        conn.execute_script(&adapter.create_table_sql(&log_table))?;
    }

    let lookup = format!(
        "SELECT checksum FROM {} WHERE template_name = {}",
        log_table.name,
        adapter.placeholder(1)
    );
    let record = adapter.insert_sql(&log_table.name, &log_table.column_names());

    let mut applied = Vec::new();
    for path in template_files(&dir.join(adapter.kind().name()))? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content =
            std::fs::read_to_string(&path).map_err(|e| io_error("install_templates", e))?;
        let checksum = compute_checksum(&content);

        let rows = conn.query(&lookup, &[SqlValue::from(name.as_str())])?;
        if let Some(stored) = rows.first().and_then(|r| r.first()).and_then(SqlValue::as_str) {
            if stored != checksum {
                return Err(checksum_mismatch(&name, stored, &checksum));
            }
            continue;
        }

        in_transaction(conn, |c| {
            c.execute_script(&content)?;
            c.execute_batch(
                crate::connection::StatementKind::Statement,
                &record,
                &[vec![
                    SqlValue::from(name.as_str()),
                    SqlValue::from(checksum.as_str()),
                    codec::encode_timestamp(&Utc::now()),
                ]],
            )
            .map(|_| ())
        })?;
        tracing::debug!(template = %name, checksum = %checksum, "applied template");
        applied.push(name);
    }
    Ok(applied)
}

/// Create a reporting table, or add the columns it is missing
///
/// Returns the names of the columns added (all of them for a new table).
///
/// # Errors
///
/// Driver failures.
pub fn install_report_table(conn: &mut dyn SqlConnection, report: &CompiledReport) -> Result<Vec<String>> {
    let adapter = conn.dialect().adapter();
    let table: &TableDef = &report.table;

    if !dialect::table_exists(conn, &table.name) {
        conn.execute_script(&adapter.create_table_sql(table))?;
        tracing::debug!(table = %table.name, "created reporting table");
        return Ok(table.column_names());
    }

    let mut added = Vec::new();
    for column in &table.columns {
        if dialect::column_exists(conn, &table.name, &column.name) {
            continue;
        }
        let type_name = adapter.column_type(&column.column_type);
        conn.execute_script(&adapter.add_column_sql(&table.name, &column.name, &type_name))?;
        tracing::debug!(table = %table.name, column = %column.name, "added reporting column");
        added.push(column.name.clone());
    }
    Ok(added)
}

/// Write the registry into the `jds_ref_*` tables in one transaction
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Driver failures; nothing is written.
pub fn register_metadata(conn: &mut dyn SqlConnection, registry: &MetadataRegistry) -> Result<usize> {
    log_op_start!("register_metadata", type_count = registry.types().count());
    let start = Instant::now();

    let result = register_metadata_impl(conn, registry).map_err(|e| {
        log_op_error!(
            "register_metadata",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "register_metadata",
        duration_ms = start.elapsed().as_millis() as u64,
        rows = result
    );
    Ok(result)
}

fn upsert_for(adapter: &dyn Dialect, table: &TableDef) -> String {
    adapter.upsert_sql(&table.name, &table.column_names(), &table.key)
}

fn register_metadata_impl(conn: &mut dyn SqlConnection, registry: &MetadataRegistry) -> Result<usize> {
    let adapter = conn.dialect().adapter();
    let defs = tables::reference_tables();
    let sql: Vec<String> = defs.iter().map(|t| upsert_for(adapter, t)).collect();
    let [entity_sql, field_sql, kind_sql, enum_sql, entity_field_sql, inheritance_sql] =
        <[String; 6]>::try_from(sql).map_err(|_| {
            jds_core::JdsError::new(jds_core::JdsErrorKind::Internal)
                .with_op("register_metadata")
                .with_message("reference table layout changed")
        })?;

    let mut args = EventArguments::new();
    for kind in ValueKind::all() {
        args.batch(
            &kind_sql,
            vec![SqlValue::from(kind.code()), SqlValue::from(kind.name())],
        );
    }
    for field in registry.fields() {
        args.batch(
            &field_sql,
            vec![
                SqlValue::Integer(field.id as i64),
                SqlValue::from(field.name.as_str()),
                SqlValue::from(field.description.as_str()),
                SqlValue::from(field.kind.code()),
            ],
        );
        for (ordinal, name) in field.enum_values.iter().enumerate() {
            args.batch(
                &enum_sql,
                vec![
                    SqlValue::Integer(field.id as i64),
                    SqlValue::Integer(ordinal as i64),
                    SqlValue::from(name.as_str()),
                ],
            );
        }
    }
    for descriptor in registry.types() {
        let entity_id = SqlValue::Integer(descriptor.id() as i64);
        args.batch(
            &entity_sql,
            vec![
                entity_id.clone(),
                SqlValue::from(descriptor.name()),
                SqlValue::from(descriptor.version()),
            ],
        );
        for field in descriptor.own_fields() {
            args.batch(
                &entity_field_sql,
                vec![entity_id.clone(), SqlValue::Integer(field.id as i64)],
            );
        }
        if let Some(parent) = descriptor.parent() {
            args.batch(
                &inheritance_sql,
                vec![SqlValue::Integer(parent as i64), entity_id.clone()],
            );
        }
    }

    let mut connections = Connections::new(conn);
    let summary = execute_batches(&mut connections, &[&args])?;
    Ok(summary.rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_compute_checksum() {
        let checksum = compute_checksum("SELECT 1");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, compute_checksum("SELECT 1"));
    }

    #[test]
    fn test_install_core_schema_is_idempotent() {
        let mut conn = db::open_in_memory().unwrap();

        let first = install_core_schema(&mut conn, false).unwrap();
        let second = install_core_schema(&mut conn, false).unwrap();

        assert_eq!(first.len(), tables::core_tables().len());
        assert!(second.is_empty());
    }

    #[test]
    fn test_procedures_ignored_on_sqlite() {
        let mut conn = db::open_in_memory().unwrap();
        let created = install_core_schema(&mut conn, true).unwrap();
        assert!(created.iter().all(|name| !name.starts_with("proc_")));
    }
}
