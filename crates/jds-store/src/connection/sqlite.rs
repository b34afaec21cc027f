//! SQLite driver for the connection contract (rusqlite)

#![allow(clippy::result_large_err)]

use rusqlite::types::{ToSql, ToSqlOutput, Type, Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::collections::BTreeMap;
use std::path::PathBuf;

use jds_core::errors::{JdsError, JdsErrorKind};

use super::{ConnectionProvider, Row, SqlConnection, SqlValue, StatementKind};
use crate::codec::{nanos_of_day, DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::dialect::DialectKind;
use crate::errors::{codec_error, from_rusqlite, unsupported, Result};

/// SQLite has no temporal storage classes: dates and timestamps go in as
/// fixed-width text, zoned timestamps as RFC 3339, times as nanos of day.
impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlValue::Real(r) => ToSqlOutput::Owned(Value::Real(*r)),
            SqlValue::Text(t) => ToSqlOutput::Borrowed(ValueRef::Text(t.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            SqlValue::Date(d) => ToSqlOutput::Owned(Value::Text(d.format(DATE_FORMAT).to_string())),
            SqlValue::Timestamp(ts) => {
                ToSqlOutput::Owned(Value::Text(ts.format(TIMESTAMP_FORMAT).to_string()))
            }
            SqlValue::ZonedTimestamp(z) => ToSqlOutput::Owned(Value::Text(z.to_rfc3339())),
            SqlValue::Time(t) => ToSqlOutput::Owned(Value::Integer(nanos_of_day(t))),
        })
    }
}

fn value_from_ref(column: usize, value: ValueRef<'_>) -> rusqlite::Result<SqlValue> {
    Ok(match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(r) => SqlValue::Real(r),
        ValueRef::Text(t) => {
            let text = std::str::from_utf8(t).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e))
            })?;
            SqlValue::Text(text.to_string())
        }
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    })
}

/// Undecodable column values are codec errors, everything else a driver error
fn query_error(err: rusqlite::Error) -> JdsError {
    match err {
        rusqlite::Error::FromSqlConversionFailure(column, _, cause) => {
            codec_error(format!("column {} holds undecodable text: {}", column, cause))
        }
        other => from_rusqlite(other),
    }
}

/// A rusqlite connection behind the engine's connection contract
pub struct SqliteConnection {
    conn: Connection,
    autocommit: bool,
}

impl SqliteConnection {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            autocommit: true,
        }
    }

    /// Borrow the underlying rusqlite connection
    pub fn raw(&self) -> &Connection {
        &self.conn
    }

    pub fn into_inner(self) -> Connection {
        self.conn
    }

    fn exec(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).map_err(from_rusqlite)
    }
}

impl SqlConnection for SqliteConnection {
    fn dialect(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn catalog(&self) -> Option<String> {
        Some("main".to_string())
    }

    fn execute_batch(&mut self, kind: StatementKind, sql: &str, rows: &[Row]) -> Result<usize> {
        if kind == StatementKind::Call {
            return Err(unsupported(DialectKind::Sqlite, "stored procedure calls"));
        }
        let mut stmt = self.conn.prepare_cached(sql).map_err(from_rusqlite)?;
        let mut affected = 0;
        for row in rows {
            affected += stmt
                .execute(params_from_iter(row.iter()))
                .map_err(from_rusqlite)?;
        }
        Ok(affected)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(from_rusqlite)?;
        let columns = stmt.column_count();
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..columns)
                    .map(|i| row.get_ref(i).and_then(|v| value_from_ref(i, v)))
                    .collect::<rusqlite::Result<Row>>()
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(query_error)?;
        Ok(rows)
    }

    fn execute_script(&mut self, sql: &str) -> Result<()> {
        self.exec(sql)
    }

    fn is_autocommit(&self) -> bool {
        self.autocommit
    }

    fn set_autocommit(&mut self, autocommit: bool) -> Result<()> {
        if autocommit == self.autocommit {
            return Ok(());
        }
        if autocommit {
            if !self.conn.is_autocommit() {
                self.exec("COMMIT")?;
            }
        } else if self.conn.is_autocommit() {
            self.exec("BEGIN")?;
        }
        self.autocommit = autocommit;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.autocommit {
            return Ok(());
        }
        if !self.conn.is_autocommit() {
            self.exec("COMMIT")?;
        }
        self.exec("BEGIN")
    }

    fn rollback(&mut self) -> Result<()> {
        if self.autocommit {
            return Ok(());
        }
        if !self.conn.is_autocommit() {
            self.exec("ROLLBACK")?;
        }
        self.exec("BEGIN")
    }
}

/// Opens file-backed SQLite databases for auxiliary slots
#[derive(Debug, Default, Clone)]
pub struct SqliteFileProvider {
    slots: BTreeMap<u32, PathBuf>,
}

impl SqliteFileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(mut self, slot: u32, path: impl Into<PathBuf>) -> Self {
        self.slots.insert(slot, path.into());
        self
    }
}

impl ConnectionProvider for SqliteFileProvider {
    fn open(&self, slot: u32) -> Result<Box<dyn SqlConnection>> {
        let path = self.slots.get(&slot).ok_or_else(|| {
            JdsError::new(JdsErrorKind::Config)
                .with_op("open_connection")
                .with_message(format!("No database registered for connection slot {}", slot))
        })?;
        tracing::debug!(slot, path = %path.display(), "opening auxiliary connection");
        Ok(Box::new(crate::db::open(path)?))
    }
}
