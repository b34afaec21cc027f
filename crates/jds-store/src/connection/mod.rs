//! Connection contract
//!
//! The engines never talk to a driver directly. They batch parameter rows
//! against SQL text and hand them to a `SqlConnection`, which owns
//! preparation, type mapping and transaction control for one database.

pub mod sqlite;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

use crate::dialect::DialectKind;
use crate::errors::Result;

/// A bound parameter or a fetched column value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    ZonedTimestamp(DateTime<FixedOffset>),
    Time(NaiveTime),
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            SqlValue::Real(r) => Some(*r as i64),
            SqlValue::Text(t) => t.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(i64::from(v))
    }
}

impl From<Option<String>> for SqlValue {
    fn from(v: Option<String>) -> Self {
        v.map(SqlValue::Text).unwrap_or(SqlValue::Null)
    }
}

/// One fetched row
pub type Row = Vec<SqlValue>;

/// Plain DML/DDL versus a stored-procedure call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Statement,
    Call,
}

/// Which connection a statement runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConnectionSlot {
    /// The connection handed to `save`/`load`
    Default,
    /// An auxiliary connection opened on demand through a `ConnectionProvider`
    Aux(u32),
}

/// A live database connection
///
/// Transaction control follows the autocommit model: switching autocommit
/// off opens a transaction, `commit`/`rollback` end it and immediately open
/// the next one, switching autocommit back on commits whatever is pending.
pub trait SqlConnection {
    fn dialect(&self) -> DialectKind;

    /// Catalog (database/schema name) used to scope existence probes
    fn catalog(&self) -> Option<String> {
        None
    }

    /// Run `sql` once per parameter row; returns the number of affected rows
    ///
    /// # Errors
    ///
    /// Driver failures, or `Unsupported` for calls on drivers without procedures.
    fn execute_batch(&mut self, kind: StatementKind, sql: &str, rows: &[Row]) -> Result<usize>;

    /// # Errors
    ///
    /// Driver failures.
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;

    /// Execute opaque SQL text verbatim (DDL templates, procedure bodies)
    ///
    /// # Errors
    ///
    /// Driver failures.
    fn execute_script(&mut self, sql: &str) -> Result<()>;

    fn is_autocommit(&self) -> bool;

    /// # Errors
    ///
    /// Driver failures.
    fn set_autocommit(&mut self, autocommit: bool) -> Result<()>;

    /// # Errors
    ///
    /// Driver failures.
    fn commit(&mut self) -> Result<()>;

    /// # Errors
    ///
    /// Driver failures.
    fn rollback(&mut self) -> Result<()>;
}

/// Supplies auxiliary connections by slot id
pub trait ConnectionProvider {
    /// # Errors
    ///
    /// When the slot is unknown or the connection cannot be opened.
    fn open(&self, slot: u32) -> Result<Box<dyn SqlConnection>>;
}
