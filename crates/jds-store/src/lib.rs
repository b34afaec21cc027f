//! JDS Store - Multi-dialect entity persistence
//!
//! Provides:
//! - A connection contract with a rusqlite implementation
//! - Dialect adapters for SQLite, PostgreSQL, MySQL, MariaDB, T-SQL and Oracle
//! - Schema compilation and idempotent installation (core tables, reference
//!   tables, reporting tables, stored procedures, DDL templates)
//! - Chunked, transactional save of entity graphs
//! - Filtered, paged load with nested-instance deduplication

pub mod codec;
pub mod connection;
pub mod db;
pub mod dialect;
pub mod errors;
pub mod events;
pub mod load;
pub mod save;
pub mod schema;

// Re-export key types
pub use connection::{ConnectionProvider, ConnectionSlot, Row, SqlConnection, SqlValue, StatementKind};
pub use dialect::{Dialect, DialectKind};
pub use errors::Result;
pub use events::{EventArguments, LoadListener, SaveEventArgs, SaveListener};
pub use load::{EntityStream, LoadEngine, LoadFilter};
pub use save::{SaveEngine, SaveReport};
pub use schema::{ReportTable, SchemaCompiler};
