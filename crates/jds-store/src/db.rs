//! Database connection management
//!
//! Opens SQLite connections wrapped in the engine's connection contract

use crate::connection::sqlite::SqliteConnection;
use crate::errors::{from_rusqlite, Result};
use rusqlite::Connection;
use std::path::Path;

/// Open a SQLite database at the given path
pub fn open<P: AsRef<Path>>(path: P) -> Result<SqliteConnection> {
    let conn = Connection::open(path).map_err(from_rusqlite)?;
    configure(&conn)?;
    Ok(SqliteConnection::new(conn))
}

/// Open an in-memory SQLite database (for testing)
pub fn open_in_memory() -> Result<SqliteConnection> {
    let conn = Connection::open_in_memory().map_err(from_rusqlite)?;
    configure(&conn)?;
    Ok(SqliteConnection::new(conn))
}

/// Configure a connection with the settings the engine expects
pub fn configure(conn: &Connection) -> Result<()> {
    // WAL lets readers proceed while a chunk transaction is open
    let _mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .map_err(from_rusqlite)?;

    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(from_rusqlite)?;

    Ok(())
}
