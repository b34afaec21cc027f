//! Event/statement cache and batched execution
//!
//! A save or load operation accumulates its statements in
//! [`EventArguments`] and hands them to [`execute_batches`], which runs
//! them all in one transaction per involved connection.
//!
//! Failure policy is the same for every caller: any error rolls back every
//! involved connection, restores autocommit and is returned. Nothing is
//! logged and swallowed here.

mod arguments;
mod connections;
mod listener;

use std::collections::BTreeSet;

use crate::connection::{ConnectionSlot, SqlConnection};
use crate::errors::Result;

pub use arguments::{EventArguments, PendingStatement, SaveEventArgs, StatementHandle};
pub use connections::Connections;
pub use listener::{LoadListener, SaveListener};

/// Totals of one successful [`execute_batches`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub statements: usize,
    pub rows: usize,
}

/// Execute every batched statement of `groups`, in order, then commit
///
/// Autocommit is switched off on every involved connection first and
/// restored to its previous value afterwards, on success and on failure.
/// Commits across several connections are sequential, not two-phase: a
/// failure while committing a later connection cannot undo an earlier one.
///
/// # Errors
///
/// The first driver error; all involved connections are rolled back.
pub fn execute_batches(connections: &mut Connections<'_>, groups: &[&EventArguments]) -> Result<BatchSummary> {
    let slots: BTreeSet<ConnectionSlot> = groups.iter().flat_map(|g| g.slots()).collect();
    if slots.is_empty() {
        return Ok(BatchSummary::default());
    }

    let mut opened: Vec<(ConnectionSlot, bool)> = Vec::new();
    for slot in &slots {
        let result = connections.get(*slot).and_then(|conn| {
            let previous = conn.is_autocommit();
            conn.set_autocommit(false).map(|_| previous)
        });
        match result {
            Ok(previous) => opened.push((*slot, previous)),
            Err(err) => {
                abandon(connections, &opened);
                return Err(err);
            }
        }
    }

    match run_and_commit(connections, groups, &opened) {
        Ok(summary) => {
            restore(connections, &opened);
            Ok(summary)
        }
        Err(err) => {
            abandon(connections, &opened);
            Err(err)
        }
    }
}

fn run_and_commit(
    connections: &mut Connections<'_>,
    groups: &[&EventArguments],
    opened: &[(ConnectionSlot, bool)],
) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();
    for group in groups {
        for statement in group.statements() {
            if statement.rows.is_empty() {
                continue;
            }
            let conn = connections.get(statement.slot)?;
            conn.execute_batch(statement.kind, &statement.sql, &statement.rows)?;
            summary.statements += 1;
            summary.rows += statement.rows.len();
            tracing::trace!(
                slot = ?statement.slot,
                rows = statement.rows.len(),
                sql = %statement.sql,
                "executed batch"
            );
        }
    }
    for (slot, _) in opened {
        connections.get(*slot)?.commit()?;
    }
    Ok(summary)
}

fn restore(connections: &mut Connections<'_>, opened: &[(ConnectionSlot, bool)]) {
    for (slot, previous) in opened {
        if let Err(err) = connections
            .get(*slot)
            .and_then(|conn| conn.set_autocommit(*previous))
        {
            tracing::warn!(slot = ?slot, error = %err, "failed to restore autocommit");
        }
    }
}

fn abandon(connections: &mut Connections<'_>, opened: &[(ConnectionSlot, bool)]) {
    for (slot, _) in opened {
        if let Err(err) = connections.get(*slot).and_then(|conn| conn.rollback()) {
            tracing::warn!(slot = ?slot, error = %err, "rollback failed");
        }
    }
    restore(connections, opened);
}

/// Run `work` in a transaction on a single connection
///
/// # Errors
///
/// Whatever `work` or the driver returns; the transaction is rolled back.
pub fn in_transaction<T>(
    conn: &mut dyn SqlConnection,
    work: impl FnOnce(&mut dyn SqlConnection) -> Result<T>,
) -> Result<T> {
    let previous = conn.is_autocommit();
    conn.set_autocommit(false)?;
    let result = work(&mut *conn).and_then(|value| conn.commit().map(|_| value));
    if result.is_err() {
        if let Err(err) = conn.rollback() {
            tracing::warn!(error = %err, "rollback failed");
        }
    }
    if let Err(err) = conn.set_autocommit(previous) {
        tracing::warn!(error = %err, "failed to restore autocommit");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{SqlValue, StatementKind};
    use crate::connection::sqlite::SqliteFileProvider;
    use crate::db;

    fn count(conn: &mut dyn SqlConnection, table: &str) -> i64 {
        conn.query(&format!("SELECT COUNT(*) FROM {}", table), &[])
            .unwrap()[0][0]
            .as_i64()
            .unwrap()
    }

    #[test]
    fn test_pre_group_runs_before_post_group() {
        let mut conn = db::open_in_memory().unwrap();
        conn.execute_script("CREATE TABLE parent (id INTEGER PRIMARY KEY); \
             CREATE TABLE child (parent INTEGER NOT NULL REFERENCES parent(id))")
            .unwrap();
        conn.execute_script("PRAGMA foreign_keys = ON").unwrap();

        let mut pre = EventArguments::new();
        let mut post = EventArguments::new();
        post.batch("INSERT INTO child (parent) VALUES (?)", vec![SqlValue::Integer(1)]);
        pre.batch("INSERT INTO parent (id) VALUES (?)", vec![SqlValue::Integer(1)]);

        let mut connections = Connections::new(&mut conn);
        let summary = execute_batches(&mut connections, &[&pre, &post]).unwrap();
        drop(connections);

        assert_eq!(summary, BatchSummary { statements: 2, rows: 2 });
        assert_eq!(count(&mut conn, "child"), 1);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_failure_rolls_back_everything() {
        let mut conn = db::open_in_memory().unwrap();
        conn.execute_script("CREATE TABLE t (a INTEGER PRIMARY KEY)").unwrap();

        let mut args = EventArguments::new();
        args.batch("INSERT INTO t (a) VALUES (?)", vec![SqlValue::Integer(1)]);
        args.batch("INSERT INTO missing (a) VALUES (?)", vec![SqlValue::Integer(2)]);

        let mut connections = Connections::new(&mut conn);
        assert!(execute_batches(&mut connections, &[&args]).is_err());
        drop(connections);

        assert_eq!(count(&mut conn, "t"), 0);
        assert!(conn.is_autocommit());
        assert!(conn.raw().is_autocommit());
    }

    #[test]
    fn test_aux_slot_opened_through_provider() {
        let dir = tempfile::tempdir().unwrap();
        let aux_path = dir.path().join("aux.db");
        {
            let mut aux = db::open(&aux_path).unwrap();
            aux.execute_script("CREATE TABLE r (a INTEGER)").unwrap();
        }
        let provider = SqliteFileProvider::new().with_slot(7, &aux_path);
        let mut conn = db::open_in_memory().unwrap();

        let mut args = EventArguments::new();
        args.batch_on(
            ConnectionSlot::Aux(7),
            StatementKind::Statement,
            "INSERT INTO r (a) VALUES (?)",
            vec![SqlValue::Integer(5)],
        );
        let mut connections = Connections::with_provider(&mut conn, &provider);
        execute_batches(&mut connections, &[&args]).unwrap();
        drop(connections);

        let mut aux = db::open(&aux_path).unwrap();
        assert_eq!(count(&mut aux, "r"), 1);
    }

    #[test]
    fn test_aux_slot_without_provider_is_config_error() {
        let mut conn = db::open_in_memory().unwrap();
        let mut args = EventArguments::new();
        args.batch_on(ConnectionSlot::Aux(1), StatementKind::Statement, "SELECT 1", vec![]);
        // empty rows are skipped entirely
        let mut connections = Connections::new(&mut conn);
        assert!(execute_batches(&mut connections, &[&args]).is_ok());

        args.batch_on(ConnectionSlot::Aux(1), StatementKind::Statement, "SELECT 1", vec![SqlValue::Null]);
        let err = execute_batches(&mut connections, &[&args]).unwrap_err();
        assert_eq!(err.code(), "ERR_CONFIG");
    }

    #[test]
    fn test_in_transaction_rolls_back_on_error() {
        let mut conn = db::open_in_memory().unwrap();
        conn.execute_script("CREATE TABLE t (a INTEGER)").unwrap();

        let result: Result<()> = in_transaction(&mut conn, |c| {
            c.execute_script("INSERT INTO t (a) VALUES (1)")?;
            c.execute_script("INSERT INTO nope VALUES (1)")
        });

        assert!(result.is_err());
        assert_eq!(count(&mut conn, "t"), 0);
    }
}
