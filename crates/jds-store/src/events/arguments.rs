use std::collections::{BTreeSet, HashMap};

use crate::connection::{ConnectionSlot, Row, StatementKind};

/// One prepared statement and the parameter rows batched against it
#[derive(Debug, Clone, PartialEq)]
pub struct PendingStatement {
    pub slot: ConnectionSlot,
    pub kind: StatementKind,
    pub sql: String,
    pub rows: Vec<Row>,
}

/// Index of a statement inside one [`EventArguments`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementHandle(usize);

/// Per-operation statement cache
///
/// Statements are memoized by exact SQL text (and target connection), so
/// every caller that renders the same SQL appends to the same batch.
/// Execution order is first-prepare order.
#[derive(Debug, Default)]
pub struct EventArguments {
    statements: Vec<PendingStatement>,
    index: HashMap<(ConnectionSlot, StatementKind, String), usize>,
}

impl EventArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statement on the default connection
    pub fn get_or_prepare(&mut self, sql: &str) -> StatementHandle {
        self.get_or_prepare_on(ConnectionSlot::Default, StatementKind::Statement, sql)
    }

    /// Procedure call on the default connection
    pub fn get_or_prepare_call(&mut self, sql: &str) -> StatementHandle {
        self.get_or_prepare_on(ConnectionSlot::Default, StatementKind::Call, sql)
    }

    pub fn get_or_prepare_on(
        &mut self,
        slot: ConnectionSlot,
        kind: StatementKind,
        sql: &str,
    ) -> StatementHandle {
        let key = (slot, kind, sql.to_string());
        if let Some(&i) = self.index.get(&key) {
            return StatementHandle(i);
        }
        let i = self.statements.len();
        self.statements.push(PendingStatement {
            slot,
            kind,
            sql: sql.to_string(),
            rows: Vec::new(),
        });
        self.index.insert(key, i);
        StatementHandle(i)
    }

    /// Append one parameter row to a prepared statement
    pub fn add_batch(&mut self, handle: StatementHandle, row: Row) {
        if let Some(statement) = self.statements.get_mut(handle.0) {
            statement.rows.push(row);
        }
    }

    /// Prepare (or reuse) and batch in one step
    pub fn batch(&mut self, sql: &str, row: Row) {
        let handle = self.get_or_prepare(sql);
        self.add_batch(handle, row);
    }

    pub fn batch_on(&mut self, slot: ConnectionSlot, kind: StatementKind, sql: &str, row: Row) {
        let handle = self.get_or_prepare_on(slot, kind, sql);
        self.add_batch(handle, row);
    }

    pub fn statements(&self) -> &[PendingStatement] {
        &self.statements
    }

    /// Statements with at least one row
    pub fn statement_count(&self) -> usize {
        self.statements.iter().filter(|s| !s.rows.is_empty()).count()
    }

    pub fn row_count(&self) -> usize {
        self.statements.iter().map(|s| s.rows.len()).sum()
    }

    pub fn slots(&self) -> BTreeSet<ConnectionSlot> {
        self.statements
            .iter()
            .filter(|s| !s.rows.is_empty())
            .map(|s| s.slot)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}

/// The two statement groups of a save chunk
///
/// `pre` runs in full before `post`: overview rows and collection deletes
/// go in `pre`, field values and inserts in `post`.
#[derive(Debug, Default)]
pub struct SaveEventArgs {
    pub chunk_index: usize,
    pub pre: EventArguments,
    pub post: EventArguments,
}

impl SaveEventArgs {
    pub fn new(chunk_index: usize) -> Self {
        Self {
            chunk_index,
            ..Self::default()
        }
    }
}
