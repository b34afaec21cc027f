//! Chunked, batched save
//!
//! ## Architecture
//!
//! `save` splits its input into chunks of `chunk_size` top-level
//! instances. Each chunk is planned into a [`SaveContext`] (nested
//! instances flattened in, children first), batched into the two
//! statement groups of a [`SaveEventArgs`] and executed in one
//! transaction per involved connection:
//!
//! - `pre`: overview and instance rows, collection and binding deletes
//! - `post`: scalar values, collection items, bindings, reporting rows
//!
//! Chunks commit independently. A failing chunk is rolled back together
//! with the in-memory version bumps of its instances; earlier chunks stay
//! committed and later chunks never run.
//!
//! ## Logging Ownership
//!
//! `save` owns lifecycle logging for the whole invocation. Per-chunk
//! progress goes to `tracing::debug!`.

#![allow(clippy::result_large_err)]

mod plan;

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use jds_core::errors::{JdsError, JdsErrorKind};
use jds_core::{log_op_end, log_op_error, log_op_start};
use jds_core::{Entity, JdsOptions, MetadataRegistry, ScalarKind, SharedEntity, Value};
use jds_core_types::RequestId;

use crate::codec;
use crate::connection::{ConnectionProvider, ConnectionSlot, Row, SqlConnection, SqlValue, StatementKind};
use crate::dialect::{procedure_name, Dialect};
use crate::errors::{save_error, Result};
use crate::events::{execute_batches, BatchSummary, Connections, SaveEventArgs, SaveListener};
use crate::schema::tables::{self, TableDef};
use crate::schema::CompiledReport;

pub use plan::{SaveContext, SaveState};

/// Outcome of a successful save
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub chunks_committed: usize,
    /// Instances written, nested ones included
    pub instances_written: usize,
    pub statements: usize,
    pub rows: usize,
}

/// Writes entity graphs through a [`SqlConnection`]
pub struct SaveEngine<'r> {
    registry: &'r MetadataRegistry,
    options: JdsOptions,
    listeners: Vec<Box<dyn SaveListener>>,
    reports: Vec<CompiledReport>,
}

impl<'r> SaveEngine<'r> {
    pub fn new(registry: &'r MetadataRegistry, options: JdsOptions) -> Self {
        Self {
            registry,
            options,
            listeners: Vec::new(),
            reports: Vec::new(),
        }
    }

    /// Hooks run in registration order
    pub fn with_listener(mut self, listener: impl SaveListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Reporting table kept up to date by every save (see `write_reporting_tables`)
    pub fn with_report(mut self, report: CompiledReport) -> Self {
        self.reports.push(report);
        self
    }

    pub fn options(&self) -> &JdsOptions {
        &self.options
    }

    /// Save `entities` and everything nested in them
    ///
    /// On success every written instance carries its new edit version.
    ///
    /// # Errors
    ///
    /// - `Config` for invalid options, or a reporting table on an auxiliary
    ///   slot (use [`SaveEngine::save_with_provider`])
    /// - `UnknownType` for an unregistered instance; its chunk is not written
    /// - `Save` for any failure while batching or executing a chunk; the
    ///   chunk is rolled back and the underlying error is its source
    pub fn save(&self, entities: &[SharedEntity], conn: &mut dyn SqlConnection) -> Result<SaveReport> {
        self.run(entities, Connections::new(conn))
    }

    /// Like [`SaveEngine::save`], opening auxiliary slots through `provider`
    ///
    /// # Errors
    ///
    /// As for [`SaveEngine::save`].
    pub fn save_with_provider(
        &self,
        entities: &[SharedEntity],
        conn: &mut dyn SqlConnection,
        provider: &dyn ConnectionProvider,
    ) -> Result<SaveReport> {
        self.run(entities, Connections::with_provider(conn, provider))
    }

    fn run(&self, entities: &[SharedEntity], mut connections: Connections<'_>) -> Result<SaveReport> {
        let request_id = RequestId::new();
        log_op_start!(
            "save",
            entity_count = entities.len(),
            dialect = %connections.default_dialect(),
            request_id = request_id.as_str()
        );
        let start = Instant::now();

        let report = self.save_impl(entities, &mut connections).map_err(|e| {
            let e = e.with_request_id(request_id.clone());
            log_op_error!(
                "save",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                request_id = request_id.as_str()
            );
            e
        })?;

        log_op_end!(
            "save",
            duration_ms = start.elapsed().as_millis() as u64,
            chunks = report.chunks_committed,
            instances = report.instances_written,
            statement_count = report.statements,
            request_id = request_id.as_str()
        );
        Ok(report)
    }

    fn save_impl(&self, entities: &[SharedEntity], connections: &mut Connections<'_>) -> Result<SaveReport> {
        self.options.validate()?;
        let statements = Statements::render(
            connections.default_dialect().adapter(),
            self.options.use_stored_procedures,
        );

        let mut report = SaveReport::default();
        for (chunk_index, chunk) in entities.chunks(self.options.chunk_size).enumerate() {
            let mut ctx = SaveContext::new(chunk_index);
            let now = Utc::now();
            for entity in chunk {
                if let Err(err) = ctx.plan(self.registry, entity, None, now) {
                    ctx.revert();
                    ctx.advance(SaveState::RolledBack);
                    return Err(err.with_chunk_index(chunk_index));
                }
            }

            match self.write_chunk(&mut ctx, &statements, connections) {
                Ok(summary) => {
                    ctx.advance(SaveState::Committed);
                    report.chunks_committed += 1;
                    report.instances_written += ctx.planned_count();
                    report.statements += summary.statements;
                    report.rows += summary.rows;
                    tracing::debug!(
                        chunk_index,
                        instances = ctx.planned_count(),
                        statements = summary.statements,
                        rows = summary.rows,
                        "chunk committed"
                    );
                }
                Err(err) => {
                    ctx.revert();
                    ctx.advance(SaveState::RolledBack);
                    tracing::debug!(chunk_index, error = %err, "chunk rolled back");
                    return Err(save_error(chunk_index, None, err));
                }
            }
        }
        Ok(report)
    }

    fn write_chunk(
        &self,
        ctx: &mut SaveContext,
        statements: &Statements,
        connections: &mut Connections<'_>,
    ) -> Result<BatchSummary> {
        let mut args = SaveEventArgs::new(ctx.chunk_index());

        for planned in ctx.planned() {
            statements.write_overview(&mut args, &planned.snapshot, self.options.write_overview_dates);
        }
        ctx.advance(SaveState::OverviewWritten);

        for planned in ctx.planned() {
            let entity = &planned.snapshot;
            for listener in &self.listeners {
                listener
                    .on_pre_save(&mut args, entity)
                    .map_err(|e| tag(e, entity))?;
            }
            self.write_fields(statements, &mut args, entity)
                .map_err(|e| tag(e, entity))?;
            if self.options.write_reporting_tables {
                for report in self.reports.iter().filter(|r| r.matches(entity)) {
                    let row = report.row(entity).map_err(|e| tag(e, entity))?;
                    args.post
                        .batch_on(report.slot, StatementKind::Statement, &report.upsert_sql, row);
                }
            }
        }
        ctx.advance(SaveState::FieldsBatched);

        for planned in ctx.planned() {
            for listener in &self.listeners {
                listener
                    .on_post_save(&mut args, &planned.snapshot)
                    .map_err(|e| tag(e, &planned.snapshot))?;
            }
        }

        execute_batches(connections, &[&args.pre, &args.post])
    }

    fn write_fields(&self, statements: &Statements, args: &mut SaveEventArgs, entity: &Entity) -> Result<()> {
        let overview = entity.overview();
        let key = |field_id: u64| -> Row {
            vec![
                SqlValue::from(overview.uuid.as_str()),
                SqlValue::from(overview.edit_version),
                SqlValue::Integer(field_id as i64),
            ]
        };

        for (field_id, value) in entity.values() {
            match value {
                Value::Scalar(scalar) => {
                    let (kind, sql) = statements.value(scalar.kind())?;
                    let mut row = key(field_id);
                    row.push(codec::encode(scalar)?);
                    args.post.batch_on(ConnectionSlot::Default, kind, sql, row);
                }
                Value::Collection(kind, items) => {
                    if !self.options.write_collections {
                        continue;
                    }
                    let (delete, insert) = statements.collection(*kind)?;
                    args.pre.batch(delete, key(field_id));
                    for (sequence, item) in items.iter().enumerate() {
                        let mut row = key(field_id);
                        row.push(SqlValue::Integer(sequence as i64));
                        row.push(codec::encode(item)?);
                        args.post.batch(insert, row);
                    }
                }
                Value::Entity(child) => {
                    statements.write_bindings(args, key(field_id), std::slice::from_ref(child));
                }
                Value::Entities(children) => {
                    statements.write_bindings(args, key(field_id), children);
                }
            }
        }
        Ok(())
    }
}

fn tag(err: JdsError, entity: &Entity) -> JdsError {
    if err.entity_id().is_some() {
        err
    } else {
        err.with_entity_id(entity.uuid().to_string())
    }
}

/// SQL text for every table a save touches, rendered once per invocation
struct Statements {
    overview: (StatementKind, String),
    instance: String,
    binding_delete: String,
    binding_insert: String,
    values: BTreeMap<ScalarKind, (StatementKind, String)>,
    collections: BTreeMap<ScalarKind, (String, String)>,
}

impl Statements {
    fn render(dialect: &dyn Dialect, procedures: bool) -> Self {
        let upsert = |table: &TableDef| -> (StatementKind, String) {
            if procedures {
                if let Some(call) = dialect.call_sql(&procedure_name(&table.name), table.columns.len()) {
                    return (StatementKind::Call, call);
                }
            }
            (
                StatementKind::Statement,
                dialect.upsert_sql(&table.name, &table.column_names(), &table.key),
            )
        };
        let owner_key = ["uuid", "edit_version", "field_id"];

        let instance = tables::instance_table();
        let binding = tables::binding_table();
        let binding_owner = ["parent_uuid", "parent_edit_version", "field_id"];

        let mut values = BTreeMap::new();
        let mut collections = BTreeMap::new();
        for kind in ScalarKind::ALL {
            values.insert(kind, upsert(&tables::value_table_def(kind)));
            let collection = tables::collection_table_def(kind);
            collections.insert(
                kind,
                (
                    dialect.delete_sql(&collection.name, &owner_key),
                    dialect.insert_sql(&collection.name, &collection.column_names()),
                ),
            );
        }

        Self {
            overview: upsert(&tables::overview_table()),
            instance: dialect.upsert_sql(&instance.name, &instance.column_names(), &instance.key),
            binding_delete: dialect.delete_sql(&binding.name, &binding_owner),
            binding_insert: dialect.insert_sql(&binding.name, &binding.column_names()),
            values,
            collections,
        }
    }

    fn value(&self, kind: ScalarKind) -> Result<(StatementKind, &str)> {
        self.values
            .get(&kind)
            .map(|(k, sql)| (*k, sql.as_str()))
            .ok_or_else(|| missing_table(kind))
    }

    fn collection(&self, kind: ScalarKind) -> Result<(&str, &str)> {
        self.collections
            .get(&kind)
            .map(|(delete, insert)| (delete.as_str(), insert.as_str()))
            .ok_or_else(|| missing_table(kind))
    }

    fn write_overview(&self, args: &mut SaveEventArgs, entity: &Entity, with_dates: bool) {
        let overview = entity.overview();
        let uuid = SqlValue::from(overview.uuid.as_str());
        let (created, modified) = if with_dates {
            (
                codec::encode_timestamp(&overview.date_created),
                codec::encode_timestamp(&overview.date_modified),
            )
        } else {
            (SqlValue::Null, SqlValue::Null)
        };
        let (kind, sql) = &self.overview;
        args.pre.batch_on(
            ConnectionSlot::Default,
            *kind,
            sql,
            vec![
                uuid.clone(),
                SqlValue::from(overview.edit_version),
                SqlValue::Integer(overview.type_id as i64),
                SqlValue::from(overview.parent_uuid.clone()),
                created,
                modified,
            ],
        );
        for type_id in entity.descriptor().chain() {
            args.pre
                .batch(&self.instance, vec![uuid.clone(), SqlValue::Integer(*type_id as i64)]);
        }
    }

    fn write_bindings(&self, args: &mut SaveEventArgs, owner: Row, children: &[SharedEntity]) {
        args.pre.batch(&self.binding_delete, owner.clone());
        for (sequence, child) in children.iter().enumerate() {
            let (child_uuid, child_version) = child.key();
            let mut row = owner.clone();
            row.push(SqlValue::Integer(sequence as i64));
            row.push(SqlValue::from(child_uuid));
            row.push(SqlValue::from(child_version));
            args.post.batch(&self.binding_insert, row);
        }
    }
}

fn missing_table(kind: ScalarKind) -> JdsError {
    JdsError::new(JdsErrorKind::Internal)
        .with_op("save")
        .with_message(format!("no statement rendered for {:?}", kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::schema::install_core_schema;
    use jds_core::kinds::{Integer, NestedCollection, Text};
    use jds_core::{EntityDecl, Field};

    const NAME: Field<Text> = Field::new(10, "name");
    const AGE: Field<Integer> = Field::new(11, "age");
    const CHILDREN: Field<NestedCollection> = Field::new(12, "children");

    fn registry() -> MetadataRegistry {
        let mut registry = MetadataRegistry::new();
        registry
            .register_type(
                EntityDecl::new(1, "Node")
                    .field(&NAME)
                    .field(&AGE)
                    .field(&CHILDREN),
            )
            .unwrap();
        registry
    }

    fn node(registry: &MetadataRegistry, name: &str) -> SharedEntity {
        let mut entity = registry.create(1).unwrap();
        entity.set(&NAME, name.to_string()).unwrap();
        SharedEntity::from(entity)
    }

    fn count(conn: &mut dyn SqlConnection, sql: &str) -> i64 {
        conn.query(sql, &[]).unwrap()[0][0].as_i64().unwrap()
    }

    #[test]
    fn test_plan_puts_children_before_parent() {
        // Given: a parent with two children
        let registry = registry();
        let parent = node(&registry, "p");
        let a = node(&registry, "a");
        let b = node(&registry, "b");
        parent
            .write()
            .set(&CHILDREN, vec![a.clone(), b.clone()])
            .unwrap();

        // When: planning the parent
        let mut ctx = SaveContext::new(0);
        ctx.plan(&registry, &parent, None, Utc::now()).unwrap();

        // Then: children first, each linked to the parent
        let order: Vec<String> = ctx.planned().iter().map(|p| p.handle.uuid()).collect();
        assert_eq!(order, vec![a.uuid(), b.uuid(), parent.uuid()]);
        assert_eq!(a.read().overview().parent_uuid, Some(parent.uuid()));
        assert_eq!(parent.read().edit_version(), 1);
    }

    #[test]
    fn test_revert_restores_versions() {
        let registry = registry();
        let entity = node(&registry, "x");
        let mut ctx = SaveContext::new(0);
        ctx.plan(&registry, &entity, None, Utc::now()).unwrap();
        assert_eq!(entity.read().edit_version(), 1);

        ctx.revert();

        assert_eq!(entity.read().edit_version(), 0);
    }

    #[test]
    fn test_save_writes_overview_and_values() {
        // Given: an installed schema and one entity with a set scalar
        let registry = registry();
        let mut conn = db::open_in_memory().unwrap();
        install_core_schema(&mut conn, false).unwrap();
        let entity = node(&registry, "solo");
        entity.write().set(&AGE, 42).unwrap();

        // When: saving it
        let engine = SaveEngine::new(&registry, JdsOptions::default());
        let report = engine.save(&[entity.clone()], &mut conn).unwrap();

        // Then: one overview row, one instance row, both scalars written
        assert_eq!(report.chunks_committed, 1);
        assert_eq!(report.instances_written, 1);
        assert_eq!(count(&mut conn, "SELECT COUNT(*) FROM jds_entity_overview"), 1);
        assert_eq!(count(&mut conn, "SELECT COUNT(*) FROM jds_entity_instance"), 1);
        assert_eq!(count(&mut conn, "SELECT value FROM jds_store_integer WHERE field_id = 11"), 42);
    }

    #[test]
    fn test_unknown_type_leaves_entity_untouched() {
        let registry = registry();
        let mut other = MetadataRegistry::new();
        other.register_type(EntityDecl::new(99, "Stranger")).unwrap();
        let stranger = SharedEntity::from(other.create(99).unwrap());
        let mut conn = db::open_in_memory().unwrap();
        install_core_schema(&mut conn, false).unwrap();

        let err = SaveEngine::new(&registry, JdsOptions::default())
            .save(&[stranger.clone()], &mut conn)
            .unwrap_err();

        assert_eq!(err.code(), "ERR_UNKNOWN_TYPE");
        assert_eq!(stranger.read().edit_version(), 0);
        assert!(err.request_id().is_some());
    }

    #[test]
    fn test_unknown_nested_type_restores_parent() {
        // Given: a registered parent whose child has a type the engine does not know
        let registry = registry();
        let mut other = MetadataRegistry::new();
        other.register_type(EntityDecl::new(99, "Stranger")).unwrap();
        let stranger = SharedEntity::from(other.create(99).unwrap());
        let parent = node(&registry, "parent");
        let sibling = node(&registry, "sibling");
        parent
            .write()
            .set(&CHILDREN, vec![sibling.clone(), stranger.clone()])
            .unwrap();
        let mut conn = db::open_in_memory().unwrap();
        install_core_schema(&mut conn, false).unwrap();

        // When: saving the parent
        let err = SaveEngine::new(&registry, JdsOptions::default())
            .save(&[parent.clone()], &mut conn)
            .unwrap_err();

        // Then: nothing written and every overview is as it was
        assert_eq!(err.code(), "ERR_UNKNOWN_TYPE");
        assert_eq!(count(&mut conn, "SELECT COUNT(*) FROM jds_entity_overview"), 0);
        assert_eq!(parent.read().edit_version(), 0);
        assert_eq!(sibling.read().edit_version(), 0);
        assert_eq!(sibling.read().overview().parent_uuid, None);
        assert_eq!(stranger.read().edit_version(), 0);
    }
}
