//! Page-wise population of loaded instances

#![allow(clippy::result_large_err)]

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use jds_core::errors::JdsError;
use jds_core::{Entity, MetadataRegistry, Overview, Scalar, ScalarKind, SharedEntity, Value, ValueKind};

use super::filter::{Binder, IN_LIST_LIMIT, OVERVIEW_SELECT};
use crate::codec;
use crate::connection::{Row, SqlConnection, SqlValue};
use crate::errors::{codec_error, population_error, Result};
use crate::events::{execute_batches, Connections, EventArguments, LoadListener};
use crate::schema::tables;

type Key = (String, i32);

/// Lazily populated sequence of loaded instances
///
/// Overview rows are fetched up front; field values are fetched one page
/// at a time as the stream is consumed. Nested instances are shared across
/// the whole stream: an instance referenced twice is loaded once and both
/// references point at the same [`SharedEntity`].
///
/// The first error ends the stream.
pub struct EntityStream<'a> {
    registry: &'a MetadataRegistry,
    conn: &'a mut dyn SqlConnection,
    listeners: &'a [Box<dyn LoadListener>],
    pending: VecDeque<Overview>,
    page_size: usize,
    cache: HashMap<Key, SharedEntity>,
    ready: VecDeque<SharedEntity>,
    pages: usize,
    failed: bool,
}

impl<'a> EntityStream<'a> {
    pub(crate) fn new(
        registry: &'a MetadataRegistry,
        conn: &'a mut dyn SqlConnection,
        listeners: &'a [Box<dyn LoadListener>],
        overviews: Vec<Overview>,
        page_size: usize,
    ) -> Self {
        Self {
            registry,
            conn,
            listeners,
            pending: overviews.into(),
            page_size: page_size.max(1),
            cache: HashMap::new(),
            ready: VecDeque::new(),
            pages: 0,
            failed: false,
        }
    }

    /// Top-level instances not yet yielded
    pub fn remaining(&self) -> usize {
        self.pending.len() + self.ready.len()
    }

    fn next_page(&mut self) -> Result<()> {
        let take = self.page_size.min(self.pending.len());
        let overviews: Vec<Overview> = self.pending.drain(..take).collect();
        let page = self.materialize(overviews)?;
        self.notify(&page)?;
        self.pages += 1;
        tracing::debug!(
            page = self.pages,
            instances = page.len(),
            cached = self.cache.len(),
            "loaded page"
        );
        self.ready.extend(page);
        Ok(())
    }

    fn notify(&mut self, page: &[SharedEntity]) -> Result<()> {
        if self.listeners.is_empty() {
            return Ok(());
        }
        let mut args = EventArguments::new();
        for entity in page {
            for listener in self.listeners {
                listener.on_post_load(&mut args, entity)?;
            }
        }
        if args.is_empty() {
            return Ok(());
        }
        let mut connections = Connections::new(&mut *self.conn);
        execute_batches(&mut connections, &[&args]).map(|_| ())
    }

    /// Instances for `overviews`, reusing cached ones, populating new ones
    fn materialize(&mut self, overviews: Vec<Overview>) -> Result<Vec<SharedEntity>> {
        let mut instances = Vec::with_capacity(overviews.len());
        let mut fresh = Vec::new();
        for overview in overviews {
            let key = overview.key();
            if let Some(existing) = self.cache.get(&key) {
                instances.push(existing.clone());
                continue;
            }
            let descriptor = self
                .registry
                .type_descriptor(overview.type_id)
                .map_err(|e| JdsError::from(e).with_entity_id(overview.uuid.clone()))?;
            let entity = SharedEntity::from(Entity::with_overview(descriptor, overview));
            self.cache.insert(key, entity.clone());
            instances.push(entity.clone());
            fresh.push(entity);
        }
        self.populate(&fresh)?;
        Ok(instances)
    }

    /// Fill the fields of freshly created instances
    ///
    /// Instances are cached before this runs, so bindings that lead back
    /// to them resolve to the cached handle instead of recursing.
    fn populate(&mut self, batch: &[SharedEntity]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut scalars = BTreeSet::new();
        let mut collections = BTreeSet::new();
        let mut nested = false;
        let mut index: HashMap<Key, SharedEntity> = HashMap::with_capacity(batch.len());
        for entity in batch {
            let guard = entity.read();
            for field in guard.descriptor().fields() {
                match field.kind {
                    ValueKind::Scalar(kind) => {
                        scalars.insert(kind);
                    }
                    ValueKind::Collection(kind) => {
                        collections.insert(kind);
                    }
                    ValueKind::Entity | ValueKind::EntityCollection => nested = true,
                }
            }
            index.insert(guard.overview().key(), entity.clone());
        }

        let keys: Vec<Key> = index.keys().cloned().collect();
        let mut bindings: BTreeMap<(Key, u64), Vec<Key>> = BTreeMap::new();
        for chunk in keys.chunks(IN_LIST_LIMIT) {
            for kind in &scalars {
                self.load_scalars(*kind, chunk, &index)?;
            }
            for kind in &collections {
                self.load_collection(*kind, chunk, &index)?;
            }
            if nested {
                self.load_bindings(chunk, &index, &mut bindings)?;
            }
        }
        if !bindings.is_empty() {
            self.attach(&index, bindings)?;
        }
        Ok(())
    }

    /// Rows of `table` owned by any of `keys`, filtered to exact key matches
    ///
    /// `columns` names the owner uuid and edit version columns of `table`.
    fn owned_rows(&mut self, table: &str, columns: [&str; 2], rest: &str, keys: &[Key]) -> Result<Vec<Row>> {
        let dialect = self.conn.dialect().adapter();
        let mut binder = Binder::new(dialect);
        let uuids: BTreeSet<&str> = keys.iter().map(|(u, _)| u.as_str()).collect();
        let versions: BTreeSet<i32> = keys.iter().map(|(_, v)| *v).collect();
        let uuid_list = binder.bind_all(uuids.iter().map(|u| SqlValue::from(*u)));
        let version_list = binder.bind_all(versions.iter().map(|v| SqlValue::from(*v)));
        let [owner_uuid, owner_version] = columns;
        let sql = format!(
            "SELECT {u}, {v}, {rest} FROM {table} WHERE {u} IN ({uuid_list}) AND {v} IN ({version_list}) \
             ORDER BY {u}, {v}, field_id{sequence}",
            u = owner_uuid,
            v = owner_version,
            rest = rest,
            table = table,
            uuid_list = uuid_list,
            version_list = version_list,
            sequence = if rest.contains("sequence") { ", sequence" } else { "" },
        );
        let wanted: BTreeSet<(&str, i32)> = keys.iter().map(|(u, v)| (u.as_str(), *v)).collect();
        let rows = self.conn.query(&sql, &binder.into_params())?;
        Ok(rows
            .into_iter()
            .filter(|row| {
                match (row.first().and_then(SqlValue::as_str), row.get(1).and_then(SqlValue::as_i64)) {
                    (Some(uuid), Some(version)) => wanted.contains(&(uuid, version as i32)),
                    _ => false,
                }
            })
            .collect())
    }

    fn load_scalars(&mut self, kind: ScalarKind, keys: &[Key], index: &HashMap<Key, SharedEntity>) -> Result<()> {
        let table = tables::value_table(kind);
        let rows = self.owned_rows(&table, ["uuid", "edit_version"], "field_id, value", keys)?;
        for row in rows {
            let (key, field_id) = owner(&row)?;
            let Some(entity) = index.get(&key) else { continue };
            self.expect_kind(&key.0, field_id, ValueKind::Scalar(kind))?;
            let stored = match row.get(3) {
                Some(value) if !value.is_null() => value,
                _ => continue,
            };
            let scalar = codec::decode(kind, stored)
                .map_err(|e| population_error(&key.0, field_id, e.message()))?;
            entity
                .write()
                .set_value(field_id, Value::Scalar(scalar))
                .map_err(|e| population_error(&key.0, field_id, &e.to_string()))?;
        }
        Ok(())
    }

    fn load_collection(
        &mut self,
        kind: ScalarKind,
        keys: &[Key],
        index: &HashMap<Key, SharedEntity>,
    ) -> Result<()> {
        let table = tables::collection_table(kind);
        let rows = self.owned_rows(
            &table,
            ["uuid", "edit_version"],
            "field_id, sequence, value",
            keys,
        )?;
        let mut grouped: BTreeMap<(Key, u64), Vec<Scalar>> = BTreeMap::new();
        for row in rows {
            let (key, field_id) = owner(&row)?;
            self.expect_kind(&key.0, field_id, ValueKind::Collection(kind))?;
            let stored = match row.get(4) {
                Some(value) if !value.is_null() => value,
                _ => continue,
            };
            let item = codec::decode(kind, stored)
                .map_err(|e| population_error(&key.0, field_id, e.message()))?;
            grouped.entry((key, field_id)).or_default().push(item);
        }
        for ((key, field_id), items) in grouped {
            let Some(entity) = index.get(&key) else { continue };
            entity
                .write()
                .set_value(field_id, Value::Collection(kind, items))
                .map_err(|e| population_error(&key.0, field_id, &e.to_string()))?;
        }
        Ok(())
    }

    fn load_bindings(
        &mut self,
        keys: &[Key],
        index: &HashMap<Key, SharedEntity>,
        bindings: &mut BTreeMap<(Key, u64), Vec<Key>>,
    ) -> Result<()> {
        let rows = self.owned_rows(
            tables::BINDING_TABLE,
            ["parent_uuid", "parent_edit_version"],
            "field_id, sequence, child_uuid, child_edit_version",
            keys,
        )?;
        for row in rows {
            let (key, field_id) = owner(&row)?;
            if !index.contains_key(&key) {
                continue;
            }
            let child = match (row.get(4).and_then(SqlValue::as_str), row.get(5).and_then(SqlValue::as_i64)) {
                (Some(uuid), Some(version)) => (uuid.to_string(), version as i32),
                _ => return Err(population_error(&key.0, field_id, "binding without child key")),
            };
            bindings.entry((key, field_id)).or_default().push(child);
        }
        Ok(())
    }

    /// Load missing children, then set every nested field of the batch
    fn attach(&mut self, index: &HashMap<Key, SharedEntity>, bindings: BTreeMap<(Key, u64), Vec<Key>>) -> Result<()> {
        let missing: BTreeSet<Key> = bindings
            .values()
            .flatten()
            .filter(|key| !self.cache.contains_key(*key))
            .cloned()
            .collect();
        if !missing.is_empty() {
            let overviews = self.child_overviews(&missing)?;
            self.materialize(overviews)?;
        }

        for ((key, field_id), child_keys) in bindings {
            let Some(entity) = index.get(&key) else { continue };
            let kind = self.registry.resolve_value_kind(field_id)?;
            let mut children = Vec::with_capacity(child_keys.len());
            for child_key in &child_keys {
                match self.cache.get(child_key) {
                    Some(child) => children.push(child.clone()),
                    None => tracing::warn!(
                        uuid = %key.0,
                        field_id,
                        child_uuid = %child_key.0,
                        child_edit_version = child_key.1,
                        "nested instance not found, skipped"
                    ),
                }
            }
            let value = match kind {
                ValueKind::EntityCollection => Value::Entities(children),
                ValueKind::Entity => match children.into_iter().next() {
                    Some(child) => Value::Entity(child),
                    None => continue,
                },
                other => {
                    return Err(population_error(
                        &key.0,
                        field_id,
                        &format!("binding row for {} field", other),
                    ))
                }
            };
            entity
                .write()
                .set_value(field_id, value)
                .map_err(|e| population_error(&key.0, field_id, &e.to_string()))?;
        }
        Ok(())
    }

    fn child_overviews(&mut self, keys: &BTreeSet<Key>) -> Result<Vec<Overview>> {
        let dialect = self.conn.dialect().adapter();
        let uuids: BTreeSet<&str> = keys.iter().map(|(u, _)| u.as_str()).collect();
        let uuids: Vec<&str> = uuids.into_iter().collect();
        let mut overviews = Vec::with_capacity(keys.len());
        for chunk in uuids.chunks(IN_LIST_LIMIT) {
            let mut binder = Binder::new(dialect);
            let list = binder.bind_all(chunk.iter().map(|u| SqlValue::from(*u)));
            let sql = format!("{} WHERE o.uuid IN ({})", OVERVIEW_SELECT, list);
            for row in self.conn.query(&sql, &binder.into_params())? {
                let overview = overview_from_row(&row)?;
                if keys.contains(&overview.key()) {
                    overviews.push(overview);
                }
            }
        }
        Ok(overviews)
    }

    /// Stored kind must equal the registered kind of the field
    fn expect_kind(&self, uuid: &str, field_id: u64, stored: ValueKind) -> Result<()> {
        let registered = self.registry.resolve_value_kind(field_id)?;
        if registered != stored {
            return Err(population_error(
                uuid,
                field_id,
                &format!("stored as {} but registered as {}", stored, registered),
            ));
        }
        Ok(())
    }
}

impl Iterator for EntityStream<'_> {
    type Item = Result<SharedEntity>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.ready.is_empty() && !self.pending.is_empty() {
            if let Err(err) = self.next_page() {
                self.failed = true;
                self.pending.clear();
                return Some(Err(err));
            }
        }
        self.ready.pop_front().map(Ok)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.remaining()))
        }
    }
}

fn owner(row: &Row) -> Result<(Key, u64)> {
    match (
        row.first().and_then(SqlValue::as_str),
        row.get(1).and_then(SqlValue::as_i64),
        row.get(2).and_then(SqlValue::as_i64),
    ) {
        (Some(uuid), Some(version), Some(field_id)) => {
            Ok(((uuid.to_string(), version as i32), field_id as u64))
        }
        _ => Err(codec_error("row without owner key")),
    }
}

/// Decode one `OVERVIEW_SELECT` row
pub(crate) fn overview_from_row(row: &Row) -> Result<Overview> {
    let text = |i: usize| row.get(i).and_then(SqlValue::as_str).map(str::to_string);
    let int = |i: usize| row.get(i).and_then(SqlValue::as_i64);
    let time = |i: usize| {
        row.get(i)
            .and_then(codec::decode_timestamp)
            .unwrap_or_else(DateTime::<Utc>::default)
    };
    match (text(0), int(1), int(2)) {
        (Some(uuid), Some(edit_version), Some(type_id)) => Ok(Overview {
            uuid,
            edit_version: edit_version as i32,
            type_id: type_id as u64,
            parent_uuid: text(3),
            date_created: time(4),
            date_modified: time(5),
        }),
        _ => Err(codec_error("overview row without key")),
    }
}
