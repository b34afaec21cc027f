use std::collections::HashSet;

use chrono::{DateTime, Utc};
use jds_core::errors::JdsError;
use jds_core::{Entity, MetadataRegistry, Overview, SharedEntity};

use crate::errors::Result;

/// Lifecycle of one chunk
///
/// `Committed` and `RolledBack` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Pending,
    OverviewWritten,
    FieldsBatched,
    Committed,
    RolledBack,
}

/// One instance scheduled for writing
#[derive(Debug)]
pub(crate) struct PlannedEntity {
    pub handle: SharedEntity,
    /// State written by this chunk (new edit version, parent link)
    pub snapshot: Entity,
}

/// Transaction context for one chunk
///
/// Holds the flattened save plan for the chunk's instances and every
/// nested instance reachable from them. Recursion into nested entities
/// happens while planning, against this context, so the whole graph ends
/// up in the same statement groups and the same transaction.
#[derive(Debug)]
pub struct SaveContext {
    chunk_index: usize,
    state: SaveState,
    visited: HashSet<String>,
    planned: Vec<PlannedEntity>,
    /// Overviews as they were before this chunk bumped them, in bump order
    touched: Vec<(SharedEntity, Overview)>,
}

impl SaveContext {
    pub fn new(chunk_index: usize) -> Self {
        Self {
            chunk_index,
            state: SaveState::Pending,
            visited: HashSet::new(),
            planned: Vec::new(),
            touched: Vec::new(),
        }
    }

    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    /// Instances planned so far, nested ones included
    pub fn planned_count(&self) -> usize {
        self.planned.len()
    }

    pub(crate) fn planned(&self) -> &[PlannedEntity] {
        &self.planned
    }

    pub(crate) fn advance(&mut self, next: SaveState) {
        tracing::trace!(
            chunk_index = self.chunk_index,
            from = ?self.state,
            to = ?next,
            "chunk state"
        );
        self.state = next;
    }

    /// Plan `entity` and, depth first, every nested instance it references
    ///
    /// Each instance is planned once per chunk: its edit version is bumped,
    /// its modification time set and nested children get their parent
    /// link. Children land in the plan before their parent.
    ///
    /// # Errors
    ///
    /// `UnknownType` if an instance's type is not in `registry`.
    pub(crate) fn plan(
        &mut self,
        registry: &MetadataRegistry,
        entity: &SharedEntity,
        parent_uuid: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let uuid = entity.uuid();
        if !self.visited.insert(uuid.clone()) {
            return Ok(());
        }

        let children = {
            let mut guard = entity.write();
            registry
                .type_descriptor(guard.type_id())
                .map_err(|e| JdsError::from(e).with_entity_id(uuid.clone()))?;
            self.touched.push((entity.clone(), guard.overview().clone()));
            let overview = guard.overview_mut();
            overview.edit_version += 1;
            overview.date_modified = now;
            if let Some(parent) = parent_uuid {
                overview.parent_uuid = Some(parent.to_string());
            }
            let children: Vec<SharedEntity> = guard
                .values()
                .flat_map(|(_, value)| value.nested().iter().cloned())
                .collect();
            children
        };

        for child in &children {
            self.plan(registry, child, Some(&uuid), now)?;
        }

        let snapshot = entity.read().clone();
        tracing::trace!(
            uuid = %uuid,
            edit_version = snapshot.edit_version(),
            nested = parent_uuid.is_some(),
            "planned instance"
        );
        self.planned.push(PlannedEntity {
            handle: entity.clone(),
            snapshot,
        });
        Ok(())
    }

    /// Put back the overview of every instance this chunk bumped
    ///
    /// Covers instances whose planning was cut short by a failing child.
    pub(crate) fn revert(&mut self) {
        for (handle, previous) in self.touched.iter().rev() {
            *handle.write().overview_mut() = previous.clone();
        }
    }
}
