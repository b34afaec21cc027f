//! Shared ownership of entity instances
//!
//! Nested objects referenced from several parents are materialized once and
//! shared by handle, so a `SharedEntity` compares by persisted identity
//! rather than by content.

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::entity::Entity;

#[derive(Clone)]
pub struct SharedEntity(Arc<RwLock<Entity>>);

impl SharedEntity {
    pub fn new(entity: Entity) -> Self {
        Self(Arc::new(RwLock::new(entity)))
    }

    /// Read access; a poisoned lock still yields the last written state
    pub fn read(&self) -> RwLockReadGuard<'_, Entity> {
        self.0.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Entity> {
        self.0.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether both handles point at the same in-memory instance
    pub fn ptr_eq(a: &SharedEntity, b: &SharedEntity) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn uuid(&self) -> String {
        self.read().uuid().to_string()
    }

    /// `(uuid, edit_version)` composite key
    pub fn key(&self) -> (String, i32) {
        self.read().overview().key()
    }

    pub fn type_id(&self) -> u64 {
        self.read().type_id()
    }
}

impl From<Entity> for SharedEntity {
    fn from(entity: Entity) -> Self {
        SharedEntity::new(entity)
    }
}

impl PartialEq for SharedEntity {
    fn eq(&self, other: &Self) -> bool {
        SharedEntity::ptr_eq(self, other) || self.key() == other.key()
    }
}

impl fmt::Debug for SharedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (uuid, edit_version) = self.key();
        f.debug_struct("SharedEntity")
            .field("uuid", &uuid)
            .field("edit_version", &edit_version)
            .finish()
    }
}
