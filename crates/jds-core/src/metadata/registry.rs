use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Field, FieldDecl, ValueKind};
use crate::errors::{ModelError, Result};
use crate::kinds::FieldType;
use crate::model::Entity;

/// Registration record for one entity type
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDecl {
    pub type_id: u64,
    pub name: String,
    pub version: i32,
    pub parent: Option<u64>,
    pub fields: Vec<FieldDecl>,
}

impl EntityDecl {
    pub fn new(type_id: u64, name: impl Into<String>) -> Self {
        Self {
            type_id,
            name: name.into(),
            version: 1,
            parent: None,
            fields: Vec::new(),
        }
    }

    pub fn version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Single-inheritance parent; must be registered first
    pub fn parent(mut self, parent_type_id: u64) -> Self {
        self.parent = Some(parent_type_id);
        self
    }

    /// Declare a field through its typed handle
    pub fn field<K: FieldType>(mut self, field: &Field<K>) -> Self {
        self.fields.push(field.decl());
        self
    }

    /// Declare a field from a runtime declaration
    pub fn field_decl(mut self, decl: FieldDecl) -> Self {
        self.fields.push(decl);
        self
    }
}

/// Immutable, registered entity type
#[derive(Debug, PartialEq)]
pub struct TypeDescriptor {
    id: u64,
    name: String,
    version: i32,
    parent: Option<u64>,
    own_fields: Vec<FieldDecl>,
    fields: BTreeMap<u64, FieldDecl>,
    chain: Vec<u64>,
}

impl TypeDescriptor {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn parent(&self) -> Option<u64> {
        self.parent
    }

    /// This type followed by its ancestors, nearest first
    pub fn chain(&self) -> &[u64] {
        &self.chain
    }

    /// Fields declared directly on this type, by id
    pub fn own_fields(&self) -> &[FieldDecl] {
        &self.own_fields
    }

    /// Own and inherited fields, by id
    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.fields.values()
    }

    pub fn field(&self, field_id: u64) -> Option<&FieldDecl> {
        self.fields.get(&field_id)
    }

    pub fn is_a(&self, type_id: u64) -> bool {
        self.chain.contains(&type_id)
    }
}

/// The single source of entity and field metadata
///
/// Built once at startup through `register_type` and then shared by
/// reference with the save and load engines. Field ids form one global
/// dictionary: an id is bound to exactly one value kind across all types.
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    types: BTreeMap<u64, Arc<TypeDescriptor>>,
    fields: BTreeMap<u64, FieldDecl>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type
    ///
    /// Re-registering an identical declaration returns the existing
    /// descriptor. Nothing is recorded when an error is returned.
    ///
    /// # Errors
    ///
    /// - `ConflictingType`: type id already registered differently
    /// - `FieldKindConflict`: a field id is already bound to another kind
    /// - `UnknownParentType`: the parent type is not registered
    pub fn register_type(&mut self, decl: EntityDecl) -> Result<Arc<TypeDescriptor>> {
        let own_fields = normalize_fields(&decl.fields)?;

        if let Some(existing) = self.types.get(&decl.type_id) {
            let reason = if existing.name != decl.name {
                Some(format!("name '{}' vs '{}'", existing.name, decl.name))
            } else if existing.version != decl.version {
                Some(format!("version {} vs {}", existing.version, decl.version))
            } else if existing.parent != decl.parent {
                Some(format!("parent {:?} vs {:?}", existing.parent, decl.parent))
            } else if existing.own_fields != own_fields {
                Some("field set differs".to_string())
            } else {
                None
            };
            return match reason {
                None => Ok(Arc::clone(existing)),
                Some(reason) => Err(ModelError::ConflictingType {
                    type_id: decl.type_id,
                    reason,
                }),
            };
        }

        let parent = match decl.parent {
            Some(parent_id) => Some(self.types.get(&parent_id).cloned().ok_or(
                ModelError::UnknownParentType {
                    type_id: decl.type_id,
                    parent_id,
                },
            )?),
            None => None,
        };

        for field in &own_fields {
            if let Some(known) = self.fields.get(&field.id) {
                if known.kind != field.kind {
                    return Err(ModelError::FieldKindConflict {
                        field_id: field.id,
                        existing: known.kind,
                        requested: field.kind,
                    });
                }
            }
        }

        let mut fields = parent
            .as_ref()
            .map(|p| p.fields.clone())
            .unwrap_or_default();
        let mut chain = vec![decl.type_id];
        if let Some(p) = &parent {
            chain.extend_from_slice(&p.chain);
        }
        for field in &own_fields {
            fields.insert(field.id, field.clone());
            self.fields
                .entry(field.id)
                .or_insert_with(|| field.clone());
        }

        let descriptor = Arc::new(TypeDescriptor {
            id: decl.type_id,
            name: decl.name,
            version: decl.version,
            parent: decl.parent,
            own_fields,
            fields,
            chain,
        });
        tracing::debug!(
            type_id = descriptor.id,
            name = %descriptor.name,
            field_count = descriptor.fields.len(),
            "registered entity type"
        );
        self.types.insert(descriptor.id, Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Value kind a field id is bound to
    ///
    /// # Errors
    ///
    /// `UnknownField` if the id was never registered.
    pub fn resolve_value_kind(&self, field_id: u64) -> Result<ValueKind> {
        self.field(field_id).map(|f| f.kind)
    }

    /// # Errors
    ///
    /// `UnknownField` if the id was never registered.
    pub fn field(&self, field_id: u64) -> Result<&FieldDecl> {
        self.fields
            .get(&field_id)
            .ok_or(ModelError::UnknownField { field_id })
    }

    /// Descriptor of a concrete type, as carried by persisted data
    ///
    /// # Errors
    ///
    /// `UnknownType` if the id was never registered.
    pub fn type_descriptor(&self, type_id: u64) -> Result<Arc<TypeDescriptor>> {
        self.types
            .get(&type_id)
            .cloned()
            .ok_or(ModelError::UnknownType { type_id })
    }

    /// Create a fresh instance of a registered type
    ///
    /// # Errors
    ///
    /// `UnknownType` if the id was never registered.
    pub fn create(&self, type_id: u64) -> Result<Entity> {
        Ok(Entity::new(self.type_descriptor(type_id)?))
    }

    /// Registered types, by id
    pub fn types(&self) -> impl Iterator<Item = &Arc<TypeDescriptor>> {
        self.types.values()
    }

    /// Registered fields, by id
    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.fields.values()
    }

    /// The type itself plus every registered descendant
    pub fn subtypes_of(&self, type_id: u64) -> Vec<u64> {
        self.types
            .values()
            .filter(|t| t.is_a(type_id))
            .map(|t| t.id)
            .collect()
    }
}

fn normalize_fields(fields: &[FieldDecl]) -> Result<Vec<FieldDecl>> {
    let mut by_id: BTreeMap<u64, FieldDecl> = BTreeMap::new();
    for field in fields {
        if let Some(seen) = by_id.get(&field.id) {
            if seen.kind != field.kind {
                return Err(ModelError::FieldKindConflict {
                    field_id: field.id,
                    existing: seen.kind,
                    requested: field.kind,
                });
            }
            continue;
        }
        by_id.insert(field.id, field.clone());
    }
    Ok(by_id.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{Integer, Text};

    const NAME: Field<Text> = Field::new(1, "name");
    const AGE: Field<Integer> = Field::new(2, "age");

    #[test]
    fn test_chain_lists_self_then_ancestors() {
        let mut registry = MetadataRegistry::new();
        registry
            .register_type(EntityDecl::new(10, "Base").field(&NAME))
            .unwrap();
        registry
            .register_type(EntityDecl::new(11, "Mid").parent(10))
            .unwrap();
        let leaf = registry
            .register_type(EntityDecl::new(12, "Leaf").parent(11).field(&AGE))
            .unwrap();

        assert_eq!(leaf.chain(), &[12, 11, 10]);
        assert!(leaf.field(NAME.id()).is_some());
        assert_eq!(leaf.own_fields().len(), 1);
        assert_eq!(registry.subtypes_of(10), vec![10, 11, 12]);
    }

    #[test]
    fn test_duplicate_field_in_one_declaration_is_collapsed() {
        let mut registry = MetadataRegistry::new();
        let t = registry
            .register_type(EntityDecl::new(1, "T").field(&NAME).field(&NAME))
            .unwrap();
        assert_eq!(t.own_fields().len(), 1);
    }
}
