use std::collections::BTreeMap;
use std::sync::Arc;

use super::overview::Overview;
use super::value::{Scalar, Value};
use crate::errors::{ModelError, Result};
use crate::kinds::{CollectionOf, FieldType, ScalarType};
use crate::metadata::{Field, TypeDescriptor};

/// Entity - one instance of a registered entity type
///
/// Holds the overview plus a flat map of field id → value. Fields inherited
/// from ancestor types are just entries whose ids an ancestor declared;
/// there is no subclassing.
///
/// Collection fields start out empty rather than absent, so an empty list
/// survives a save/load round trip. Unset scalar fields stay absent and
/// read as their kind's default through `get_or_default`.
#[derive(Debug, Clone)]
pub struct Entity {
    overview: Overview,
    descriptor: Arc<TypeDescriptor>,
    values: BTreeMap<u64, Value>,
}

impl Entity {
    /// Create a fresh, never-saved instance of the described type
    pub fn new(descriptor: Arc<TypeDescriptor>) -> Self {
        let overview = Overview::new(descriptor.id());
        Self::with_overview(descriptor, overview)
    }

    /// Create an instance around an existing overview (used by the load engine)
    pub fn with_overview(descriptor: Arc<TypeDescriptor>, mut overview: Overview) -> Self {
        overview.type_id = descriptor.id();
        let values = descriptor
            .fields()
            .filter_map(|f| Value::empty(f.kind).map(|v| (f.id, v)))
            .collect();
        Self {
            overview,
            descriptor,
            values,
        }
    }

    pub fn overview(&self) -> &Overview {
        &self.overview
    }

    pub fn overview_mut(&mut self) -> &mut Overview {
        &mut self.overview
    }

    pub fn uuid(&self) -> &str {
        &self.overview.uuid
    }

    pub fn edit_version(&self) -> i32 {
        self.overview.edit_version
    }

    pub fn type_id(&self) -> u64 {
        self.descriptor.id()
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    /// Whether this instance's type is `type_id` or descends from it
    pub fn is_a(&self, type_id: u64) -> bool {
        self.descriptor.is_a(type_id)
    }

    /// Set a field through its typed handle
    ///
    /// # Errors
    ///
    /// `UndeclaredField` if the field is not declared on this type chain,
    /// `KindMismatch` if the handle's kind differs from the declaration.
    pub fn set<K: FieldType>(&mut self, field: &Field<K>, value: K::Value) -> Result<()> {
        self.set_value(field.id(), K::into_value(value))
    }

    /// Read a field through its typed handle; `None` when unset
    pub fn get<K: FieldType>(&self, field: &Field<K>) -> Option<K::Value> {
        self.values.get(&field.id()).and_then(K::from_value)
    }

    /// Read a scalar field, falling back to its kind's default when unset
    pub fn get_or_default<S>(&self, field: &Field<S>) -> S::Native
    where
        S: ScalarType + FieldType<Value = <S as ScalarType>::Native>,
    {
        self.get(field).unwrap_or_else(S::default_native)
    }

    /// Append one element to a scalar collection field
    ///
    /// # Errors
    ///
    /// Same as [`Entity::set`].
    pub fn push<S: ScalarType>(
        &mut self,
        field: &Field<CollectionOf<S>>,
        item: S::Native,
    ) -> Result<()> {
        self.check_declared(field.id(), &<CollectionOf<S> as FieldType>::KIND)?;
        match self.values.get_mut(&field.id()) {
            Some(Value::Collection(_, items)) => items.push(S::into_scalar(item)),
            _ => {
                self.values.insert(
                    field.id(),
                    Value::Collection(S::SCALAR, vec![S::into_scalar(item)]),
                );
            }
        }
        Ok(())
    }

    /// Set a field by id after checking it against the type declaration
    ///
    /// # Errors
    ///
    /// `UndeclaredField` or `KindMismatch` as for [`Entity::set`].
    pub fn set_value(&mut self, field_id: u64, value: Value) -> Result<()> {
        let found = value.kind();
        self.check_declared(field_id, &found)?;
        if !value.is_homogeneous() {
            return Err(ModelError::KindMismatch {
                field_id,
                expected: found,
                found,
            });
        }
        self.values.insert(field_id, value);
        Ok(())
    }

    /// Unset a field; collection fields go back to empty
    pub fn clear(&mut self, field_id: u64) {
        match self.descriptor.field(field_id).and_then(|f| Value::empty(f.kind)) {
            Some(empty) => {
                self.values.insert(field_id, empty);
            }
            None => {
                self.values.remove(&field_id);
            }
        }
    }

    pub fn value(&self, field_id: u64) -> Option<&Value> {
        self.values.get(&field_id)
    }

    /// Every set field, in field id order
    pub fn values(&self) -> impl Iterator<Item = (u64, &Value)> {
        self.values.iter().map(|(id, v)| (*id, v))
    }

    /// Scalar value of a field, if set and scalar
    pub fn scalar(&self, field_id: u64) -> Option<&Scalar> {
        match self.values.get(&field_id) {
            Some(Value::Scalar(s)) => Some(s),
            _ => None,
        }
    }

    fn check_declared(&self, field_id: u64, found: &crate::metadata::ValueKind) -> Result<()> {
        let decl = self
            .descriptor
            .field(field_id)
            .ok_or(ModelError::UndeclaredField {
                type_id: self.descriptor.id(),
                field_id,
            })?;
        if decl.kind != *found {
            return Err(ModelError::KindMismatch {
                field_id,
                expected: decl.kind,
                found: *found,
            });
        }
        Ok(())
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.overview == other.overview
            && self.descriptor.id() == other.descriptor.id()
            && self.values == other.values
    }
}
