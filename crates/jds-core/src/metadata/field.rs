//! Field declarations and typed field handles

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

use super::ValueKind;
use crate::kinds::FieldType;

/// Runtime description of one field id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Globally unique field id
    pub id: u64,

    pub name: String,

    pub description: String,

    /// Value kind the id is permanently bound to
    pub kind: ValueKind,

    /// Declared (possibly abstract) target type of a nested-entity field
    pub target_type: Option<u64>,

    /// Variant names of an enum field, in ordinal order
    pub enum_values: Vec<String>,
}

impl FieldDecl {
    pub fn new(id: u64, name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            kind,
            target_type: None,
            enum_values: Vec::new(),
        }
    }
}

/// Typed handle for one field id
///
/// The marker `K` fixes the value kind at compile time, so
/// `entity.set(&NAME, 42)` on a text field does not compile. Handles are
/// meant to be declared once as constants:
///
/// ```
/// use jds_core::kinds::{CollectionOf, Integer, Text};
/// use jds_core::metadata::Field;
///
/// const STREET: Field<Text> = Field::new(1001, "street_name");
/// const LUCKY: Field<CollectionOf<Integer>> = Field::new(1002, "lucky_numbers")
///     .describe("Favourite integers, in order");
/// assert_eq!(STREET.id(), 1001);
/// assert_eq!(LUCKY.description(), "Favourite integers, in order");
/// ```
pub struct Field<K> {
    id: u64,
    name: &'static str,
    description: &'static str,
    target_type: Option<u64>,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Field<K> {
    pub const fn new(id: u64, name: &'static str) -> Self {
        Self {
            id,
            name,
            description: "",
            target_type: None,
            _kind: PhantomData,
        }
    }

    pub const fn describe(self, description: &'static str) -> Self {
        Self {
            id: self.id,
            name: self.name,
            description,
            target_type: self.target_type,
            _kind: PhantomData,
        }
    }

    /// Declared target type for nested-entity fields
    pub const fn with_target(self, type_id: u64) -> Self {
        Self {
            id: self.id,
            name: self.name,
            description: self.description,
            target_type: Some(type_id),
            _kind: PhantomData,
        }
    }

    pub const fn id(&self) -> u64 {
        self.id
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn description(&self) -> &'static str {
        self.description
    }

    pub const fn target_type(&self) -> Option<u64> {
        self.target_type
    }
}

impl<K: FieldType> Field<K> {
    pub fn kind(&self) -> ValueKind {
        K::KIND
    }

    /// Runtime declaration used for registration
    pub fn decl(&self) -> FieldDecl {
        FieldDecl {
            id: self.id,
            name: self.name.to_string(),
            description: self.description.to_string(),
            kind: K::KIND,
            target_type: self.target_type,
            enum_values: K::enum_values(),
        }
    }
}

impl<K> Clone for Field<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Field<K> {}

impl<K> fmt::Debug for Field<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
