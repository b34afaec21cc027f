//! Entity Metadata Model
//!
//! - Value kinds every field id is bound to
//! - Typed field handles and runtime field declarations
//! - The metadata registry: entity types, inheritance chains and the
//!   global field dictionary

mod field;
mod registry;
mod value_kind;

pub use field::{Field, FieldDecl};
pub use registry::{EntityDecl, MetadataRegistry, TypeDescriptor};
pub use value_kind::{ScalarKind, ValueKind};
