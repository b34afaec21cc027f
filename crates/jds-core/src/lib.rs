//! JDS Core - entity metadata and in-memory entity model
//!
//! This crate provides the database-independent half of the JDS
//! persistence layer:
//! - Metadata registry: entity types, inheritance chains, global field dictionary
//! - Typed field handles (`Field<K>`) checked against value kinds at compile time
//! - Entity instances (overview + flat field map) and shared nested handles
//! - Structured error and logging facilities shared with `jds-store`
//! - Engine options loaded from TOML

pub mod errors;
pub mod kinds;
pub mod logging_facility;
pub mod metadata;
pub mod model;
pub mod options;
pub mod temporal;

// Re-export commonly used types
pub use errors::{JdsError, JdsErrorKind, ModelError, Result};
pub use kinds::{FieldType, PersistedEnum, ScalarType};
pub use metadata::{EntityDecl, Field, FieldDecl, MetadataRegistry, ScalarKind, TypeDescriptor, ValueKind};
pub use model::{Entity, Overview, Scalar, SharedEntity, Value};
pub use options::JdsOptions;
pub use temporal::{MonthDay, Period, YearMonth};
