//! Value kinds: the logical type every field id is permanently bound to

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar value kinds
///
/// Each kind is backed by one physical value table and one collection
/// table in the persisted schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Text,
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    Blob,
    Date,
    DateTime,
    ZonedDateTime,
    Time,
    Duration,
    Period,
    YearMonth,
    MonthDay,
    Enum,
}

impl ScalarKind {
    /// Every scalar kind, in table-creation order
    pub const ALL: [ScalarKind; 16] = [
        ScalarKind::Text,
        ScalarKind::Integer,
        ScalarKind::Long,
        ScalarKind::Float,
        ScalarKind::Double,
        ScalarKind::Boolean,
        ScalarKind::Blob,
        ScalarKind::Date,
        ScalarKind::DateTime,
        ScalarKind::ZonedDateTime,
        ScalarKind::Time,
        ScalarKind::Duration,
        ScalarKind::Period,
        ScalarKind::YearMonth,
        ScalarKind::MonthDay,
        ScalarKind::Enum,
    ];

    /// Lowercase stem used in table and procedure names
    pub fn stem(&self) -> &'static str {
        match self {
            ScalarKind::Text => "text",
            ScalarKind::Integer => "integer",
            ScalarKind::Long => "long",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Blob => "blob",
            ScalarKind::Date => "date",
            ScalarKind::DateTime => "date_time",
            ScalarKind::ZonedDateTime => "zoned_date_time",
            ScalarKind::Time => "time",
            ScalarKind::Duration => "duration",
            ScalarKind::Period => "period",
            ScalarKind::YearMonth => "year_month",
            ScalarKind::MonthDay => "month_day",
            ScalarKind::Enum => "enum",
        }
    }

    fn ordinal(&self) -> i32 {
        Self::ALL
            .iter()
            .position(|k| k == self)
            .map(|p| p as i32)
            .unwrap_or(0)
    }
}

/// The value kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Scalar(ScalarKind),
    Collection(ScalarKind),
    /// Reference to a single nested entity
    Entity,
    /// Ordered references to nested entities
    EntityCollection,
}

impl ValueKind {
    /// Stable numeric code written to the field-type reference table
    ///
    /// Scalars occupy 1..=16, their collections 101..=116, nested kinds 200/201.
    pub fn code(&self) -> i32 {
        match self {
            ValueKind::Scalar(k) => 1 + k.ordinal(),
            ValueKind::Collection(k) => 101 + k.ordinal(),
            ValueKind::Entity => 200,
            ValueKind::EntityCollection => 201,
        }
    }

    /// Every value kind, in code order
    pub fn all() -> impl Iterator<Item = ValueKind> {
        ScalarKind::ALL
            .iter()
            .map(|k| ValueKind::Scalar(*k))
            .chain(ScalarKind::ALL.iter().map(|k| ValueKind::Collection(*k)))
            .chain([ValueKind::Entity, ValueKind::EntityCollection])
    }

    /// Upper-case name written to the field-type reference table
    pub fn name(&self) -> String {
        match self {
            ValueKind::Scalar(k) => k.stem().to_uppercase(),
            ValueKind::Collection(k) => format!("{}_COLLECTION", k.stem().to_uppercase()),
            ValueKind::Entity => "ENTITY".to_string(),
            ValueKind::EntityCollection => "ENTITY_COLLECTION".to_string(),
        }
    }

    pub fn scalar(&self) -> Option<ScalarKind> {
        match self {
            ValueKind::Scalar(k) | ValueKind::Collection(k) => Some(*k),
            ValueKind::Entity | ValueKind::EntityCollection => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, ValueKind::Collection(_) | ValueKind::EntityCollection)
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, ValueKind::Entity | ValueKind::EntityCollection)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_unique() {
        let codes: HashSet<i32> = ValueKind::all().map(|k| k.code()).collect();
        assert_eq!(codes.len(), 34);
    }

    #[test]
    fn test_names() {
        assert_eq!(ValueKind::Scalar(ScalarKind::ZonedDateTime).name(), "ZONED_DATE_TIME");
        assert_eq!(ValueKind::Collection(ScalarKind::Enum).name(), "ENUM_COLLECTION");
        assert_eq!(ValueKind::EntityCollection.to_string(), "ENTITY_COLLECTION");
    }

    #[test]
    fn test_scalar_projection() {
        assert_eq!(
            ValueKind::Collection(ScalarKind::Long).scalar(),
            Some(ScalarKind::Long)
        );
        assert_eq!(ValueKind::Entity.scalar(), None);
        assert!(ValueKind::EntityCollection.is_collection());
        assert!(!ValueKind::Scalar(ScalarKind::Blob).is_collection());
    }
}
