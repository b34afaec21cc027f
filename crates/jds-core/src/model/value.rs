//! Field values held by an entity instance

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

use super::shared::SharedEntity;
use crate::metadata::{ScalarKind, ValueKind};
use crate::temporal::{MonthDay, Period, YearMonth};

/// One scalar value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Blob(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    ZonedDateTime(DateTime<FixedOffset>),
    Time(NaiveTime),
    Duration(Duration),
    Period(Period),
    YearMonth(YearMonth),
    MonthDay(MonthDay),
    /// Enum ordinal
    Enum(u32),
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Text(_) => ScalarKind::Text,
            Scalar::Integer(_) => ScalarKind::Integer,
            Scalar::Long(_) => ScalarKind::Long,
            Scalar::Float(_) => ScalarKind::Float,
            Scalar::Double(_) => ScalarKind::Double,
            Scalar::Boolean(_) => ScalarKind::Boolean,
            Scalar::Blob(_) => ScalarKind::Blob,
            Scalar::Date(_) => ScalarKind::Date,
            Scalar::DateTime(_) => ScalarKind::DateTime,
            Scalar::ZonedDateTime(_) => ScalarKind::ZonedDateTime,
            Scalar::Time(_) => ScalarKind::Time,
            Scalar::Duration(_) => ScalarKind::Duration,
            Scalar::Period(_) => ScalarKind::Period,
            Scalar::YearMonth(_) => ScalarKind::YearMonth,
            Scalar::MonthDay(_) => ScalarKind::MonthDay,
            Scalar::Enum(_) => ScalarKind::Enum,
        }
    }

    /// The value an unset field of this kind reads as
    pub fn default_for(kind: ScalarKind) -> Scalar {
        match kind {
            ScalarKind::Text => Scalar::Text(String::new()),
            ScalarKind::Integer => Scalar::Integer(0),
            ScalarKind::Long => Scalar::Long(0),
            ScalarKind::Float => Scalar::Float(0.0),
            ScalarKind::Double => Scalar::Double(0.0),
            ScalarKind::Boolean => Scalar::Boolean(false),
            ScalarKind::Blob => Scalar::Blob(Vec::new()),
            ScalarKind::Date => Scalar::Date(NaiveDate::default()),
            ScalarKind::DateTime => Scalar::DateTime(NaiveDateTime::default()),
            ScalarKind::ZonedDateTime => Scalar::ZonedDateTime(DateTime::<FixedOffset>::default()),
            ScalarKind::Time => Scalar::Time(NaiveTime::default()),
            ScalarKind::Duration => Scalar::Duration(Duration::zero()),
            ScalarKind::Period => Scalar::Period(Period::default()),
            ScalarKind::YearMonth => Scalar::YearMonth(YearMonth::default()),
            ScalarKind::MonthDay => Scalar::MonthDay(MonthDay::default()),
            ScalarKind::Enum => Scalar::Enum(0),
        }
    }
}

/// The content of one field slot
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Collection(ScalarKind, Vec<Scalar>),
    Entity(SharedEntity),
    Entities(Vec<SharedEntity>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Scalar(s) => ValueKind::Scalar(s.kind()),
            Value::Collection(k, _) => ValueKind::Collection(*k),
            Value::Entity(_) => ValueKind::Entity,
            Value::Entities(_) => ValueKind::EntityCollection,
        }
    }

    /// Empty container for collection kinds, `None` for single-valued kinds
    pub fn empty(kind: ValueKind) -> Option<Value> {
        match kind {
            ValueKind::Collection(k) => Some(Value::Collection(k, Vec::new())),
            ValueKind::EntityCollection => Some(Value::Entities(Vec::new())),
            ValueKind::Scalar(_) | ValueKind::Entity => None,
        }
    }

    /// Whether every element matches the declared kind of the container
    pub(crate) fn is_homogeneous(&self) -> bool {
        match self {
            Value::Collection(k, items) => items.iter().all(|s| s.kind() == *k),
            _ => true,
        }
    }

    /// Nested entities referenced by this value
    pub fn nested(&self) -> &[SharedEntity] {
        match self {
            Value::Entity(e) => std::slice::from_ref(e),
            Value::Entities(es) => es,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_kind() {
        for kind in ScalarKind::ALL {
            assert_eq!(Scalar::default_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_empty_only_for_collections() {
        assert_eq!(
            Value::empty(ValueKind::Collection(ScalarKind::Text)),
            Some(Value::Collection(ScalarKind::Text, vec![]))
        );
        assert!(Value::empty(ValueKind::Scalar(ScalarKind::Text)).is_none());
        assert!(Value::empty(ValueKind::Entity).is_none());
    }

    #[test]
    fn test_heterogeneous_collection_detected() {
        let v = Value::Collection(
            ScalarKind::Integer,
            vec![Scalar::Integer(1), Scalar::Text("x".into())],
        );
        assert!(!v.is_homogeneous());
    }
}
