//! Compile-time value kinds for typed field handles
//!
//! Each marker type fixes the Rust type a `Field<K>` accepts and returns,
//! and the `ValueKind` it registers under.

use std::marker::PhantomData;

use crate::metadata::{ScalarKind, ValueKind};
use crate::model::{Scalar, SharedEntity, Value};

/// A field marker: maps a Rust value type onto a `ValueKind`
pub trait FieldType: 'static {
    const KIND: ValueKind;
    type Value;

    fn into_value(value: Self::Value) -> Value;

    fn from_value(value: &Value) -> Option<Self::Value>;

    fn enum_values() -> Vec<String> {
        Vec::new()
    }
}

/// A scalar marker, usable alone or inside `CollectionOf`
pub trait ScalarType: 'static {
    const SCALAR: ScalarKind;
    type Native: Clone;

    fn into_scalar(value: Self::Native) -> Scalar;

    fn from_scalar(scalar: &Scalar) -> Option<Self::Native>;

    /// What an unset field of this kind reads as
    fn default_native() -> Self::Native;

    fn enum_values() -> Vec<String> {
        Vec::new()
    }
}

/// Enums persisted by ordinal
///
/// `from_ordinal(self.ordinal())` must return `Some(self)`. The
/// `persisted_enum!` macro derives a conforming implementation.
pub trait PersistedEnum: Sized + Clone + Default + 'static {
    fn ordinal(&self) -> u32;

    fn from_ordinal(ordinal: u32) -> Option<Self>;

    fn variant_names() -> &'static [&'static str];
}

macro_rules! scalar_kind {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $native:ty, $default:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {}

        impl ScalarType for $name {
            const SCALAR: ScalarKind = ScalarKind::$variant;
            type Native = $native;

            fn into_scalar(value: $native) -> Scalar {
                Scalar::$variant(value)
            }

            fn from_scalar(scalar: &Scalar) -> Option<$native> {
                match scalar {
                    Scalar::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn default_native() -> $native {
                $default
            }
        }

        impl FieldType for $name {
            const KIND: ValueKind = ValueKind::Scalar(ScalarKind::$variant);
            type Value = $native;

            fn into_value(value: $native) -> Value {
                Value::Scalar(Scalar::$variant(value))
            }

            fn from_value(value: &Value) -> Option<$native> {
                match value {
                    Value::Scalar(s) => <$name as ScalarType>::from_scalar(s),
                    _ => None,
                }
            }
        }
    };
}

scalar_kind!(Text, Text, String, String::new());
scalar_kind!(
    /// 32-bit integer
    Integer, Integer, i32, 0
);
scalar_kind!(
    /// 64-bit integer
    Long, Long, i64, 0
);
scalar_kind!(Float, Float, f32, 0.0);
scalar_kind!(Double, Double, f64, 0.0);
scalar_kind!(Boolean, Boolean, bool, false);
scalar_kind!(Blob, Blob, Vec<u8>, Vec::new());
scalar_kind!(Date, Date, chrono::NaiveDate, chrono::NaiveDate::default());
scalar_kind!(DateTime, DateTime, chrono::NaiveDateTime, chrono::NaiveDateTime::default());
scalar_kind!(
    /// Date-time with a fixed UTC offset
    ZonedDateTime,
    ZonedDateTime,
    chrono::DateTime<chrono::FixedOffset>,
    chrono::DateTime::<chrono::FixedOffset>::default()
);
scalar_kind!(Time, Time, chrono::NaiveTime, chrono::NaiveTime::default());
scalar_kind!(Duration, Duration, chrono::Duration, chrono::Duration::zero());
scalar_kind!(Period, Period, crate::temporal::Period, crate::temporal::Period::default());
scalar_kind!(
    YearMonth,
    YearMonth,
    crate::temporal::YearMonth,
    crate::temporal::YearMonth::default()
);
scalar_kind!(
    MonthDay,
    MonthDay,
    crate::temporal::MonthDay,
    crate::temporal::MonthDay::default()
);

/// Enum stored by ordinal
pub struct Enum<E>(PhantomData<fn() -> E>);

impl<E: PersistedEnum> ScalarType for Enum<E> {
    const SCALAR: ScalarKind = ScalarKind::Enum;
    type Native = E;

    fn into_scalar(value: E) -> Scalar {
        Scalar::Enum(value.ordinal())
    }

    fn from_scalar(scalar: &Scalar) -> Option<E> {
        match scalar {
            Scalar::Enum(ordinal) => E::from_ordinal(*ordinal),
            _ => None,
        }
    }

    fn default_native() -> E {
        E::default()
    }

    fn enum_values() -> Vec<String> {
        E::variant_names().iter().map(|s| s.to_string()).collect()
    }
}

impl<E: PersistedEnum> FieldType for Enum<E> {
    const KIND: ValueKind = ValueKind::Scalar(ScalarKind::Enum);
    type Value = E;

    fn into_value(value: E) -> Value {
        Value::Scalar(<Self as ScalarType>::into_scalar(value))
    }

    fn from_value(value: &Value) -> Option<E> {
        match value {
            Value::Scalar(s) => <Self as ScalarType>::from_scalar(s),
            _ => None,
        }
    }

    fn enum_values() -> Vec<String> {
        <Self as ScalarType>::enum_values()
    }
}

/// Ordered collection of scalars
pub struct CollectionOf<S>(PhantomData<fn() -> S>);

impl<S: ScalarType> FieldType for CollectionOf<S> {
    const KIND: ValueKind = ValueKind::Collection(S::SCALAR);
    type Value = Vec<S::Native>;

    fn into_value(value: Vec<S::Native>) -> Value {
        Value::Collection(S::SCALAR, value.into_iter().map(S::into_scalar).collect())
    }

    fn from_value(value: &Value) -> Option<Vec<S::Native>> {
        match value {
            Value::Collection(_, items) => items.iter().map(S::from_scalar).collect(),
            _ => None,
        }
    }

    fn enum_values() -> Vec<String> {
        S::enum_values()
    }
}

/// Single nested entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nested {}

impl FieldType for Nested {
    const KIND: ValueKind = ValueKind::Entity;
    type Value = SharedEntity;

    fn into_value(value: SharedEntity) -> Value {
        Value::Entity(value)
    }

    fn from_value(value: &Value) -> Option<SharedEntity> {
        match value {
            Value::Entity(e) => Some(e.clone()),
            _ => None,
        }
    }
}

/// Ordered collection of nested entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedCollection {}

impl FieldType for NestedCollection {
    const KIND: ValueKind = ValueKind::EntityCollection;
    type Value = Vec<SharedEntity>;

    fn into_value(value: Vec<SharedEntity>) -> Value {
        Value::Entities(value)
    }

    fn from_value(value: &Value) -> Option<Vec<SharedEntity>> {
        match value {
            Value::Entities(es) => Some(es.clone()),
            _ => None,
        }
    }
}

/// Declare an enum persisted by ordinal
///
/// The first variant is the default an unset field reads as.
///
/// ```
/// jds_core::persisted_enum! {
///     pub enum Sex { Unknown, Female, Male }
/// }
/// use jds_core::kinds::PersistedEnum;
/// assert_eq!(Sex::Male.ordinal(), 2);
/// assert_eq!(Sex::from_ordinal(1), Some(Sex::Female));
/// assert_eq!(Sex::default(), Sex::Unknown);
/// ```
#[macro_export]
macro_rules! persisted_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $first:ident $(, $rest:ident)* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $first,
            $($rest),*
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$first
            }
        }

        impl $crate::kinds::PersistedEnum for $name {
            fn ordinal(&self) -> u32 {
                *self as u32
            }

            fn from_ordinal(ordinal: u32) -> Option<Self> {
                const ALL: &[$name] = &[$name::$first $(, $name::$rest)*];
                ALL.get(ordinal as usize).copied()
            }

            fn variant_names() -> &'static [&'static str] {
                &[stringify!($first) $(, stringify!($rest))*]
            }
        }
    };
}
