//! Scalar ↔ SQL value codec
//!
//! Encoding is driver-neutral: temporal scalars become typed `SqlValue`s
//! and each driver binds them as it can. Decoding accepts both the typed
//! form and the text/integer fallback drivers without temporal storage
//! classes hand back.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};

use jds_core::errors::JdsError;
use jds_core::{Scalar, ScalarKind};

use crate::connection::SqlValue;
use crate::errors::{codec_error, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Fixed-width so text comparison orders like time
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

const NANOS_PER_SECOND: i64 = 1_000_000_000;

pub fn nanos_of_day(time: &NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight()) * NANOS_PER_SECOND + i64::from(time.nanosecond())
}

pub fn time_from_nanos(nanos: i64) -> Option<NaiveTime> {
    let secs = u32::try_from(nanos.div_euclid(NANOS_PER_SECOND)).ok()?;
    let frac = u32::try_from(nanos.rem_euclid(NANOS_PER_SECOND)).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, frac)
}

/// # Errors
///
/// `Serialization` for durations beyond ±292 years (not representable in i64 nanos).
pub fn encode(scalar: &Scalar) -> Result<SqlValue> {
    Ok(match scalar {
        Scalar::Text(s) => SqlValue::Text(s.clone()),
        Scalar::Integer(i) => SqlValue::Integer(i64::from(*i)),
        Scalar::Long(l) => SqlValue::Integer(*l),
        Scalar::Float(f) => SqlValue::Real(f64::from(*f)),
        Scalar::Double(d) => SqlValue::Real(*d),
        Scalar::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Scalar::Blob(b) => SqlValue::Blob(b.clone()),
        Scalar::Date(d) => SqlValue::Date(*d),
        Scalar::DateTime(dt) => SqlValue::Timestamp(*dt),
        Scalar::ZonedDateTime(z) => SqlValue::ZonedTimestamp(*z),
        Scalar::Time(t) => SqlValue::Time(*t),
        Scalar::Duration(d) => SqlValue::Integer(
            d.num_nanoseconds()
                .ok_or_else(|| codec_error(format!("duration {} overflows nanoseconds", d)))?,
        ),
        Scalar::Period(p) => SqlValue::Text(p.to_string()),
        Scalar::YearMonth(ym) => SqlValue::Text(ym.to_string()),
        Scalar::MonthDay(md) => SqlValue::Text(md.to_string()),
        Scalar::Enum(ordinal) => SqlValue::Integer(i64::from(*ordinal)),
    })
}

fn mismatch(kind: ScalarKind, value: &SqlValue) -> JdsError {
    codec_error(format!("cannot read {:?} as {}", value, kind.stem()))
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

/// # Errors
///
/// `Serialization` when the stored value does not fit the kind.
pub fn decode(kind: ScalarKind, value: &SqlValue) -> Result<Scalar> {
    let bad = || mismatch(kind, value);
    let scalar = match (kind, value) {
        (ScalarKind::Text, SqlValue::Text(s)) => Scalar::Text(s.clone()),
        (ScalarKind::Integer, SqlValue::Integer(i)) => {
            Scalar::Integer(i32::try_from(*i).map_err(|_| bad())?)
        }
        (ScalarKind::Long, SqlValue::Integer(i)) => Scalar::Long(*i),
        (ScalarKind::Float, SqlValue::Real(r)) => Scalar::Float(*r as f32),
        (ScalarKind::Float, SqlValue::Integer(i)) => Scalar::Float(*i as f32),
        (ScalarKind::Double, SqlValue::Real(r)) => Scalar::Double(*r),
        (ScalarKind::Double, SqlValue::Integer(i)) => Scalar::Double(*i as f64),
        (ScalarKind::Boolean, SqlValue::Integer(i)) => Scalar::Boolean(*i != 0),
        (ScalarKind::Blob, SqlValue::Blob(b)) => Scalar::Blob(b.clone()),
        (ScalarKind::Date, SqlValue::Date(d)) => Scalar::Date(*d),
        (ScalarKind::Date, SqlValue::Timestamp(ts)) => Scalar::Date(ts.date()),
        (ScalarKind::Date, SqlValue::Text(s)) => {
            Scalar::Date(NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| bad())?)
        }
        (ScalarKind::DateTime, SqlValue::Timestamp(ts)) => Scalar::DateTime(*ts),
        (ScalarKind::DateTime, SqlValue::Text(s)) => {
            Scalar::DateTime(parse_timestamp(s).ok_or_else(bad)?)
        }
        (ScalarKind::ZonedDateTime, SqlValue::ZonedTimestamp(z)) => Scalar::ZonedDateTime(*z),
        (ScalarKind::ZonedDateTime, SqlValue::Text(s)) => {
            Scalar::ZonedDateTime(DateTime::parse_from_rfc3339(s).map_err(|_| bad())?)
        }
        (ScalarKind::Time, SqlValue::Time(t)) => Scalar::Time(*t),
        (ScalarKind::Time, SqlValue::Integer(n)) => Scalar::Time(time_from_nanos(*n).ok_or_else(bad)?),
        (ScalarKind::Time, SqlValue::Text(s)) => {
            Scalar::Time(NaiveTime::parse_from_str(s, "%H:%M:%S%.f").map_err(|_| bad())?)
        }
        (ScalarKind::Duration, SqlValue::Integer(n)) => Scalar::Duration(Duration::nanoseconds(*n)),
        (ScalarKind::Period, SqlValue::Text(s)) => Scalar::Period(s.parse().map_err(|_| bad())?),
        (ScalarKind::YearMonth, SqlValue::Text(s)) => {
            Scalar::YearMonth(s.parse().map_err(|_| bad())?)
        }
        (ScalarKind::MonthDay, SqlValue::Text(s)) => Scalar::MonthDay(s.parse().map_err(|_| bad())?),
        (ScalarKind::Enum, SqlValue::Integer(i)) => {
            Scalar::Enum(u32::try_from(*i).map_err(|_| bad())?)
        }
        _ => return Err(bad()),
    };
    Ok(scalar)
}

/// Overview timestamps are stored as UTC without offset
pub fn encode_timestamp(at: &DateTime<Utc>) -> SqlValue {
    SqlValue::Timestamp(at.naive_utc())
}

pub fn decode_timestamp(value: &SqlValue) -> Option<DateTime<Utc>> {
    match value {
        SqlValue::Timestamp(ts) => Some(ts.and_utc()),
        SqlValue::ZonedTimestamp(z) => Some(z.with_timezone(&Utc)),
        SqlValue::Text(s) => parse_timestamp(s).map(|ts| ts.and_utc()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use jds_core::{MonthDay, Period, YearMonth};
    use proptest::prelude::*;

    fn round_trip(scalar: Scalar) -> Scalar {
        let encoded = encode(&scalar).unwrap();
        decode(scalar.kind(), &encoded).unwrap()
    }

    #[test]
    fn test_every_kind_round_trips_through_typed_values() {
        let zoned = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 8, 30, 0)
            .unwrap();
        let samples = vec![
            Scalar::Text("héllo".into()),
            Scalar::Integer(-7),
            Scalar::Long(i64::MAX),
            Scalar::Float(1.5),
            Scalar::Double(2.25),
            Scalar::Boolean(true),
            Scalar::Blob(vec![0, 1, 255]),
            Scalar::Date(NaiveDate::from_ymd_opt(2020, 1, 31).unwrap()),
            Scalar::DateTime(
                NaiveDate::from_ymd_opt(2020, 1, 31)
                    .unwrap()
                    .and_hms_nano_opt(23, 59, 59, 123_456_789)
                    .unwrap(),
            ),
            Scalar::ZonedDateTime(zoned),
            Scalar::Time(NaiveTime::from_hms_milli_opt(13, 14, 15, 16).unwrap()),
            Scalar::Duration(Duration::milliseconds(90_061_001)),
            Scalar::Period(Period::new(1, 2, 3)),
            Scalar::YearMonth(YearMonth::new(1999, 12).unwrap()),
            Scalar::MonthDay(MonthDay::new(2, 29).unwrap()),
            Scalar::Enum(4),
        ];
        for scalar in samples {
            assert_eq!(round_trip(scalar.clone()), scalar);
        }
    }

    #[test]
    fn test_text_fallbacks_decode() {
        assert_eq!(
            decode(ScalarKind::Date, &SqlValue::from("2021-06-01")).unwrap(),
            Scalar::Date(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap())
        );
        assert_eq!(
            decode(ScalarKind::Time, &SqlValue::Integer(3_600_000_000_000)).unwrap(),
            Scalar::Time(NaiveTime::from_hms_opt(1, 0, 0).unwrap())
        );
        assert!(matches!(
            decode(ScalarKind::DateTime, &SqlValue::from("2021-06-01 10:00:00.500000000")).unwrap(),
            Scalar::DateTime(_)
        ));
    }

    #[test]
    fn test_wrong_storage_class_is_error() {
        assert!(decode(ScalarKind::Integer, &SqlValue::from("12")).is_err());
        assert!(decode(ScalarKind::Text, &SqlValue::Null).is_err());
        assert!(decode(ScalarKind::Integer, &SqlValue::Integer(i64::MAX)).is_err());
    }

    #[test]
    fn test_overview_timestamp_round_trip() {
        let now = Utc::now();
        assert_eq!(decode_timestamp(&encode_timestamp(&now)), Some(now));
    }

    proptest! {
        #[test]
        fn prop_time_nanos_round_trip(secs in 0u32..86_400, nanos in 0u32..1_000_000_000) {
            let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).unwrap();
            prop_assert_eq!(time_from_nanos(nanos_of_day(&time)), Some(time));
        }
    }
}
