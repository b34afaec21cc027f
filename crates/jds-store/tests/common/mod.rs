#![allow(dead_code)]

use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone};
use jds_core::kinds::{
    Blob, Boolean, CollectionOf, Date, DateTime, Double, Duration, Enum, Float, Integer, Long, MonthDay,
    Nested, NestedCollection, Period, Text, Time, YearMonth, ZonedDateTime,
};
use jds_core::{EntityDecl, Field, MetadataRegistry, SharedEntity};
use jds_store::connection::sqlite::SqliteConnection;
use jds_store::db;
use jds_store::schema::install_core_schema;

jds_core::persisted_enum! {
    pub enum Status { Unknown, Active, Retired }
}

pub const SAMPLE: u64 = 1;
pub const PERSON: u64 = 10;
pub const EMPLOYEE: u64 = 11;
pub const NODE: u64 = 20;

// Every scalar kind
pub const TEXT: Field<Text> = Field::new(1, "text");
pub const INTEGER: Field<Integer> = Field::new(2, "integer");
pub const LONG: Field<Long> = Field::new(3, "long");
pub const FLOAT: Field<Float> = Field::new(4, "float");
pub const DOUBLE: Field<Double> = Field::new(5, "double");
pub const BOOLEAN: Field<Boolean> = Field::new(6, "boolean");
pub const BLOB: Field<Blob> = Field::new(7, "blob");
pub const DATE: Field<Date> = Field::new(8, "date");
pub const DATE_TIME: Field<DateTime> = Field::new(9, "date_time");
pub const ZONED: Field<ZonedDateTime> = Field::new(10, "zoned");
pub const TIME: Field<Time> = Field::new(11, "time");
pub const DURATION: Field<Duration> = Field::new(12, "duration");
pub const PERIOD: Field<Period> = Field::new(13, "period");
pub const YEAR_MONTH: Field<YearMonth> = Field::new(14, "year_month");
pub const MONTH_DAY: Field<MonthDay> = Field::new(15, "month_day");
pub const STATUS: Field<Enum<Status>> = Field::new(16, "status");

// Collections
pub const TAGS: Field<CollectionOf<Text>> = Field::new(30, "tags");
pub const SCORES: Field<CollectionOf<Double>> = Field::new(31, "scores");
pub const HISTORY: Field<CollectionOf<Enum<Status>>> = Field::new(32, "history");
pub const DATES: Field<CollectionOf<Date>> = Field::new(33, "dates");

// People
pub const NAME: Field<Text> = Field::new(40, "name");
pub const AGE: Field<Integer> = Field::new(41, "age");
pub const SALARY: Field<Double> = Field::new(42, "salary");
pub const ROLES: Field<CollectionOf<Enum<Status>>> = Field::new(43, "roles");

// Graphs
pub const LABEL: Field<Text> = Field::new(50, "label");
pub const CHILDREN: Field<NestedCollection> = Field::new(51, "children").with_target(NODE);
pub const FAVOURITE: Field<Nested> = Field::new(52, "favourite").with_target(NODE);

pub fn registry() -> MetadataRegistry {
    let mut registry = MetadataRegistry::new();
    registry
        .register_type(
            EntityDecl::new(SAMPLE, "Sample")
                .field(&TEXT)
                .field(&INTEGER)
                .field(&LONG)
                .field(&FLOAT)
                .field(&DOUBLE)
                .field(&BOOLEAN)
                .field(&BLOB)
                .field(&DATE)
                .field(&DATE_TIME)
                .field(&ZONED)
                .field(&TIME)
                .field(&DURATION)
                .field(&PERIOD)
                .field(&YEAR_MONTH)
                .field(&MONTH_DAY)
                .field(&STATUS)
                .field(&TAGS)
                .field(&SCORES)
                .field(&HISTORY)
                .field(&DATES),
        )
        .unwrap();
    registry
        .register_type(EntityDecl::new(PERSON, "Person").field(&NAME).field(&AGE))
        .unwrap();
    registry
        .register_type(
            EntityDecl::new(EMPLOYEE, "Employee")
                .parent(PERSON)
                .field(&SALARY)
                .field(&ROLES),
        )
        .unwrap();
    registry
        .register_type(
            EntityDecl::new(NODE, "Node")
                .field(&LABEL)
                .field(&CHILDREN)
                .field(&FAVOURITE),
        )
        .unwrap();
    registry
}

/// In-memory database with the core schema installed
pub fn database() -> SqliteConnection {
    let mut conn = db::open_in_memory().unwrap();
    install_core_schema(&mut conn, false).unwrap();
    conn
}

/// A sample with every scalar field set
pub fn full_sample(registry: &MetadataRegistry) -> SharedEntity {
    let mut entity = registry.create(SAMPLE).unwrap();
    entity.set(&TEXT, "hello".to_string()).unwrap();
    entity.set(&INTEGER, -7).unwrap();
    entity.set(&LONG, 9_000_000_000).unwrap();
    entity.set(&FLOAT, 1.5).unwrap();
    entity.set(&DOUBLE, 2.25).unwrap();
    entity.set(&BOOLEAN, true).unwrap();
    entity.set(&BLOB, vec![0, 1, 2, 255]).unwrap();
    entity
        .set(&DATE, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        .unwrap();
    entity
        .set(
            &DATE_TIME,
            NaiveDate::from_ymd_opt(2023, 12, 31)
                .unwrap()
                .and_hms_nano_opt(23, 59, 58, 123_456_789)
                .unwrap(),
        )
        .unwrap();
    entity
        .set(
            &ZONED,
            FixedOffset::east_opt(2 * 3600)
                .unwrap()
                .with_ymd_and_hms(2022, 6, 1, 8, 30, 0)
                .unwrap(),
        )
        .unwrap();
    entity
        .set(&TIME, NaiveTime::from_hms_milli_opt(7, 45, 12, 250).unwrap())
        .unwrap();
    entity
        .set(&DURATION, chrono::Duration::seconds(5400))
        .unwrap();
    entity
        .set(&PERIOD, jds_core::Period::new(1, 2, 3))
        .unwrap();
    entity
        .set(&YEAR_MONTH, jds_core::YearMonth::new(2021, 11).unwrap())
        .unwrap();
    entity
        .set(&MONTH_DAY, jds_core::MonthDay::new(2, 29).unwrap())
        .unwrap();
    entity.set(&STATUS, Status::Active).unwrap();
    SharedEntity::from(entity)
}

pub fn person(registry: &MetadataRegistry, name: &str, age: i32) -> SharedEntity {
    let mut entity = registry.create(PERSON).unwrap();
    entity.set(&NAME, name.to_string()).unwrap();
    entity.set(&AGE, age).unwrap();
    SharedEntity::from(entity)
}

pub fn employee(registry: &MetadataRegistry, name: &str, salary: f64) -> SharedEntity {
    let mut entity = registry.create(EMPLOYEE).unwrap();
    entity.set(&NAME, name.to_string()).unwrap();
    entity.set(&SALARY, salary).unwrap();
    SharedEntity::from(entity)
}

pub fn node(registry: &MetadataRegistry, label: &str) -> SharedEntity {
    let mut entity = registry.create(NODE).unwrap();
    entity.set(&LABEL, label.to_string()).unwrap();
    SharedEntity::from(entity)
}

pub fn count(conn: &mut SqliteConnection, sql: &str) -> i64 {
    use jds_store::SqlConnection;
    conn.query(sql, &[]).unwrap()[0][0].as_i64().unwrap()
}
