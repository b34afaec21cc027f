//! Demo command
//!
//! Usage: jds demo --db <PATH> [--count <N>] [--config <FILE>]
//!
//! Builds a small customer model, saves a generated batch and loads it back.

use chrono::{Duration, NaiveDate};
use clap::Args;
use jds_core::kinds::{CollectionOf, Date, Enum, Nested, Text};
use jds_core::logging_facility;
use jds_core::{EntityDecl, Field, JdsOptions, MetadataRegistry, SharedEntity};
use jds_store::db;
use jds_store::schema::{install_core_schema, install_report_table, register_metadata};
use jds_store::{LoadEngine, LoadFilter, ReportTable, SaveEngine, SchemaCompiler, SqlConnection};
use std::path::PathBuf;

jds_core::persisted_enum! {
    pub enum Tier { Standard, Silver, Gold }
}

const CUSTOMER: u64 = 100;
const ADDRESS: u64 = 101;

const NAME: Field<Text> = Field::new(1, "name");
const TIER: Field<Enum<Tier>> = Field::new(2, "tier");
const TAGS: Field<CollectionOf<Text>> = Field::new(3, "tags");
const JOINED: Field<Date> = Field::new(4, "joined");
const ADDRESS_FIELD: Field<Nested> = Field::new(5, "address").with_target(ADDRESS);
const STREET: Field<Text> = Field::new(10, "street");
const CITY: Field<Text> = Field::new(11, "city");

const CITIES: [&str; 3] = ["Lisbon", "Oslo", "Quito"];

#[derive(Debug, Args)]
pub struct DemoArgs {
    /// SQLite database file, created if missing
    #[arg(long)]
    pub db: PathBuf,

    /// Number of customers to generate
    #[arg(long, default_value_t = 10)]
    pub count: usize,

    /// TOML options file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Execute demo command
pub fn execute(args: DemoArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = match &args.config {
        Some(path) => JdsOptions::from_file(path)?,
        None => JdsOptions::default(),
    };
    logging_facility::init(options.log_profile);

    let registry = demo_registry()?;
    let mut conn = db::open(&args.db)?;
    install_core_schema(&mut conn, false)?;
    register_metadata(&mut conn, &registry)?;

    let report = SchemaCompiler::new(&registry, conn.dialect().adapter())
        .report_table(&ReportTable::new("report_customer", &[CUSTOMER]))?;
    install_report_table(&mut conn, &report)?;

    let customers = (0..args.count)
        .map(|i| customer(&registry, i))
        .collect::<Result<Vec<_>, _>>()?;

    let saved = SaveEngine::new(&registry, options.clone())
        .with_report(report)
        .save(&customers, &mut conn)?;
    println!(
        "saved {} instances in {} chunks ({} statements)",
        saved.instances_written, saved.chunks_committed, saved.statements
    );

    let loader = LoadEngine::new(&registry, &options);
    let mut loaded = 0;
    let mut with_address = 0;
    for entity in loader.load(CUSTOMER, &LoadFilter::All, &mut conn)? {
        let entity = entity?;
        let guard = entity.read();
        loaded += 1;
        if guard.get(&ADDRESS_FIELD).is_some() {
            with_address += 1;
        }
    }
    println!("loaded {} customers, {} with an address", loaded, with_address);
    tracing::info!(loaded, with_address, "demo finished");

    Ok(())
}

fn demo_registry() -> jds_core::Result<MetadataRegistry> {
    let mut registry = MetadataRegistry::new();
    registry.register_type(EntityDecl::new(ADDRESS, "Address").field(&STREET).field(&CITY))?;
    registry.register_type(
        EntityDecl::new(CUSTOMER, "Customer")
            .field(&NAME)
            .field(&TIER)
            .field(&TAGS)
            .field(&JOINED)
            .field(&ADDRESS_FIELD),
    )?;
    Ok(registry)
}

fn customer(registry: &MetadataRegistry, index: usize) -> jds_core::Result<SharedEntity> {
    let mut entity = registry.create(CUSTOMER)?;
    entity.set(&NAME, format!("customer-{}", index))?;
    entity.set(
        &TIER,
        match index % 3 {
            0 => Tier::Standard,
            1 => Tier::Silver,
            _ => Tier::Gold,
        },
    )?;
    entity.set(&TAGS, vec!["demo".to_string(), format!("batch-{}", index / 5)])?;
    if let Some(joined) = NaiveDate::from_ymd_opt(2020, 1, 1) {
        entity.set(&JOINED, joined + Duration::days(index as i64))?;
    }

    // every other customer gets an address
    if index % 2 == 0 {
        let mut address = registry.create(ADDRESS)?;
        address.set(&STREET, format!("{} Main Street", index + 1))?;
        address.set(&CITY, CITIES[index % CITIES.len()].to_string())?;
        entity.set(&ADDRESS_FIELD, SharedEntity::from(address))?;
    }

    Ok(SharedEntity::from(entity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_other_customer_has_an_address() {
        let registry = demo_registry().unwrap();

        let first = customer(&registry, 0).unwrap();
        let second = customer(&registry, 1).unwrap();

        assert!(first.read().get(&ADDRESS_FIELD).is_some());
        assert!(second.read().get(&ADDRESS_FIELD).is_none());
        assert_eq!(second.read().get(&TIER), Some(Tier::Silver));
    }
}
