//! Install command
//!
//! Usage: jds install --db <PATH> [--templates <DIR>]

use clap::Args;
use jds_core::logging_facility::{self, Profile};
use jds_store::db;
use jds_store::schema::{install_core_schema, install_templates};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// SQLite database file, created if missing
    #[arg(long)]
    pub db: PathBuf,

    /// DDL template root; files under `<DIR>/sqlite/*.sql` are applied once
    #[arg(long)]
    pub templates: Option<PathBuf>,
}

/// Execute install command
pub fn execute(args: InstallArgs) -> Result<(), Box<dyn std::error::Error>> {
    logging_facility::init(Profile::Development);

    if let Some(parent) = args.db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut conn = db::open(&args.db)?;

    let created = install_core_schema(&mut conn, false)?;
    if created.is_empty() {
        println!("Schema up to date");
    } else {
        for name in &created {
            println!("created {}", name);
        }
    }

    if let Some(dir) = &args.templates {
        for name in install_templates(&mut conn, dir)? {
            println!("applied {}", name);
        }
    }

    Ok(())
}
