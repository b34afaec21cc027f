//! Schema command
//!
//! Usage: jds schema --dialect <DIALECT> [--procedures]

use clap::Args;
use jds_core::logging_facility::{self, Profile};
use jds_store::schema::{core_tables_ddl, procedures_ddl};
use jds_store::{errors, DialectKind};

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Target engine: sqlite, postgresql, mysql, mariadb, tsql or oracle
    #[arg(long)]
    pub dialect: String,

    /// Also print the upsert procedures
    #[arg(long)]
    pub procedures: bool,
}

/// Execute schema command
pub fn execute(args: SchemaArgs) -> Result<(), Box<dyn std::error::Error>> {
    logging_facility::init(Profile::Development);

    let kind: DialectKind = args.dialect.parse()?;
    let dialect = kind.adapter();

    for (table, ddl) in core_tables_ddl(dialect) {
        println!("-- {}", table);
        println!("{};", ddl);
        println!();
    }

    if args.procedures {
        if !dialect.supports_procedures() {
            return Err(Box::new(errors::unsupported(kind, "stored procedures")));
        }
        for (name, ddl) in procedures_ddl(dialect) {
            println!("-- {}", name);
            println!("{}", terminate(kind, &ddl));
            println!();
        }
    }

    Ok(())
}

/// Wrap a procedure body so the engine's client tool runs it as one statement
fn terminate(kind: DialectKind, ddl: &str) -> String {
    match kind {
        DialectKind::MySql | DialectKind::MariaDb => {
            format!("DELIMITER $$\n{}$$\nDELIMITER ;", ddl)
        }
        DialectKind::TransactSql => format!("{}\nGO", ddl),
        DialectKind::Oracle => format!("{}\n/", ddl),
        _ => format!("{};", ddl),
    }
}
