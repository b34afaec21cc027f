//! JDS CLI
//!
//! Command-line interface for the JDS persistence engine

use clap::{Parser, Subcommand};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "jds")]
#[command(about = "JDS - Multi-dialect entity persistence", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the engine DDL for a dialect
    Schema(commands::schema::SchemaArgs),
    /// Install the engine schema into a SQLite database
    Install(commands::install::InstallArgs),
    /// Save and reload a generated sample graph
    Demo(commands::demo::DemoArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Schema(args) => commands::schema::execute(args),
        Commands::Install(args) => commands::install::execute(args),
        Commands::Demo(args) => commands::demo::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
