//! CLI subcommands

pub mod demo;
pub mod install;
pub mod schema;
