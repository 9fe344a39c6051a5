//! CLI subcommands

pub mod completions;
pub mod config;
pub mod records;
pub mod status;
pub mod sync;
