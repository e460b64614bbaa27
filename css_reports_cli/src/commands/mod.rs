//! CLI subcommand implementations.

pub mod fetch;
pub mod serve;
