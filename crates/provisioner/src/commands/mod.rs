//! Subcommand implementations.

pub mod provision;
pub mod serve_key;
pub mod status;
