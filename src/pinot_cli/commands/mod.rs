//! Subcommand implementations, one module per CLI verb.

pub mod index;
pub mod search;
