//! Subcommand implementations.

pub mod batch;
pub mod cases;
pub mod check;
pub mod fingerprint;
pub mod ingest;
pub mod nearby;
pub mod search;
