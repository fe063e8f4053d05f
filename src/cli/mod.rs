//! Command-line interface for rnaseq-qc.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli};
