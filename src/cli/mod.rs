//! Command-line handlers

pub mod commands;

pub use commands::{cmd_config, cmd_keygen, cmd_run, CliResult, RunOptions};
