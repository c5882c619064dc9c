//! Command line front end for chunkmap.
//!
//! `chunkmap serve` runs the tracker; every other subcommand is a one-shot
//! membership call against a running tracker.

pub mod commands;
pub mod config;
pub mod telemetry;

pub use commands::{Cli, Command};
pub use config::CliConfig;
