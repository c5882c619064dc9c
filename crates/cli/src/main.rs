//! `chunkmap` entry point.
//!
//! ```text
//! chunkmap serve                          # run the tracker
//! chunkmap serve -c chunkmap.toml         # with a config file
//! chunkmap register n1 10.0.0.2:50052 --capacity 1000
//! chunkmap heartbeat n1 --capacity 900 --chunks 12 --interval-secs 5
//! chunkmap placement movie.mkv-1700000000 16
//! chunkmap file movie.mkv-1700000000 --locate
//! ```

use anyhow::{Context, Result};
use chunkmap_cli::{telemetry, Cli, CliConfig};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    telemetry::init(&config.log.level);

    cli.run(config).await
}
