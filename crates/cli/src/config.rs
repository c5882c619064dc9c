//! TOML configuration for the `chunkmap` binary.
//!
//! ```toml
//! [server]
//! listen_addr = "0.0.0.0:50051"
//!
//! [registry]
//! replica_factor = 100
//! policy = "strict"
//! max_chunks_per_file = 16384
//!
//! [registry.liveness]
//! suspect_timeout_secs = 15
//! dead_timeout_secs = 60
//! sweep_interval_secs = 5
//!
//! [log]
//! level = "info"
//! ```
//!
//! Every section and key is optional.

use std::path::Path;

use anyhow::Context;
use chunkmap_registry::RegistryConfig;
use serde::Deserialize;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:50051";

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub server: ServerSection,
    /// Passed to the registry as is.
    pub registry: RegistryConfig,
    pub log: LogSection,
}

/// `[server]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address the tracker listens on.
    pub listen_addr: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Filter directive, e.g. `"info"` or `"chunkmap_registry=debug"`.
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load from a TOML file, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        let config: CliConfig = toml::from_str(s)?;
        config.registry.validate()?;
        Ok(config)
    }
}
