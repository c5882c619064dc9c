//! Registry configuration.

use std::time::Duration;

use chunkmap_core::{Error, DEFAULT_REPLICA_FACTOR};
use serde::Deserialize;

/// How the registry answers requests it cannot satisfy exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPolicy {
    /// Report unknown members, empty clusters and stale ring entries as errors.
    #[default]
    Strict,
    /// Best effort: ignore unknown heartbeats, return an empty placement for
    /// an empty cluster and substitute an arbitrary member for stale entries.
    Lenient,
}

/// Heartbeat expiry thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Silence after which an active member becomes suspect.
    pub suspect_timeout_secs: u64,
    /// Silence after which a member is declared dead and leaves the ring.
    pub dead_timeout_secs: u64,
    /// How often the sweeper runs.
    pub sweep_interval_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        // Storage nodes heartbeat every 5s.
        Self {
            suspect_timeout_secs: 15,
            dead_timeout_secs: 60,
            sweep_interval_secs: 5,
        }
    }
}

impl LivenessConfig {
    pub fn suspect_timeout(&self) -> Duration {
        Duration::from_secs(self.suspect_timeout_secs)
    }

    pub fn dead_timeout(&self) -> Duration {
        Duration::from_secs(self.dead_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Default cap on chunks per placement request.
pub const DEFAULT_MAX_CHUNKS_PER_FILE: u32 = 16_384;

/// Highest accepted `max_chunks_per_file`. A placement this long stays under
/// the transport's frame limit as long as member records average below
/// 256 bytes.
pub const MAX_CHUNKS_PER_FILE_LIMIT: u32 = 65_536;

/// Configuration of a [`crate::NodeRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Virtual nodes per member. Fixed for the registry's lifetime.
    pub replica_factor: usize,
    pub policy: ResolutionPolicy,
    /// `None` disables expiry: members stay active until overwritten.
    pub liveness: Option<LivenessConfig>,
    /// Largest `chunk_count` a placement request may ask for.
    pub max_chunks_per_file: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            replica_factor: DEFAULT_REPLICA_FACTOR,
            policy: ResolutionPolicy::Strict,
            liveness: None,
            max_chunks_per_file: DEFAULT_MAX_CHUNKS_PER_FILE,
        }
    }
}

impl RegistryConfig {
    /// Best-effort config: lenient resolution, no expiry.
    pub fn lenient() -> Self {
        Self {
            policy: ResolutionPolicy::Lenient,
            ..Self::default()
        }
    }

    pub fn with_replica_factor(mut self, replica_factor: usize) -> Self {
        self.replica_factor = replica_factor;
        self
    }

    pub fn with_liveness(mut self, liveness: LivenessConfig) -> Self {
        self.liveness = Some(liveness);
        self
    }

    pub fn with_max_chunks_per_file(mut self, max_chunks_per_file: u32) -> Self {
        self.max_chunks_per_file = max_chunks_per_file;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.replica_factor == 0 {
            return Err(Error::InvalidConfig("replica_factor must be at least 1".into()));
        }
        if !(1..=MAX_CHUNKS_PER_FILE_LIMIT).contains(&self.max_chunks_per_file) {
            return Err(Error::InvalidConfig(format!(
                "max_chunks_per_file must be between 1 and {MAX_CHUNKS_PER_FILE_LIMIT}"
            )));
        }
        if let Some(liveness) = &self.liveness {
            if liveness.sweep_interval_secs == 0 {
                return Err(Error::InvalidConfig("sweep_interval_secs must be at least 1".into()));
            }
            if liveness.dead_timeout_secs <= liveness.suspect_timeout_secs {
                return Err(Error::InvalidConfig(
                    "dead_timeout_secs must exceed suspect_timeout_secs".into(),
                ));
            }
        }
        Ok(())
    }
}
