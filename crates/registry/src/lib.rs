//! Cluster membership registry and chunk placement.
//!
//! This crate owns the authoritative in-memory view of the storage cluster:
//! - Member registration and heartbeats
//! - Liveness classification (active / suspect / dead) by a periodic sweep
//! - Chunk placement on the consistent hash ring
//! - The per-file chunk assignment index
//!
//! Everything lives behind a single reader/writer lock inside
//! [`NodeRegistry`]; callers only ever see owned snapshots.

pub mod config;
pub mod error;
pub mod liveness;
pub mod metadata;
pub mod placement;
pub mod registry;

pub use config::{
    LivenessConfig, RegistryConfig, ResolutionPolicy, DEFAULT_MAX_CHUNKS_PER_FILE,
    MAX_CHUNKS_PER_FILE_LIMIT,
};
pub use error::{RegistryError, Result};
pub use liveness::{spawn_sweeper, SweepReport};
pub use metadata::{ChunkAssignment, FileMetadata};
pub use placement::placement_key;
pub use registry::{HeartbeatOutcome, NodeRegistry, RegisterOutcome};
