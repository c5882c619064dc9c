//! Error types for the registry crate.

use chunkmap_core::MemberId;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Named failure kinds surfaced by the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A heartbeat or deregistration named a member that never registered.
    #[error("unknown member: {0}")]
    UnknownMember(MemberId),

    /// No placement was ever recorded for this file.
    #[error("unknown file: {0}")]
    UnknownFile(String),

    /// There is no member a chunk could be placed on.
    #[error("no nodes available")]
    NoNodesAvailable,

    /// The ring or a recorded assignment points at a member that is no
    /// longer in the membership table.
    #[error("stale assignment: chunk {ordinal} resolved to missing member {member_id}")]
    StaleAssignment { member_id: MemberId, ordinal: u32 },

    /// A placement request asked for more chunks than the registry allows.
    #[error("{requested} chunks requested, limit is {max}")]
    TooManyChunks { requested: u32, max: u32 },

    /// Rejected configuration.
    #[error(transparent)]
    Config(#[from] chunkmap_core::Error),
}
