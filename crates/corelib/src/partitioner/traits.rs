//! The hashing seam of the ring.

use crate::token::RingToken;

/// Maps member virtual keys and placement keys onto the 32-bit ring.
///
/// Implementations hold no mutable state; one instance is shared by every
/// lookup.
pub trait Partitioner: Send + Sync + 'static {
    /// Converts a key into a ring position.
    ///
    /// Must be deterministic: the same bytes always produce the same token,
    /// across processes and restarts.
    fn partition(&self, key: &[u8]) -> RingToken;

    /// Returns the name of this partitioner.
    fn name(&self) -> &'static str;
}
