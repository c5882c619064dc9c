//! Builder for [`HashRing`].

use crate::error::{Error, Result};
use crate::member::MemberId;
use crate::partitioner::{Crc32Partitioner, Partitioner};
use crate::ring::ring::{HashRing, DEFAULT_REPLICA_FACTOR};

/// Fluent construction of a ring with an initial membership.
///
/// # Example
///
/// ```rust
/// use chunkmap_core::RingBuilder;
///
/// let ring = RingBuilder::new()
///     .with_replica_factor(8)
///     .add_member("n1")
///     .add_member("n2")
///     .build()
///     .unwrap();
/// assert_eq!(ring.entry_count(), 16);
/// ```
#[derive(Debug, Clone)]
pub struct RingBuilder<P: Partitioner = Crc32Partitioner> {
    replica_factor: usize,
    partitioner: P,
    members: Vec<MemberId>,
}

impl RingBuilder<Crc32Partitioner> {
    pub fn new() -> Self {
        Self {
            replica_factor: DEFAULT_REPLICA_FACTOR,
            partitioner: Crc32Partitioner,
            members: Vec::new(),
        }
    }
}

impl Default for RingBuilder<Crc32Partitioner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Partitioner> RingBuilder<P> {
    /// Virtual nodes per member. Must be at least 1.
    pub fn with_replica_factor(mut self, replica_factor: usize) -> Self {
        self.replica_factor = replica_factor;
        self
    }

    /// Swap the hashing scheme.
    pub fn with_partitioner<Q: Partitioner>(self, partitioner: Q) -> RingBuilder<Q> {
        RingBuilder {
            replica_factor: self.replica_factor,
            partitioner,
            members: self.members,
        }
    }

    /// Queue a member. Duplicates are added once.
    pub fn add_member(mut self, id: impl Into<MemberId>) -> Self {
        let id = id.into();
        if !self.members.contains(&id) {
            self.members.push(id);
        }
        self
    }

    pub fn build(self) -> Result<HashRing<P>> {
        if self.replica_factor == 0 {
            return Err(Error::InvalidConfig(
                "replica factor must be at least 1".into(),
            ));
        }

        let mut ring = HashRing::with_partitioner(self.replica_factor, self.partitioner);
        for id in &self.members {
            ring.add_member(id);
        }
        Ok(ring)
    }
}
