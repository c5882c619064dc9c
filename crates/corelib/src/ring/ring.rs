//! Hash ring data structure.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::member::MemberId;
use crate::partitioner::{Crc32Partitioner, Partitioner};
use crate::token::{RingToken, RING_SPACE};
use crate::vnode::VirtualNode;

/// Virtual nodes per member unless configured otherwise.
pub const DEFAULT_REPLICA_FACTOR: usize = 100;

/// Consistent hash ring mapping string keys to member ids.
///
/// Each member owns `replica_factor` virtual nodes. Entries live in a
/// `BTreeMap` keyed by token, so the ring is sorted after every mutation and
/// a lookup is a single ordered range query.
///
/// The ring has no interior locking. Whoever owns it serializes mutations
/// against lookups (the registry keeps it under its own lock).
///
/// Two members hashing to the exact same token is resolved last write wins.
#[derive(Debug, Clone)]
pub struct HashRing<P: Partitioner = Crc32Partitioner> {
    vnodes: BTreeMap<RingToken, MemberId>,
    replica_factor: usize,
    partitioner: P,
}

impl HashRing<Crc32Partitioner> {
    /// Create an empty ring hashing with CRC-32.
    pub fn new(replica_factor: usize) -> Self {
        Self::with_partitioner(replica_factor, Crc32Partitioner)
    }
}

impl Default for HashRing<Crc32Partitioner> {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICA_FACTOR)
    }
}

impl<P: Partitioner> HashRing<P> {
    /// Create an empty ring with a custom partitioner.
    pub fn with_partitioner(replica_factor: usize, partitioner: P) -> Self {
        Self {
            vnodes: BTreeMap::new(),
            replica_factor,
            partitioner,
        }
    }

    /// Insert `replica_factor` virtual nodes for `id`.
    ///
    /// Adding an id that is already present rewrites its own tokens, so the
    /// entry count does not grow, but callers should not lean on that: a
    /// collision with another member's token is overwritten in the meantime.
    pub fn add_member(&mut self, id: &MemberId) {
        for i in 0..self.replica_factor {
            let vnode = VirtualNode::from_index(&self.partitioner, id, i);
            if let Some(previous) = self.vnodes.insert(vnode.token, vnode.member_id) {
                if &previous != id {
                    debug!(token = %vnode.token, %previous, member = %id, "vnode token collision");
                }
            }
        }
        debug!(member = %id, replica_factor = self.replica_factor, "added member to ring");
    }

    /// Remove every virtual node owned by `id`.
    ///
    /// Returns `true` if anything was removed.
    pub fn remove_member(&mut self, id: &MemberId) -> bool {
        let before = self.vnodes.len();
        self.vnodes.retain(|_, owner| owner != id);
        let removed = before - self.vnodes.len();
        if removed > 0 {
            debug!(member = %id, removed, "removed member from ring");
        }
        removed > 0
    }

    /// Find the member responsible for `key`.
    ///
    /// Walks clockwise from `hash(key)` to the first virtual node with a
    /// token >= the key's, wrapping to the lowest token. `None` on an empty
    /// ring.
    pub fn resolve(&self, key: &str) -> Option<&MemberId> {
        self.resolve_token(self.partitioner.partition(key.as_bytes()))
    }

    /// Find the member owning an already hashed position.
    pub fn resolve_token(&self, token: RingToken) -> Option<&MemberId> {
        self.vnodes
            .range(token..)
            .next()
            .or_else(|| self.vnodes.iter().next())
            .map(|(_, id)| id)
    }

    /// Distinct member ids currently on the ring.
    pub fn members(&self) -> BTreeSet<MemberId> {
        self.vnodes.values().cloned().collect()
    }

    pub fn contains(&self, id: &MemberId) -> bool {
        self.vnodes.values().any(|owner| owner == id)
    }

    pub fn member_count(&self) -> usize {
        self.members().len()
    }

    /// Total number of virtual nodes.
    pub fn entry_count(&self) -> usize {
        self.vnodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vnodes.is_empty()
    }

    pub fn replica_factor(&self) -> usize {
        self.replica_factor
    }

    pub fn partitioner_name(&self) -> &'static str {
        self.partitioner.name()
    }

    /// All virtual nodes in ring order.
    pub fn entries(&self) -> Vec<VirtualNode> {
        self.vnodes
            .iter()
            .map(|(token, id)| VirtualNode::new(*token, id.clone()))
            .collect()
    }

    /// Fraction of the token space owned by each member.
    ///
    /// A virtual node owns the arc from its predecessor (exclusive) up to
    /// its own token (inclusive). Shares sum to 1.0 on a non-empty ring.
    pub fn ownership(&self) -> BTreeMap<MemberId, f64> {
        let mut owned: BTreeMap<MemberId, u64> = BTreeMap::new();

        if self.vnodes.len() == 1 {
            if let Some(id) = self.vnodes.values().next() {
                owned.insert(id.clone(), RING_SPACE);
            }
        } else if let Some((last, _)) = self.vnodes.iter().next_back() {
            let mut prev = *last;
            for (token, id) in &self.vnodes {
                *owned.entry(id.clone()).or_default() += prev.distance_to(token);
                prev = *token;
            }
        }

        owned
            .into_iter()
            .map(|(id, span)| (id, span as f64 / RING_SPACE as f64))
            .collect()
    }
}
