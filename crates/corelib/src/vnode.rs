//! Virtual node abstractions.
//!
//! # Virtual Nodes (VNodes) Concept
//!
//! Instead of each member owning a single position on the ring, each member
//! owns `replica_factor` positions (virtual nodes). This provides:
//!
//! 1. **Better Load Distribution**: more positions = smoother spread of keys
//! 2. **Gradual Rebalancing**: when a member joins or leaves only about
//!    `1/member_count` of the keys move
//!
//! # Performance Characteristics
//!
//! - **Memory**: O(v) per member, v = replica factor
//! - **Lookup**: O(log n) where n = total vnodes
//!
//! The position of vnode `i` of member `m` is `hash(m + "#" + i)`. The
//! derivation is part of the cluster contract: two processes that hash the
//! same members with the same replica factor build the same ring.

use std::fmt;

use crate::member::MemberId;
use crate::partitioner::Partitioner;
use crate::token::RingToken;

/// Separator between member id and vnode index in the virtual key.
pub const VNODE_SEPARATOR: char = '#';

/// A virtual node on the hash ring.
///
/// Ordered by token first, so a sorted `Vec<VirtualNode>` is ring order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualNode {
    /// Token position on the ring.
    pub token: RingToken,
    /// The member that owns this virtual node.
    pub member_id: MemberId,
}

impl VirtualNode {
    #[inline]
    pub fn new(token: RingToken, member_id: MemberId) -> Self {
        Self { token, member_id }
    }

    /// Create the `vnode_index`-th virtual node of a member.
    ///
    /// # Example
    /// ```rust
    /// use chunkmap_core::{Crc32Partitioner, MemberId, VirtualNode};
    ///
    /// let v0 = VirtualNode::from_index(&Crc32Partitioner, &MemberId::new("n1"), 0);
    /// let v1 = VirtualNode::from_index(&Crc32Partitioner, &MemberId::new("n1"), 1);
    /// assert_ne!(v0.token, v1.token);
    /// ```
    pub fn from_index<P: Partitioner + ?Sized>(
        partitioner: &P,
        member_id: &MemberId,
        vnode_index: usize,
    ) -> Self {
        let token = partitioner.partition(virtual_key(member_id, vnode_index).as_bytes());
        Self::new(token, member_id.clone())
    }

    /// Clockwise distance to another virtual node.
    #[inline]
    pub fn distance_to(&self, other: &Self) -> u64 {
        self.token.distance_to(&other.token)
    }
}

/// Key hashed to place vnode `vnode_index` of `member_id`: `"<id>#<index>"`.
pub fn virtual_key(member_id: &MemberId, vnode_index: usize) -> String {
    format!("{}{}{}", member_id, VNODE_SEPARATOR, vnode_index)
}

impl fmt::Display for VirtualNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VNode(token={}, member={})", self.token, self.member_id)
    }
}
