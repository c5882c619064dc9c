//! Core library for chunk placement.
//!
//! This crate provides the building blocks the registry places chunks with:
//! - Ring tokens and the partitioner that hashes keys onto the ring
//! - Virtual node entries
//! - The consistent hash ring and its builder
//! - Cluster member records

pub mod error;
pub mod member;
pub mod partitioner;
pub mod ring;
pub mod token;
pub mod vnode;

pub use error::{Error, Result};
pub use member::{Member, MemberId, MemberStatus};
pub use partitioner::{Crc32Partitioner, Partitioner};
pub use ring::{HashRing, RingBuilder, DEFAULT_REPLICA_FACTOR};
pub use token::RingToken;
pub use vnode::VirtualNode;
