//! Consistent hash ring implementation.
//!
//! The ring manages virtual node positions and provides ordered lookup
//! from a key to the member responsible for it.

pub mod builder;
pub mod ring;

pub use builder::RingBuilder;
pub use ring::{HashRing, DEFAULT_REPLICA_FACTOR};
