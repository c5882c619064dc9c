//! CRC-32 partitioner.

use crate::partitioner::traits::Partitioner;
use crate::token::RingToken;

/// Hashes keys with CRC-32 (IEEE polynomial).
///
/// Not cryptographic. Stable across platforms, so every process in the
/// cluster computes the same ring for the same membership.
#[derive(Clone, Copy, Debug, Default)]
pub struct Crc32Partitioner;

impl Partitioner for Crc32Partitioner {
    #[inline]
    fn partition(&self, key: &[u8]) -> RingToken {
        RingToken(crc32fast::hash(key))
    }

    fn name(&self) -> &'static str {
        "Crc32Partitioner"
    }
}
