//! Key hashing for the ring. CRC-32 is the only built-in scheme.

pub mod crc32;
pub mod traits;

pub use crc32::Crc32Partitioner;
pub use traits::Partitioner;
