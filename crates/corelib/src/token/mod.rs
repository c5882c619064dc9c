//! Ring tokens.
//!
//! A token is a position on the 32-bit hash ring. Tokens are compared as
//! unsigned integers; the ring wraps from `u32::MAX` back to zero.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Size of the token space (2^32).
pub const RING_SPACE: u64 = 1 << 32;

/// Position on the ring.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct RingToken(pub u32);

impl RingToken {
    pub const ZERO: RingToken = RingToken(0);
    pub const MAX: RingToken = RingToken(u32::MAX);

    /// Clockwise distance from `self` to `other`.
    ///
    /// Returned as `u64` so a full lap (`RING_SPACE`) stays representable for
    /// callers that add distances up.
    #[inline]
    pub fn distance_to(&self, other: &Self) -> u64 {
        if other.0 >= self.0 {
            u64::from(other.0 - self.0)
        } else {
            RING_SPACE - u64::from(self.0) + u64::from(other.0)
        }
    }
}

impl fmt::Display for RingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_forward() {
        assert_eq!(RingToken(100).distance_to(&RingToken(200)), 100);
        assert_eq!(RingToken(7).distance_to(&RingToken(7)), 0);
    }

    #[test]
    fn test_distance_wraps() {
        assert_eq!(RingToken::MAX.distance_to(&RingToken::ZERO), 1);
        assert_eq!(RingToken(200).distance_to(&RingToken(100)), RING_SPACE - 100);
    }

    #[test]
    fn test_display_is_fixed_width_hex() {
        assert_eq!(RingToken(0xab).to_string(), "000000ab");
    }
}
