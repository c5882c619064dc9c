//! Cluster member records.
//!
//! A member is a storage node as the registry knows it. Identity is an opaque
//! string assigned by the storage process itself; the registry never mints
//! ids.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Stable identifier of a storage node.
///
/// Newtype over `String` so member ids cannot be confused with file ids or
/// addresses at call sites.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    /// Wrap an id without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MemberId {
    type Err = Error;

    /// Parses a user-supplied id, rejecting blank input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidMember("member id must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MemberId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for MemberId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for MemberId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Observed liveness of a member.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum MemberStatus {
    /// Registered or heartbeating within the suspect timeout.
    Active,
    /// Missed heartbeats for longer than the suspect timeout. Still placed.
    Suspect,
    /// Missed heartbeats for longer than the dead timeout. Removed from the ring.
    Dead,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Suspect => "suspect",
            MemberStatus::Dead => "dead",
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A storage node as tracked by the registry.
///
/// Keep this struct cheap to clone: listings hand out owned snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    /// Data-plane address. Opaque; never validated.
    pub address: String,
    pub status: MemberStatus,
    /// Last reported free capacity in bytes. Advisory only.
    pub available_capacity: u64,
    /// Last reported number of stored chunks.
    pub chunk_count: u64,
    /// When the last register or heartbeat was applied. Process-local.
    #[serde(skip)]
    pub last_heartbeat: Option<Instant>,
}

impl Member {
    /// Construct an active member with no heartbeat recorded yet.
    pub fn new(id: impl Into<MemberId>, address: impl Into<String>, available_capacity: u64) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            status: MemberStatus::Active,
            available_capacity,
            chunk_count: 0,
            last_heartbeat: None,
        }
    }

    /// Whether placement may route chunks to this member.
    #[inline]
    pub fn is_placeable(&self) -> bool {
        self.status != MemberStatus::Dead
    }

    /// Time elapsed since the last heartbeat, if one was ever recorded.
    pub fn since_heartbeat(&self, now: Instant) -> Option<Duration> {
        self.last_heartbeat
            .map(|seen| now.saturating_duration_since(seen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_id_parse_rejects_blank() {
        assert!("".parse::<MemberId>().is_err());
        assert!("   ".parse::<MemberId>().is_err());
        assert_eq!("  n1 ".parse::<MemberId>().unwrap(), MemberId::new("n1"));
    }

    #[test]
    fn test_member_id_borrows_as_str() {
        let mut map = std::collections::HashMap::new();
        map.insert(MemberId::new("n1"), 1);
        assert_eq!(map.get("n1"), Some(&1));
    }

    #[test]
    fn test_new_member_is_active() {
        let member = Member::new("n1", "localhost:50052", 100);
        assert_eq!(member.status, MemberStatus::Active);
        assert!(member.is_placeable());
        assert_eq!(member.since_heartbeat(Instant::now()), None);
    }

    #[test]
    fn test_dead_member_is_not_placeable() {
        let mut member = Member::new("n1", "localhost:50052", 100);
        member.status = MemberStatus::Suspect;
        assert!(member.is_placeable());
        member.status = MemberStatus::Dead;
        assert!(!member.is_placeable());
    }

    #[test]
    fn test_since_heartbeat() {
        let mut member = Member::new("n1", "localhost:50052", 100);
        let seen = Instant::now();
        member.last_heartbeat = Some(seen);
        let later = seen + Duration::from_secs(3);
        assert_eq!(member.since_heartbeat(later), Some(Duration::from_secs(3)));
    }
}
