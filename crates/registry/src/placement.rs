//! Chunk placement on the ring.

use std::collections::HashMap;

use chunkmap_core::{HashRing, Member, MemberId};
use tracing::warn;

use crate::config::ResolutionPolicy;
use crate::error::{RegistryError, Result};

/// Key hashed to place chunk `ordinal` of `file_id`.
///
/// The ordinal is rendered in decimal so every ordinal of a file yields a
/// distinct key.
pub fn placement_key(file_id: &str, ordinal: u32) -> String {
    format!("{file_id}_chunk_{ordinal}")
}

/// Resolve `chunk_count` chunks of `file_id` to members.
///
/// Borrows the registry's table and ring; the caller holds the lock and has
/// already bounded `chunk_count`.
pub(crate) fn resolve_chunks(
    members: &HashMap<MemberId, Member>,
    ring: &HashRing,
    policy: ResolutionPolicy,
    file_id: &str,
    chunk_count: u32,
) -> Result<Vec<Member>> {
    if !members.values().any(Member::is_placeable) {
        return match policy {
            ResolutionPolicy::Strict => Err(RegistryError::NoNodesAvailable),
            ResolutionPolicy::Lenient if members.is_empty() => Ok(Vec::new()),
            // Everyone is dead; hand out whoever is still on record.
            ResolutionPolicy::Lenient => Ok(fill_with_any(members, chunk_count)),
        };
    }

    let mut placed = Vec::new();
    for ordinal in 0..chunk_count {
        let key = placement_key(file_id, ordinal);
        let resolved = ring.resolve(&key);

        match resolved.and_then(|id| members.get(id)) {
            Some(member) => placed.push(member.clone()),
            None => {
                let member_id = resolved
                    .cloned()
                    .unwrap_or_else(|| MemberId::new(""));
                match policy {
                    ResolutionPolicy::Strict => {
                        return Err(RegistryError::StaleAssignment { member_id, ordinal });
                    }
                    ResolutionPolicy::Lenient => {
                        warn!(file_id, ordinal, %member_id, "stale ring entry, substituting");
                        if let Some(member) = any_member(members) {
                            placed.push(member.clone());
                        }
                    }
                }
            }
        }
    }

    Ok(placed)
}

/// Arbitrary member, preferring placeable ones. Iteration-order dependent.
fn any_member(members: &HashMap<MemberId, Member>) -> Option<&Member> {
    members
        .values()
        .find(|m| m.is_placeable())
        .or_else(|| members.values().next())
}

fn fill_with_any(members: &HashMap<MemberId, Member>, chunk_count: u32) -> Vec<Member> {
    any_member(members)
        .map(|m| std::iter::repeat(m).take(chunk_count as usize).cloned().collect())
        .unwrap_or_default()
}
