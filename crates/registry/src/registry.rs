//! The node registry.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use chunkmap_core::{HashRing, Member, MemberId, MemberStatus, RingBuilder};
use metrics::{counter, gauge};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::{RegistryConfig, ResolutionPolicy};
use crate::error::{RegistryError, Result};
use crate::liveness::{self, SweepReport};
use crate::metadata::{ChunkAssignment, FileMetadata};
use crate::placement::{placement_key, resolve_chunks};

/// What a registration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// First time this id was seen.
    Created,
    /// The id was known; its record was overwritten.
    Updated,
}

impl RegisterOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            RegisterOutcome::Created => "node registered successfully",
            RegisterOutcome::Updated => "node re-registered, record replaced",
        }
    }
}

/// What a heartbeat did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// Status and capacity refreshed.
    Applied,
    /// The member had been declared dead and is back on the ring.
    Revived,
    /// Unknown member under the lenient policy; nothing changed.
    Ignored,
}

/// Everything guarded by the registry lock.
///
/// Invariant: the ring holds exactly the members of `members` whose status
/// is not [`MemberStatus::Dead`].
#[derive(Debug)]
pub(crate) struct RegistryState {
    pub(crate) members: HashMap<MemberId, Member>,
    pub(crate) ring: HashRing,
    pub(crate) files: HashMap<String, FileMetadata>,
}

/// Authoritative in-memory record of cluster membership.
///
/// One instance is shared (behind an `Arc`) by every connection. Mutations
/// take the write lock, queries the read lock; no I/O happens under either.
#[derive(Debug)]
pub struct NodeRegistry {
    config: RegistryConfig,
    state: RwLock<RegistryState>,
}

impl NodeRegistry {
    pub fn new(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        let ring = RingBuilder::new()
            .with_replica_factor(config.replica_factor)
            .build()?;

        Ok(Self {
            config,
            state: RwLock::new(RegistryState {
                members: HashMap::new(),
                ring,
                files: HashMap::new(),
            }),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.config.policy
    }

    /// Upsert a member as active.
    ///
    /// The previous record, if any, is replaced wholesale. The member joins
    /// the ring only if it is not already on it, so repeated registration
    /// never duplicates virtual nodes.
    pub fn register(
        &self,
        id: impl Into<MemberId>,
        address: impl Into<String>,
        available_capacity: u64,
    ) -> RegisterOutcome {
        self.register_at(id, address, available_capacity, Instant::now())
    }

    /// [`Self::register`] with an explicit clock.
    pub fn register_at(
        &self,
        id: impl Into<MemberId>,
        address: impl Into<String>,
        available_capacity: u64,
        now: Instant,
    ) -> RegisterOutcome {
        let mut member = Member::new(id, address, available_capacity);
        member.last_heartbeat = Some(now);
        let id = member.id.clone();

        let mut state = self.state.write();
        let previous = state.members.insert(id.clone(), member);
        let on_ring = previous.as_ref().is_some_and(Member::is_placeable);
        if !on_ring {
            state.ring.add_member(&id);
        }
        let total = state.members.len();
        drop(state);

        let outcome = if previous.is_some() {
            RegisterOutcome::Updated
        } else {
            RegisterOutcome::Created
        };

        counter!("chunkmap_registrations_total").increment(1);
        gauge!("chunkmap_members").set(total as f64);
        info!(member = %id, available_capacity, ?outcome, "member registered");
        outcome
    }

    /// Record a heartbeat.
    ///
    /// Marks the member active and refreshes its capacity and chunk count. A
    /// dead member is put back on the ring.
    pub fn heartbeat(
        &self,
        id: &str,
        available_capacity: u64,
        chunk_count: u64,
    ) -> Result<HeartbeatOutcome> {
        self.heartbeat_at(id, available_capacity, chunk_count, Instant::now())
    }

    /// [`Self::heartbeat`] with an explicit clock.
    pub fn heartbeat_at(
        &self,
        id: &str,
        available_capacity: u64,
        chunk_count: u64,
        now: Instant,
    ) -> Result<HeartbeatOutcome> {
        let mut state = self.state.write();
        let state = &mut *state;

        let Some(member) = state.members.get_mut(id) else {
            counter!("chunkmap_heartbeats_total", "outcome" => "unknown").increment(1);
            warn!(member = id, "heartbeat from unknown member");
            return match self.config.policy {
                ResolutionPolicy::Strict => Err(RegistryError::UnknownMember(MemberId::new(id))),
                ResolutionPolicy::Lenient => Ok(HeartbeatOutcome::Ignored),
            };
        };

        let revived = member.status == MemberStatus::Dead;
        member.status = MemberStatus::Active;
        member.available_capacity = available_capacity;
        member.chunk_count = chunk_count;
        member.last_heartbeat = Some(now);

        if revived {
            state.ring.add_member(&member.id);
            counter!("chunkmap_heartbeats_total", "outcome" => "revived").increment(1);
            info!(member = id, "dead member revived by heartbeat");
            Ok(HeartbeatOutcome::Revived)
        } else {
            counter!("chunkmap_heartbeats_total", "outcome" => "applied").increment(1);
            debug!(member = id, available_capacity, chunk_count, "heartbeat");
            Ok(HeartbeatOutcome::Applied)
        }
    }

    /// Remove a member from the table and the ring.
    pub fn deregister(&self, id: &str) -> Result<Member> {
        let mut state = self.state.write();
        let member = state
            .members
            .remove(id)
            .ok_or_else(|| RegistryError::UnknownMember(MemberId::new(id)))?;
        state.ring.remove_member(&member.id);
        let total = state.members.len();
        drop(state);

        gauge!("chunkmap_members").set(total as f64);
        info!(member = id, "member deregistered");
        Ok(member)
    }

    /// Members responsible for each chunk of a file, in ordinal order.
    ///
    /// Read-only: nothing is recorded. See [`Self::assign_placement`].
    /// Counts past `max_chunks_per_file` fail with
    /// [`RegistryError::TooManyChunks`].
    pub fn resolve_placement(&self, file_id: &str, chunk_count: u32) -> Result<Vec<Member>> {
        self.check_chunk_count(chunk_count)?;
        let state = self.state.read();
        let placed = resolve_chunks(
            &state.members,
            &state.ring,
            self.config.policy,
            file_id,
            chunk_count,
        )?;
        counter!("chunkmap_placements_total").increment(1);
        Ok(placed)
    }

    /// Resolve placement for an upload and record it as the file's chunk
    /// index, replacing any earlier record for the same file.
    ///
    /// Nothing is recorded when fewer members than chunks came back (lenient
    /// policy on an empty cluster).
    pub fn assign_placement(&self, file_id: &str, chunk_count: u32) -> Result<Vec<Member>> {
        self.check_chunk_count(chunk_count)?;
        let mut state = self.state.write();
        let placed = resolve_chunks(
            &state.members,
            &state.ring,
            self.config.policy,
            file_id,
            chunk_count,
        )?;

        if placed.len() == chunk_count as usize {
            let chunks = placed
                .iter()
                .zip(0..chunk_count)
                .map(|(member, ordinal)| ChunkAssignment {
                    ordinal,
                    placement_key: placement_key(file_id, ordinal),
                    member_id: member.id.clone(),
                })
                .collect();
            state.files.insert(
                file_id.to_string(),
                FileMetadata {
                    file_id: file_id.to_string(),
                    chunk_count,
                    chunks,
                },
            );
            debug!(file_id, chunk_count, "recorded chunk placement");
        }
        drop(state);

        counter!("chunkmap_placements_total").increment(1);
        Ok(placed)
    }

    /// Reject requests past `max_chunks_per_file` before any lock is taken.
    fn check_chunk_count(&self, chunk_count: u32) -> Result<()> {
        let max = self.config.max_chunks_per_file;
        if chunk_count > max {
            counter!("chunkmap_placements_rejected_total").increment(1);
            warn!(chunk_count, max, "placement request over chunk limit");
            return Err(RegistryError::TooManyChunks {
                requested: chunk_count,
                max,
            });
        }
        Ok(())
    }

    /// The recorded chunk index of a file.
    pub fn file_metadata(&self, file_id: &str) -> Option<FileMetadata> {
        self.state.read().files.get(file_id).cloned()
    }

    /// Current member records for each chunk of a recorded file.
    ///
    /// Fails with [`RegistryError::StaleAssignment`] if a chunk was assigned
    /// to a member that has since deregistered.
    pub fn locate_file(&self, file_id: &str) -> Result<Vec<Member>> {
        let state = self.state.read();
        let metadata = state
            .files
            .get(file_id)
            .ok_or_else(|| RegistryError::UnknownFile(file_id.to_string()))?;

        metadata
            .chunks
            .iter()
            .map(|chunk| {
                state
                    .members
                    .get(&chunk.member_id)
                    .cloned()
                    .ok_or_else(|| RegistryError::StaleAssignment {
                        member_id: chunk.member_id.clone(),
                        ordinal: chunk.ordinal,
                    })
            })
            .collect()
    }

    pub fn get_member(&self, id: &str) -> Option<Member> {
        self.state.read().members.get(id).cloned()
    }

    /// Snapshot of every member. Order is unspecified.
    pub fn list_members(&self) -> Vec<Member> {
        self.state.read().members.values().cloned().collect()
    }

    /// Ids currently on the ring (every member that is not dead).
    pub fn ring_members(&self) -> BTreeSet<MemberId> {
        self.state.read().ring.members()
    }

    /// Total virtual nodes on the ring.
    pub fn ring_entries(&self) -> usize {
        self.state.read().ring.entry_count()
    }

    pub fn len(&self) -> usize {
        self.state.read().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().members.is_empty()
    }

    /// Reclassify members by heartbeat age as of `now`.
    ///
    /// No-op when expiry is disabled.
    pub fn sweep(&self, now: Instant) -> SweepReport {
        let Some(liveness) = &self.config.liveness else {
            return SweepReport::default();
        };

        let mut state = self.state.write();
        let report = liveness::classify(&mut state, liveness, now);
        drop(state);

        if !report.is_empty() {
            info!(
                suspected = report.suspected.len(),
                died = report.died.len(),
                "liveness sweep changed member status"
            );
        }
        report
    }
}
