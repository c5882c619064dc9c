//! Registry behaviour under both resolution policies.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use chunkmap_core::{MemberId, MemberStatus};
use chunkmap_registry::{
    HeartbeatOutcome, NodeRegistry, RegisterOutcome, RegistryConfig, RegistryError,
    DEFAULT_MAX_CHUNKS_PER_FILE,
};
use proptest::prelude::*;

fn strict() -> NodeRegistry {
    NodeRegistry::new(RegistryConfig::default()).unwrap()
}

fn lenient() -> NodeRegistry {
    NodeRegistry::new(RegistryConfig::lenient()).unwrap()
}

fn ids(members: &[chunkmap_core::Member]) -> Vec<&str> {
    members.iter().map(|m| m.id.as_str()).collect()
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_idempotent_reregistration() {
    let registry = strict();
    registry.register("n1", "localhost:50052", 100);
    registry.register("n2", "localhost:50053", 100);

    let entries = registry.ring_entries();
    let ring_members = registry.ring_members();
    let before = registry.resolve_placement("file1", 32).unwrap();

    assert_eq!(
        registry.register("n1", "localhost:50052", 100),
        RegisterOutcome::Updated
    );

    assert_eq!(registry.ring_entries(), entries);
    assert_eq!(registry.ring_members(), ring_members);
    let after = registry.resolve_placement("file1", 32).unwrap();
    assert_eq!(ids(&before), ids(&after));
}

#[test]
fn test_registration_overwrites_wholesale() {
    let registry = strict();
    registry.register("n1", "old:1", 100);
    registry.register("n1", "new:1", 7);

    let member = registry.get_member("n1").unwrap();
    assert_eq!(member.address, "new:1");
    assert_eq!(member.available_capacity, 7);
    assert_eq!(member.status, MemberStatus::Active);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_get_and_list() {
    let registry = strict();
    assert!(registry.is_empty());
    assert!(registry.get_member("n1").is_none());

    registry.register("n1", "a:1", 1);
    registry.register("n2", "a:2", 2);

    let listed: HashSet<_> = registry
        .list_members()
        .into_iter()
        .map(|m| m.id.into_inner())
        .collect();
    assert_eq!(listed, HashSet::from(["n1".to_string(), "n2".to_string()]));
}

// ============================================================================
// Heartbeats
// ============================================================================

#[test]
fn test_heartbeat_refreshes_capacity() {
    let registry = strict();
    registry.register("n1", "a:1", 100);

    assert_eq!(registry.heartbeat("n1", 40, 12), Ok(HeartbeatOutcome::Applied));
    let member = registry.get_member("n1").unwrap();
    assert_eq!(member.available_capacity, 40);
    assert_eq!(member.chunk_count, 12);
}

#[test]
fn test_unknown_heartbeat_strict() {
    let registry = strict();
    registry.register("n1", "a:1", 100);

    assert_eq!(
        registry.heartbeat("unknown-id", 1, 1),
        Err(RegistryError::UnknownMember(MemberId::new("unknown-id")))
    );
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_unknown_heartbeat_lenient_is_silently_accepted() {
    let registry = lenient();
    registry.register("n1", "a:1", 100);
    let before = registry.list_members();

    assert_eq!(registry.heartbeat("unknown-id", 1, 1), Ok(HeartbeatOutcome::Ignored));
    assert_eq!(registry.list_members(), before);
}

// ============================================================================
// Placement
// ============================================================================

#[test]
fn test_single_member_takes_every_chunk() {
    for registry in [strict(), lenient()] {
        registry.register("n1", "localhost:50052", 100);
        let placed = registry.resolve_placement("file1", 4).unwrap();
        assert_eq!(ids(&placed), vec!["n1"; 4]);
    }
}

#[test]
fn test_empty_cluster() {
    assert_eq!(
        strict().resolve_placement("file1", 4),
        Err(RegistryError::NoNodesAvailable)
    );
    assert_eq!(lenient().resolve_placement("file1", 4), Ok(Vec::new()));
}

#[test]
fn test_placement_is_deterministic_and_spread() {
    let registry = strict();
    for i in 0..4 {
        registry.register(format!("n{i}"), format!("host{i}:50052"), 100);
    }

    let first = registry.resolve_placement("movie.mkv-1700000000", 64).unwrap();
    let second = registry.resolve_placement("movie.mkv-1700000000", 64).unwrap();
    assert_eq!(first.len(), 64);
    assert_eq!(ids(&first), ids(&second));

    // Ordinals past 9 get their own keys, so chunks spread over the cluster.
    let distinct: HashSet<_> = ids(&first[10..]).into_iter().collect();
    assert!(distinct.len() > 1, "chunks 10.. all landed on {distinct:?}");
}

#[test]
fn test_assign_placement_records_metadata() {
    let registry = strict();
    registry.register("n1", "a:1", 100);
    registry.register("n2", "a:2", 100);

    let placed = registry.assign_placement("file1", 6).unwrap();
    let metadata = registry.file_metadata("file1").unwrap();

    assert_eq!(metadata.chunk_count, 6);
    assert_eq!(metadata.chunks.len(), 6);
    for (ordinal, (chunk, member)) in metadata.chunks.iter().zip(&placed).enumerate() {
        assert_eq!(chunk.ordinal as usize, ordinal);
        assert_eq!(chunk.placement_key, format!("file1_chunk_{ordinal}"));
        assert_eq!(chunk.member_id, member.id);
    }
    assert_eq!(metadata.member_for(0), Some(&placed[0].id));
    assert_eq!(metadata.member_for(6), None);

    assert_eq!(ids(&registry.locate_file("file1").unwrap()), ids(&placed));
}

#[test]
fn test_recorded_placement_survives_ring_change() {
    let registry = strict();
    registry.register("n1", "a:1", 100);
    let placed = registry.assign_placement("file1", 8).unwrap();

    // New members change the ring, not where file1's chunks went.
    registry.register("n2", "a:2", 100);
    registry.register("n3", "a:3", 100);
    assert_eq!(ids(&registry.locate_file("file1").unwrap()), ids(&placed));
}

#[test]
fn test_locate_file_errors() {
    let registry = strict();
    assert_eq!(
        registry.locate_file("nope"),
        Err(RegistryError::UnknownFile("nope".into()))
    );

    registry.register("n1", "a:1", 100);
    registry.assign_placement("file1", 2).unwrap();
    registry.deregister("n1").unwrap();
    assert_eq!(
        registry.locate_file("file1"),
        Err(RegistryError::StaleAssignment {
            member_id: MemberId::new("n1"),
            ordinal: 0
        })
    );
}

#[test]
fn test_lenient_empty_assignment_not_recorded() {
    let registry = lenient();
    assert_eq!(registry.assign_placement("file1", 3), Ok(Vec::new()));
    assert!(registry.file_metadata("file1").is_none());
}

#[test]
fn test_chunk_count_over_limit_rejected() {
    for registry in [strict(), lenient()] {
        registry.register("n1", "a:1", 100);

        assert_eq!(
            registry.resolve_placement("f", u32::MAX),
            Err(RegistryError::TooManyChunks {
                requested: u32::MAX,
                max: DEFAULT_MAX_CHUNKS_PER_FILE
            })
        );
        assert!(matches!(
            registry.assign_placement("f", DEFAULT_MAX_CHUNKS_PER_FILE + 1),
            Err(RegistryError::TooManyChunks { .. })
        ));
        assert!(registry.file_metadata("f").is_none());
    }
}

#[test]
fn test_chunk_count_at_limit_accepted() {
    let registry =
        NodeRegistry::new(RegistryConfig::default().with_max_chunks_per_file(100)).unwrap();
    registry.register("n1", "a:1", 100);

    assert_eq!(registry.assign_placement("f", 100).unwrap().len(), 100);
    assert!(matches!(
        registry.assign_placement("f", 101),
        Err(RegistryError::TooManyChunks { requested: 101, max: 100 })
    ));
    // The rejected request left the earlier record alone.
    assert_eq!(registry.file_metadata("f").unwrap().chunk_count, 100);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_heartbeats_and_queries() {
    let registry = Arc::new(strict());
    for i in 0..8 {
        registry.register(format!("n{i}"), format!("host{i}:50052"), 100);
    }

    thread::scope(|scope| {
        for i in 0..8 {
            let registry = Arc::clone(&registry);
            scope.spawn(move || {
                for round in 0..200u64 {
                    registry
                        .heartbeat(&format!("n{i}"), 100 - round % 50, round)
                        .unwrap();
                }
            });
        }
        for _ in 0..4 {
            let registry = Arc::clone(&registry);
            scope.spawn(move || {
                for round in 0..200u32 {
                    let placed = registry
                        .resolve_placement(&format!("file{round}"), 5)
                        .unwrap();
                    assert_eq!(placed.len(), 5);
                    assert_eq!(registry.list_members().len(), 8);
                }
            });
        }
    });

    for member in registry.list_members() {
        assert_eq!(member.chunk_count, 199);
        assert_eq!(member.status, MemberStatus::Active);
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_placement_only_names_registered_members(
        member_count in 1usize..8,
        file_id in "[a-z0-9.-]{1,24}",
        chunk_count in 0u32..40,
    ) {
        let registry = NodeRegistry::new(RegistryConfig::default().with_replica_factor(16)).unwrap();
        for i in 0..member_count {
            registry.register(format!("n{i}"), format!("host{i}:1"), 100);
        }

        let placed = registry.resolve_placement(&file_id, chunk_count).unwrap();
        prop_assert_eq!(placed.len(), chunk_count as usize);
        for member in &placed {
            prop_assert!(registry.get_member(member.id.as_str()).is_some());
        }

        let again = registry.resolve_placement(&file_id, chunk_count).unwrap();
        prop_assert_eq!(ids(&placed), ids(&again));
    }
}
