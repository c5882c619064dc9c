//! Heartbeat-based liveness.
//!
//! Members move `Active -> Suspect -> Dead` as their last heartbeat ages
//! past the configured timeouts. Dead members leave the ring but stay in the
//! table so operators can still see them; any heartbeat or re-registration
//! brings them back.
//!
//! Classification runs on a periodic background task, never on the query
//! path.

use std::sync::Arc;
use std::time::Instant;

use chunkmap_core::{MemberId, MemberStatus};
use metrics::{counter, gauge};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::LivenessConfig;
use crate::registry::{NodeRegistry, RegistryState};

/// Status changes made by one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Members that went from active to suspect.
    pub suspected: Vec<MemberId>,
    /// Members declared dead and removed from the ring.
    pub died: Vec<MemberId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.suspected.is_empty() && self.died.is_empty()
    }
}

/// Apply the timeouts to every member. Caller holds the write lock.
pub(crate) fn classify(
    state: &mut RegistryState,
    liveness: &LivenessConfig,
    now: Instant,
) -> SweepReport {
    let suspect_after = liveness.suspect_timeout();
    let dead_after = liveness.dead_timeout();
    let mut report = SweepReport::default();

    for member in state.members.values_mut() {
        let Some(silence) = member.since_heartbeat(now) else {
            continue;
        };

        match member.status {
            MemberStatus::Dead => {}
            _ if silence >= dead_after => {
                member.status = MemberStatus::Dead;
                report.died.push(member.id.clone());
            }
            MemberStatus::Active if silence >= suspect_after => {
                member.status = MemberStatus::Suspect;
                report.suspected.push(member.id.clone());
            }
            _ => {}
        }
    }

    for id in &report.died {
        state.ring.remove_member(id);
        warn!(member = %id, "member declared dead, removed from ring");
    }
    for id in &report.suspected {
        debug!(member = %id, "member is now suspect");
    }

    counter!("chunkmap_members_died_total").increment(report.died.len() as u64);
    gauge!("chunkmap_ring_members").set(state.ring.member_count() as f64);
    report
}

/// Start the periodic sweep.
///
/// Returns `None` when expiry is disabled in the registry's config. The task
/// exits once `shutdown` flips to `true` or its sender is dropped.
pub fn spawn_sweeper(
    registry: Arc<NodeRegistry>,
    mut shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    let period = registry.config().liveness.as_ref()?.sweep_interval();

    Some(tokio::spawn(async move {
        info!(?period, "liveness sweeper started");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    registry.sweep(Instant::now());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("liveness sweeper stopped");
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::RegistryConfig;
    use crate::registry::HeartbeatOutcome;

    fn registry() -> NodeRegistry {
        let liveness = LivenessConfig {
            suspect_timeout_secs: 10,
            dead_timeout_secs: 30,
            sweep_interval_secs: 1,
        };
        NodeRegistry::new(
            RegistryConfig::default()
                .with_replica_factor(16)
                .with_liveness(liveness),
        )
        .unwrap()
    }

    fn status(registry: &NodeRegistry, id: &str) -> MemberStatus {
        registry.get_member(id).unwrap().status
    }

    #[test]
    fn test_fresh_members_stay_active() {
        let registry = registry();
        registry.register("n1", "a:1", 100);
        assert!(registry.sweep(Instant::now()).is_empty());
        assert_eq!(status(&registry, "n1"), MemberStatus::Active);
    }

    #[test]
    fn test_active_suspect_dead() {
        let registry = registry();
        let start = Instant::now();
        registry.register_at("n1", "a:1", 100, start);
        registry.register_at("n2", "a:2", 100, start);

        let report = registry.sweep(start + Duration::from_secs(12));
        assert_eq!(report.suspected.len(), 2);
        assert_eq!(status(&registry, "n1"), MemberStatus::Suspect);
        assert_eq!(registry.ring_members().len(), 2, "suspects keep their vnodes");

        registry
            .heartbeat_at("n2", 100, 0, start + Duration::from_secs(25))
            .unwrap();
        let report = registry.sweep(start + Duration::from_secs(31));
        assert_eq!(report.died, vec![MemberId::new("n1")]);
        assert!(report.suspected.is_empty());
        assert_eq!(status(&registry, "n1"), MemberStatus::Dead);
        assert_eq!(status(&registry, "n2"), MemberStatus::Active);

        let on_ring = registry.ring_members();
        assert!(!on_ring.contains(&MemberId::new("n1")));
        assert!(on_ring.contains(&MemberId::new("n2")));
        assert_eq!(registry.len(), 2, "dead members stay listed");

        let placed = registry.resolve_placement("file1", 8).unwrap();
        assert!(placed.iter().all(|m| m.id.as_str() == "n2"));
    }

    #[test]
    fn test_suspect_goes_straight_to_dead() {
        let registry = registry();
        let start = Instant::now();
        registry.register_at("n1", "a:1", 100, start);

        let report = registry.sweep(start + Duration::from_secs(45));
        assert_eq!(report.died, vec![MemberId::new("n1")]);
        assert!(report.suspected.is_empty());
        assert!(registry.sweep(start + Duration::from_secs(90)).is_empty());
    }

    #[test]
    fn test_heartbeat_revives_dead_member() {
        let registry = registry();
        registry.register("n1", "a:1", 100);
        registry.sweep(Instant::now() + Duration::from_secs(60));
        assert_eq!(status(&registry, "n1"), MemberStatus::Dead);
        assert_eq!(registry.ring_entries(), 0);

        assert_eq!(registry.heartbeat("n1", 50, 3), Ok(HeartbeatOutcome::Revived));
        assert_eq!(status(&registry, "n1"), MemberStatus::Active);
        assert_eq!(registry.ring_entries(), 16);
    }

    #[test]
    fn test_reregister_revives_dead_member() {
        let registry = registry();
        registry.register("n1", "a:1", 100);
        registry.sweep(Instant::now() + Duration::from_secs(60));

        registry.register("n1", "a:1", 100);
        assert_eq!(status(&registry, "n1"), MemberStatus::Active);
        assert_eq!(registry.ring_entries(), 16);
    }

    #[test]
    fn test_sweep_disabled_without_liveness() {
        let registry = NodeRegistry::new(RegistryConfig::default()).unwrap();
        registry.register("n1", "a:1", 100);
        let report = registry.sweep(Instant::now() + Duration::from_secs(3600));
        assert!(report.is_empty());
        assert_eq!(status(&registry, "n1"), MemberStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_stops_on_shutdown() {
        let registry = Arc::new(registry());
        let (tx, rx) = watch::channel(false);
        let handle = spawn_sweeper(Arc::clone(&registry), rx).unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[test]
    fn test_no_sweeper_without_liveness() {
        let registry = Arc::new(NodeRegistry::new(RegistryConfig::default()).unwrap());
        let (_tx, rx) = watch::channel(false);
        assert!(spawn_sweeper(registry, rx).is_none());
    }
}
