//! Liveness monitoring and eviction
//!
//! The eviction policy is a pure function from the current records and a
//! clock reading to the set of ids to remove; the timer-driven monitor
//! task applies it through the same removal path explicit unregister uses,
//! then refreshes the derived statistics. Evicting an id that a racing
//! unregister already removed is a no-op, not an error.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::api::Metrics;
use crate::config::RendezvousConfig;
use crate::registry::PeerRegistry;
use crate::stats::NetworkStatsAggregator;
use crate::types::PeerId;

/// Ids of peers whose inactivity exceeds the staleness timeout
pub fn stale_peer_ids(registry: &PeerRegistry, now: u64, timeout_secs: u64) -> Vec<PeerId> {
    registry
        .peers()
        .filter(|p| p.is_stale(now, timeout_secs))
        .map(|p| p.peer_id.clone())
        .collect()
}

/// Run the periodic liveness monitor
pub async fn run_liveness_monitor(
    config: Arc<RendezvousConfig>,
    registry: Arc<RwLock<PeerRegistry>>,
    stats: Arc<RwLock<NetworkStatsAggregator>>,
    metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
    info!(
        "🧹 Liveness monitor running (tick {}s, timeout {}s)",
        config.eviction_interval_secs, config.peer_timeout_secs
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.eviction_interval_secs));

    loop {
        interval.tick().await;
        let now = current_timestamp();

        // Policy first, under a read lock; mutation only when needed
        let stale = {
            let reg = registry.read().await;
            stale_peer_ids(&reg, now, config.peer_timeout_secs)
        };

        if !stale.is_empty() {
            let mut reg = registry.write().await;
            let mut evicted = 0u64;
            for id in &stale {
                if reg.remove(id) {
                    evicted += 1;
                    debug!("evicted stale peer {}", id);
                }
            }
            reg.check_region_index();
            if evicted > 0 {
                metrics.add_evicted(evicted);
                info!("🧹 Evicted {} stale peers", evicted);
            }
        }

        // Derived counters are recomputed from the live set every tick
        {
            let reg = registry.read().await;
            let mut agg = stats.write().await;
            agg.update_from_registry(&reg, now);

            let current = agg.current();
            metrics.set_active_peers(current.active_peers as u64);
            metrics.set_peak_peers(current.peak_peers as u64);

            debug!(
                "📊 Status: {} active peers ({} official, {} forks, {} custom), peak {}",
                current.active_peers,
                current.official,
                current.forks,
                current.custom,
                current.peak_peers
            );
        }
    }
}

/// Get current Unix timestamp
fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::select_bootstrap;
    use crate::classify::{classify_region, classify_trust};
    use crate::registry::PeerRecord;
    use crate::types::ClientMetadata;

    fn record_at(id: &str, region: &str, last_seen: u64) -> PeerRecord {
        PeerRecord {
            peer_id: id.to_string(),
            identity_key: format!("key-{}", id),
            address: "203.0.113.30:9000".to_string(),
            declared_port: None,
            classification: classify_trust(&ClientMetadata::default()),
            region: region.to_string(),
            registered_at: last_seen,
            last_seen,
            heartbeat_count: 0,
            link: None,
        }
    }

    #[test]
    fn test_stale_policy_only_flags_expired_peers() {
        let mut registry = PeerRegistry::new();
        registry.register(record_at("fresh", "us-east", 1_000)).unwrap();
        registry.register(record_at("stale", "us-east", 100)).unwrap();

        let stale = stale_peer_ids(&registry, 1_010, 90);
        assert_eq!(stale, vec!["stale".to_string()]);

        // Exactly at the threshold is still alive
        let stale = stale_peer_ids(&registry, 1_090, 90);
        assert_eq!(stale.len(), 1);
        let stale = stale_peer_ids(&registry, 1_091, 90);
        assert_eq!(stale.len(), 2);
    }

    #[test]
    fn test_eviction_of_removed_peer_is_noop() {
        let mut registry = PeerRegistry::new();
        registry.register(record_at("p1", "us-east", 100)).unwrap();

        let stale = stale_peer_ids(&registry, 10_000, 90);
        assert_eq!(stale, vec!["p1".to_string()]);

        // An unregister racing the tick wins; the tick's removal is a no-op
        assert!(registry.remove("p1"));
        assert!(!registry.remove("p1"));
    }

    /// Full lifecycle: register two peers, bootstrap one off the other,
    /// keep one alive, let the other expire, evict, inspect the survivors.
    #[test]
    fn test_registration_to_eviction_lifecycle() {
        let mut registry = PeerRegistry::new();
        let timeout = 90;
        let t0 = 1_000;

        let official = ClientMetadata {
            bundle_id: Some("io.meshwave.app".to_string()),
            ..Default::default()
        };

        let region = classify_region("93.184.216.34").to_string();

        let mut p1 = record_at("p1", &region, t0);
        p1.classification = classify_trust(&official);
        registry.register(p1).unwrap();

        let mut p2 = record_at("p2", &region, t0);
        p2.classification = classify_trust(&ClientMetadata::default());
        registry.register(p2).unwrap();

        // p1 bootstraps: p2 is untrusted, so it only arrives through the
        // tier-3 fallback that opens when the local pool is under strength
        let candidates = select_bootstrap(&registry, "p1", &region, 10);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].peer_id, "p2");

        // p1 keeps heartbeating, p2 goes quiet
        let t1 = t0 + 60;
        assert!(registry.heartbeat("p1", t1));

        let t2 = t0 + timeout + 30;
        assert!(registry.heartbeat("p1", t2));

        let stale = stale_peer_ids(&registry, t2, timeout);
        assert_eq!(stale, vec!["p2".to_string()]);
        for id in &stale {
            registry.remove(id);
        }

        let alive: Vec<&str> = registry
            .snapshot(|_| true)
            .iter()
            .map(|p| p.peer_id.as_str())
            .collect();
        assert_eq!(alive, vec!["p1"]);
        assert!(registry.check_region_index());
    }
}
