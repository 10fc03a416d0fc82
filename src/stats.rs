//! Network statistics aggregation
//!
//! Derives aggregate counters from the live registry on every refresh.
//! Counters are never trusted to stay correct incrementally across the
//! add/remove paths; each refresh recomputes them from scratch, so drift
//! cannot accumulate. Only the peak-peers watermark carries over.

use crate::registry::PeerRegistry;
use crate::types::{AppVariant, NetworkStats, PeerSummary};

/// Recomputes and caches the last [`NetworkStats`] snapshot
pub struct NetworkStatsAggregator {
    started_at: u64,

    /// High-water mark of concurrently registered peers
    peak_peers: usize,

    current: NetworkStats,
}

impl NetworkStatsAggregator {
    pub fn new(now: u64) -> Self {
        Self {
            started_at: now,
            peak_peers: 0,
            current: NetworkStats {
                timestamp: now,
                ..Default::default()
            },
        }
    }

    /// Recompute every derived counter from the live set
    pub fn update_from_registry(&mut self, registry: &PeerRegistry, now: u64) {
        let mut official = 0;
        let mut forks = 0;
        let mut custom = 0;

        for peer in registry.peers() {
            match peer.classification.app_variant {
                AppVariant::Official => official += 1,
                AppVariant::Fork => forks += 1,
                AppVariant::Custom => custom += 1,
            }
        }

        let active_peers = registry.len();
        self.peak_peers = self.peak_peers.max(active_peers);

        self.current = NetworkStats {
            active_peers,
            official,
            forks,
            custom,
            peak_peers: self.peak_peers,
            total_registrations: registry.total_registrations(),
            regions: registry.region_distribution(),
            timestamp: now,
        };
    }

    /// Last computed snapshot
    pub fn current(&self) -> NetworkStats {
        self.current.clone()
    }

    pub fn peak_peers(&self) -> usize {
        self.peak_peers
    }

    pub fn started_at(&self) -> u64 {
        self.started_at
    }
}

/// Peers registered within the trailing window, most recent first
pub fn recent_activity(registry: &PeerRegistry, window_secs: u64, now: u64) -> Vec<PeerSummary> {
    let mut recent: Vec<_> = registry
        .snapshot(|p| now.saturating_sub(p.registered_at) <= window_secs)
        .into_iter()
        .collect();

    recent.sort_by(|a, b| {
        b.registered_at
            .cmp(&a.registered_at)
            .then_with(|| a.peer_id.cmp(&b.peer_id))
    });

    recent.into_iter().map(|p| p.summary()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PeerRecord;
    use crate::types::{Classification, TrustLevel};

    fn record(id: &str, variant: AppVariant, registered_at: u64) -> PeerRecord {
        let (trust_level, is_official) = match variant {
            AppVariant::Official => (TrustLevel::Trusted, true),
            AppVariant::Fork => (TrustLevel::SemiTrusted, false),
            AppVariant::Custom => (TrustLevel::Untrusted, false),
        };

        PeerRecord {
            peer_id: id.to_string(),
            identity_key: format!("key-{}", id),
            address: "198.51.100.77:9000".to_string(),
            declared_port: None,
            classification: Classification {
                app_variant: variant,
                trust_level,
                is_official,
            },
            region: "eu-west".to_string(),
            registered_at,
            last_seen: registered_at,
            heartbeat_count: 0,
            link: None,
        }
    }

    #[test]
    fn test_counters_derived_from_live_set() {
        let mut registry = PeerRegistry::new();
        registry.register(record("o1", AppVariant::Official, 100)).unwrap();
        registry.register(record("f1", AppVariant::Fork, 100)).unwrap();
        registry.register(record("f2", AppVariant::Fork, 100)).unwrap();
        registry.register(record("c1", AppVariant::Custom, 100)).unwrap();

        let mut aggregator = NetworkStatsAggregator::new(100);
        aggregator.update_from_registry(&registry, 200);

        let stats = aggregator.current();
        assert_eq!(stats.active_peers, 4);
        assert_eq!(stats.official, 1);
        assert_eq!(stats.forks, 2);
        assert_eq!(stats.custom, 1);
        assert_eq!(stats.total_registrations, 4);
        assert_eq!(stats.regions.get("eu-west"), Some(&4));
        assert_eq!(stats.timestamp, 200);
    }

    #[test]
    fn test_peak_peers_is_a_watermark() {
        let mut registry = PeerRegistry::new();
        let mut aggregator = NetworkStatsAggregator::new(0);

        for i in 0..5 {
            registry.register(record(&format!("p{}", i), AppVariant::Custom, 100)).unwrap();
        }
        aggregator.update_from_registry(&registry, 200);
        assert_eq!(aggregator.current().peak_peers, 5);

        for i in 0..4 {
            registry.remove(&format!("p{}", i));
        }
        aggregator.update_from_registry(&registry, 300);

        let stats = aggregator.current();
        assert_eq!(stats.active_peers, 1);
        assert_eq!(stats.peak_peers, 5);
        // Removal never rewinds the registration counter either
        assert_eq!(stats.total_registrations, 5);
    }

    #[test]
    fn test_recent_activity_window() {
        let mut registry = PeerRegistry::new();
        registry.register(record("old", AppVariant::Custom, 100)).unwrap();
        registry.register(record("new1", AppVariant::Custom, 950)).unwrap();
        registry.register(record("new2", AppVariant::Custom, 990)).unwrap();

        let recent = recent_activity(&registry, 300, 1_000);

        let ids: Vec<&str> = recent.iter().map(|p| p.peer_id.as_str()).collect();
        assert_eq!(ids, vec!["new2", "new1"]);
    }
}
