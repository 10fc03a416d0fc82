//! Bootstrap peer selection
//!
//! Builds the initial candidate list a newly registered peer should dial.
//! Selection walks three priority tiers until the cap is reached:
//! official builds in the requester's region first, then any
//! non-untrusted peer in the region, and only when the pool is still
//! nearly empty, peers from anywhere. The requester itself is never a
//! candidate and no peer appears twice.

use std::collections::HashSet;

use crate::registry::{PeerRecord, PeerRegistry};
use crate::types::{AppVariant, BootstrapCandidate, TrustLevel};

/// Default cap on returned candidates
pub const DEFAULT_MAX_PEERS: usize = 10;

/// Tier 1 (official + same region) contributes at most this many
pub const TIER1_CAP: usize = 4;

/// Tier 3 only fires when fewer candidates than this were found locally
pub const TIER3_THRESHOLD: usize = 3;

/// Select up to `max_peers` bootstrap candidates for a requesting peer
pub fn select_bootstrap(
    registry: &PeerRegistry,
    requester_id: &str,
    region: &str,
    max_peers: usize,
) -> Vec<BootstrapCandidate> {
    let mut selected: Vec<&PeerRecord> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(requester_id);

    // Tier 1: official builds in the requester's region
    let mut tier1: Vec<&PeerRecord> = registry
        .region_peers(region)
        .into_iter()
        .filter(|p| p.classification.app_variant == AppVariant::Official)
        .filter(|p| !seen.contains(p.peer_id.as_str()))
        .collect();
    sort_most_recent_first(&mut tier1);

    for peer in tier1.into_iter().take(TIER1_CAP) {
        if selected.len() >= max_peers {
            break;
        }
        seen.insert(peer.peer_id.as_str());
        selected.push(peer);
    }

    // Tier 2: anything non-untrusted in the region fills the cap
    let mut tier2: Vec<&PeerRecord> = registry
        .region_peers(region)
        .into_iter()
        .filter(|p| p.classification.trust_level != TrustLevel::Untrusted)
        .filter(|p| !seen.contains(p.peer_id.as_str()))
        .collect();
    sort_most_recent_first(&mut tier2);

    for peer in tier2 {
        if selected.len() >= max_peers {
            break;
        }
        seen.insert(peer.peer_id.as_str());
        selected.push(peer);
    }

    // Tier 3: global fallback, only when the local pool came up short
    if selected.len() < TIER3_THRESHOLD {
        let mut tier3: Vec<&PeerRecord> = registry
            .peers()
            .filter(|p| !seen.contains(p.peer_id.as_str()))
            .collect();
        sort_most_recent_first(&mut tier3);

        for peer in tier3 {
            if selected.len() >= max_peers {
                break;
            }
            selected.push(peer);
        }
    }

    selected.iter().map(|p| p.candidate()).collect()
}

/// Within-tier order: liveliest peers first, peer id as the final tie-break
fn sort_most_recent_first(peers: &mut [&PeerRecord]) {
    peers.sort_by(|a, b| {
        b.last_seen
            .cmp(&a.last_seen)
            .then_with(|| a.peer_id.cmp(&b.peer_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PeerRecord;
    use crate::types::Classification;

    fn record(id: &str, region: &str, variant: AppVariant, last_seen: u64) -> PeerRecord {
        let (trust_level, is_official) = match variant {
            AppVariant::Official => (TrustLevel::Trusted, true),
            AppVariant::Fork => (TrustLevel::SemiTrusted, false),
            AppVariant::Custom => (TrustLevel::Untrusted, false),
        };

        PeerRecord {
            peer_id: id.to_string(),
            identity_key: format!("key-{}", id),
            address: "203.0.113.20:9000".to_string(),
            declared_port: None,
            classification: Classification {
                app_variant: variant,
                trust_level,
                is_official,
            },
            region: region.to_string(),
            registered_at: 1_000,
            last_seen,
            heartbeat_count: 0,
            link: None,
        }
    }

    #[test]
    fn test_officials_rank_before_semi_trusted() {
        let mut registry = PeerRegistry::new();
        registry.register(record("o1", "us-east", AppVariant::Official, 100)).unwrap();
        registry.register(record("o2", "us-east", AppVariant::Official, 100)).unwrap();
        registry.register(record("o3", "eu-west", AppVariant::Official, 100)).unwrap();
        registry.register(record("t1", "us-east", AppVariant::Fork, 100)).unwrap();
        registry.register(record("req", "us-east", AppVariant::Official, 100)).unwrap();

        let peers = select_bootstrap(&registry, "req", "us-east", DEFAULT_MAX_PEERS);

        let ids: Vec<&str> = peers.iter().map(|p| p.peer_id.as_str()).collect();
        let pos = |id: &str| ids.iter().position(|x| *x == id);

        assert!(pos("o1").unwrap() < pos("t1").unwrap());
        assert!(pos("o2").unwrap() < pos("t1").unwrap());
        assert!(pos("req").is_none());
        // o3 sits in another region; with 3 local candidates tier 3 stays shut
        assert!(pos("o3").is_none());
    }

    #[test]
    fn test_tier1_is_capped() {
        let mut registry = PeerRegistry::new();
        for i in 0..8 {
            registry
                .register(record(&format!("o{}", i), "us-east", AppVariant::Official, 100 + i))
                .unwrap();
        }

        let peers = select_bootstrap(&registry, "req", "us-east", DEFAULT_MAX_PEERS);

        // All eight come back (tier 2 also matches officials), but the list
        // stays duplicate-free
        assert_eq!(peers.len(), 8);
        let mut ids: Vec<_> = peers.iter().map(|p| p.peer_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn test_tier3_fallback_when_region_is_sparse() {
        let mut registry = PeerRegistry::new();
        registry.register(record("p1", "us-east", AppVariant::Official, 100)).unwrap();
        registry.register(record("far1", "eu-west", AppVariant::Custom, 100)).unwrap();
        registry.register(record("far2", "ap-southeast", AppVariant::Custom, 100)).unwrap();

        let peers = select_bootstrap(&registry, "req", "us-east", DEFAULT_MAX_PEERS);

        // Only one local candidate (< 3): tier 3 pulls in the rest
        assert_eq!(peers.len(), 3);
        assert_eq!(peers[0].peer_id, "p1");
    }

    #[test]
    fn test_tier3_stays_shut_with_enough_local_peers() {
        let mut registry = PeerRegistry::new();
        for i in 0..3 {
            registry
                .register(record(&format!("o{}", i), "us-east", AppVariant::Official, 100))
                .unwrap();
        }
        registry.register(record("far", "eu-west", AppVariant::Custom, 100)).unwrap();

        let peers = select_bootstrap(&registry, "req", "us-east", DEFAULT_MAX_PEERS);

        assert_eq!(peers.len(), 3);
        assert!(peers.iter().all(|p| p.peer_id != "far"));
    }

    #[test]
    fn test_untrusted_local_peer_used_only_as_fallback() {
        let mut registry = PeerRegistry::new();
        registry.register(record("c1", "us-east", AppVariant::Custom, 100)).unwrap();

        let peers = select_bootstrap(&registry, "req", "us-east", DEFAULT_MAX_PEERS);

        // Nothing in tiers 1-2, so the untrusted local peer arrives via tier 3
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].peer_id, "c1");
    }

    #[test]
    fn test_cap_respected() {
        let mut registry = PeerRegistry::new();
        for i in 0..20 {
            registry
                .register(record(&format!("o{}", i), "us-east", AppVariant::Official, 100 + i))
                .unwrap();
        }

        let peers = select_bootstrap(&registry, "req", "us-east", 5);
        assert_eq!(peers.len(), 5);
    }

    #[test]
    fn test_within_tier_order_prefers_recently_seen() {
        let mut registry = PeerRegistry::new();
        registry.register(record("stale", "us-east", AppVariant::Official, 100)).unwrap();
        registry.register(record("fresh", "us-east", AppVariant::Official, 900)).unwrap();

        let peers = select_bootstrap(&registry, "req", "us-east", DEFAULT_MAX_PEERS);
        assert_eq!(peers[0].peer_id, "fresh");
    }
}
