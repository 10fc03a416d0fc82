//! Proximity index over identity keys
//!
//! A flat, distance-ordered lookup approximating Kademlia's closest-node
//! query without its hierarchical buckets. Identity keys are hashed to
//! fixed-length Blake3 digests; distance is the per-byte XOR of two
//! digests, ordered as an unsigned big integer. Ordering MUST stay
//! numeric: comparing hex strings lexically breaks down once digests
//! differ in leading zero bytes.

use std::cmp::Ordering;

use tracing::debug;

use crate::registry::PeerRegistry;
use crate::types::ClosestPeer;

/// 32-byte Blake3 digest of an identity key
pub type KeyDigest = [u8; 32];

/// Hash an identity key into the metric space
pub fn key_digest(key: &str) -> KeyDigest {
    *blake3::hash(key.as_bytes()).as_bytes()
}

/// Per-byte XOR of two digests
pub fn xor_distance(a: &KeyDigest, b: &KeyDigest) -> KeyDigest {
    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = a[i] ^ b[i];
    }
    out
}

/// Compare two distances as unsigned big-endian integers
///
/// Byte-wise comparison over fixed-length arrays is exactly numeric order;
/// leading zero bytes sort before any nonzero byte.
pub fn distance_cmp(a: &KeyDigest, b: &KeyDigest) -> Ordering {
    for i in 0..32 {
        match a[i].cmp(&b[i]) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Return up to `k` registered peers ordered by ascending XOR distance to
/// `target_key`
///
/// Includes the caller's own record when registered: proximity queries are
/// symmetric, unlike bootstrap selection. Returns everyone when fewer than
/// `k` peers exist.
pub fn find_closest(registry: &PeerRegistry, target_key: &str, k: usize) -> Vec<ClosestPeer> {
    let target = key_digest(target_key);

    let mut scored: Vec<(KeyDigest, &str, &str, &str)> = registry
        .peers()
        .map(|p| {
            let dist = xor_distance(&key_digest(&p.identity_key), &target);
            (
                dist,
                p.peer_id.as_str(),
                p.identity_key.as_str(),
                p.address.as_str(),
            )
        })
        .collect();

    scored.sort_by(|a, b| distance_cmp(&a.0, &b.0).then_with(|| a.1.cmp(b.1)));

    debug!(
        "closest query: target digest {}, {} peers scored",
        hex::encode(&target[..8]),
        scored.len()
    );

    scored
        .into_iter()
        .take(k)
        .map(|(_, peer_id, identity_key, address)| ClosestPeer {
            peer_id: peer_id.to_string(),
            identity_key: identity_key.to_string(),
            address: address.to_string(),
        })
        .collect()
}
