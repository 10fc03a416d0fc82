//! In-memory peer registry
//!
//! Holds one record per active peer id plus a region secondary index that
//! is kept consistent with membership at every insert and remove. All
//! mutations run behind a single `RwLock` owned by the caller, so each
//! operation here is plain single-threaded code.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::RendezvousError;
use crate::relay::PeerLink;
use crate::types::{BootstrapCandidate, Classification, PeerId, PeerSummary};

/// Everything the service knows about one registered peer
#[derive(Clone)]
pub struct PeerRecord {
    pub peer_id: PeerId,

    /// Proximity-metric input; may differ from `peer_id`
    pub identity_key: String,

    /// Declared or connection-derived reachability address
    pub address: String,

    pub declared_port: Option<u16>,

    /// Computed once at registration, immutable until re-registration
    pub classification: Classification,

    /// Assigned once at registration from the connection origin
    pub region: String,

    pub registered_at: u64,

    /// Non-decreasing; bumped by heartbeats and any inbound activity
    pub last_seen: u64,

    pub heartbeat_count: u64,

    /// Live transport handle; used only for delivery, never exposed
    pub link: Option<Arc<dyn PeerLink>>,
}

impl PeerRecord {
    /// Whether this peer's last activity is older than `timeout_secs`
    pub fn is_stale(&self, now: u64, timeout_secs: u64) -> bool {
        now.saturating_sub(self.last_seen) > timeout_secs
    }

    /// Reduced view for lookup and listing endpoints
    pub fn summary(&self) -> PeerSummary {
        PeerSummary {
            peer_id: self.peer_id.clone(),
            address: self.address.clone(),
            last_seen: self.last_seen,
            classification: self.classification,
            region: self.region.clone(),
        }
    }

    /// Dialable view returned by the bootstrap selector
    pub fn candidate(&self) -> BootstrapCandidate {
        BootstrapCandidate {
            peer_id: self.peer_id.clone(),
            address: self.address.clone(),
            port: self.declared_port,
            classification: self.classification,
            region: self.region.clone(),
            last_seen: self.last_seen,
        }
    }
}

impl fmt::Debug for PeerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerRecord")
            .field("peer_id", &self.peer_id)
            .field("identity_key", &self.identity_key)
            .field("address", &self.address)
            .field("region", &self.region)
            .field("last_seen", &self.last_seen)
            .field("heartbeat_count", &self.heartbeat_count)
            .field("linked", &self.link.is_some())
            .finish()
    }
}

/// The peer registry: records map + region index
#[derive(Default)]
pub struct PeerRegistry {
    peers: HashMap<PeerId, PeerRecord>,

    /// region -> ids of peers currently assigned to it
    by_region: HashMap<String, HashSet<PeerId>>,

    /// Monotonic count of accepted registrations, never decremented
    total_registrations: u64,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a peer record
    ///
    /// A re-registration with an existing id atomically replaces the prior
    /// record; nothing is merged. Fails when a required field is empty.
    pub fn register(&mut self, record: PeerRecord) -> Result<(), RendezvousError> {
        if record.peer_id.is_empty() {
            return Err(RendezvousError::MissingField("peer_id"));
        }
        if record.identity_key.is_empty() {
            return Err(RendezvousError::MissingField("identity_key"));
        }
        if record.address.is_empty() {
            return Err(RendezvousError::MissingField("address"));
        }

        if let Some(old) = self.peers.remove(&record.peer_id) {
            self.unindex_region(&old.region, &old.peer_id);
            debug!("re-registration replaces record for {}", record.peer_id);
        }

        self.by_region
            .entry(record.region.clone())
            .or_default()
            .insert(record.peer_id.clone());
        self.total_registrations += 1;
        self.peers.insert(record.peer_id.clone(), record);

        Ok(())
    }

    /// Renew a peer's liveness; returns false (and creates nothing) for
    /// unknown ids
    pub fn heartbeat(&mut self, peer_id: &str, now: u64) -> bool {
        match self.peers.get_mut(peer_id) {
            Some(peer) => {
                peer.last_seen = peer.last_seen.max(now);
                peer.heartbeat_count += 1;
                true
            }
            None => false,
        }
    }

    /// Bump `last_seen` on any inbound activity from a registered peer
    pub fn touch(&mut self, peer_id: &str, now: u64) {
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.last_seen = peer.last_seen.max(now);
        }
    }

    /// Remove a peer and its region-index entry; idempotent
    pub fn remove(&mut self, peer_id: &str) -> bool {
        match self.peers.remove(peer_id) {
            Some(record) => {
                self.unindex_region(&record.region, peer_id);
                true
            }
            None => false,
        }
    }

    /// Connection-close removal, guarded by link identity
    ///
    /// Removes the record only when it still holds `link` as its transport
    /// handle, so a stale session closing never deletes a record that a
    /// re-registration just refreshed.
    pub fn remove_if_link(&mut self, peer_id: &str, link: &Arc<dyn PeerLink>) -> bool {
        let same_session = self
            .peers
            .get(peer_id)
            .and_then(|p| p.link.as_ref())
            .map(|l| Arc::ptr_eq(l, link))
            .unwrap_or(false);

        if same_session {
            self.remove(peer_id)
        } else {
            false
        }
    }

    /// Attach a fresh transport handle on reconnect
    pub fn attach_link(&mut self, peer_id: &str, link: Arc<dyn PeerLink>) -> bool {
        match self.peers.get_mut(peer_id) {
            Some(peer) => {
                peer.link = Some(link);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, peer_id: &str) -> Option<&PeerRecord> {
        self.peers.get(peer_id)
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.peers.contains_key(peer_id)
    }

    /// Iterate all current records; order is unspecified
    pub fn peers(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.values()
    }

    /// Filtered snapshot of current records
    pub fn snapshot<F>(&self, predicate: F) -> Vec<&PeerRecord>
    where
        F: Fn(&PeerRecord) -> bool,
    {
        self.peers.values().filter(|p| predicate(p)).collect()
    }

    /// Peers currently assigned to a region, resolved through the index
    pub fn region_peers(&self, region: &str) -> Vec<&PeerRecord> {
        self.by_region
            .get(region)
            .map(|ids| ids.iter().filter_map(|id| self.peers.get(id)).collect())
            .unwrap_or_default()
    }

    /// region -> active peer count
    pub fn region_distribution(&self) -> HashMap<String, usize> {
        self.by_region
            .iter()
            .map(|(region, ids)| (region.clone(), ids.len()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn total_registrations(&self) -> u64 {
        self.total_registrations
    }

    /// Verify the region index against membership
    ///
    /// A divergence is a programming error: loud in debug builds, healed by
    /// a full reindex in release builds. Returns whether the index was
    /// already consistent.
    pub fn check_region_index(&mut self) -> bool {
        let indexed: usize = self.by_region.values().map(|ids| ids.len()).sum();
        let consistent = indexed == self.peers.len()
            && self.peers.iter().all(|(id, record)| {
                self.by_region
                    .get(&record.region)
                    .map(|ids| ids.contains(id))
                    .unwrap_or(false)
            });

        debug_assert!(consistent, "region index diverged from registry membership");

        if !consistent {
            warn!("region index diverged from registry membership, reindexing");
            self.reindex();
        }

        consistent
    }

    fn reindex(&mut self) {
        self.by_region.clear();
        for (id, record) in &self.peers {
            self.by_region
                .entry(record.region.clone())
                .or_default()
                .insert(id.clone());
        }
    }

    fn unindex_region(&mut self, region: &str, peer_id: &str) {
        if let Some(ids) = self.by_region.get_mut(region) {
            ids.remove(peer_id);
            if ids.is_empty() {
                self.by_region.remove(region);
            }
        }
    }
}
