//! Signaling relay
//!
//! Stateless routing of WebRTC signaling frames between registered peers.
//! The relay owns no state of its own: every decision is a registry lookup,
//! and delivery goes through the opaque [`PeerLink`] handle the transport
//! layer attached at registration. Delivery is at-most-once with no retry
//! and no acknowledgement beyond the sender's result.

use tracing::debug;

use crate::error::RendezvousError;
use crate::registry::PeerRegistry;
use crate::types::{SignalAction, SignalFrame};

/// Errors a transport handle can report at delivery time
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("connection closed")]
    Closed,

    #[error("outbound queue full")]
    Backpressure,
}

/// Handle back to a peer's live transport session
///
/// Implementations must not block: delivery is a queue hand-off, performed
/// while the caller holds the registry lock.
pub trait PeerLink: Send + Sync {
    fn deliver(&self, frame: SignalFrame) -> Result<(), DeliveryError>;

    fn is_open(&self) -> bool;
}

/// Delivery counts for one relay request
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RelayReceipt {
    pub delivered: usize,
    pub failed: usize,
}

/// Route one signaling request
///
/// Directed actions (`offer`, `answer`, `ice-candidate`, `gossip_to`)
/// require a target and fail with `PeerNotFound` / `PeerUnreachable` when
/// the target is missing or has no open connection. `gossip` broadcasts to
/// every registered peer except the sender; per-peer failures are counted,
/// never propagated.
pub fn relay(
    registry: &PeerRegistry,
    action: SignalAction,
    from: &str,
    to: Option<&str>,
    payload: serde_json::Value,
    now: u64,
) -> Result<RelayReceipt, RendezvousError> {
    if action.is_broadcast() {
        return Ok(broadcast(registry, from, payload, now));
    }

    let target = to.ok_or(RendezvousError::MissingField("to"))?;
    let record = registry
        .get(target)
        .ok_or_else(|| RendezvousError::PeerNotFound(target.to_string()))?;
    let link = record
        .link
        .as_ref()
        .filter(|l| l.is_open())
        .ok_or_else(|| RendezvousError::PeerUnreachable(target.to_string()))?;

    let frame = SignalFrame {
        action,
        from: from.to_string(),
        payload,
        timestamp: now,
    };

    link.deliver(frame)
        .map_err(|_| RendezvousError::PeerUnreachable(target.to_string()))?;

    debug!("relayed {} from {} to {}", action.as_str(), from, target);

    Ok(RelayReceipt {
        delivered: 1,
        failed: 0,
    })
}

/// Attempt delivery to every registered peer except the sender
fn broadcast(
    registry: &PeerRegistry,
    from: &str,
    payload: serde_json::Value,
    now: u64,
) -> RelayReceipt {
    let mut delivered = 0;
    let mut failed = 0;

    for peer in registry.peers() {
        if peer.peer_id == from {
            continue;
        }

        let frame = SignalFrame {
            action: SignalAction::Gossip,
            from: from.to_string(),
            payload: payload.clone(),
            timestamp: now,
        };

        match peer.link.as_ref().filter(|l| l.is_open()) {
            Some(link) => match link.deliver(frame) {
                Ok(()) => delivered += 1,
                Err(_) => failed += 1,
            },
            None => failed += 1,
        }
    }

    debug!(
        "gossip from {}: delivered to {}, failed for {}",
        from, delivered, failed
    );

    RelayReceipt { delivered, failed }
}
