//! Core types for the rendezvous protocol
//!
//! These types define the JSON protocol between Meshwave peers and the
//! rendezvous service, plus the classification model shared by the
//! registry, bootstrap selector, and relay.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque peer identifier, chosen by the peer at registration
pub type PeerId = String;

/// Literal used in place of missing metadata fields
///
/// Kept distinguishable from any real value so classification tests can
/// tell "field absent" apart from "field present but odd".
pub const UNKNOWN: &str = "Unknown";

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Which flavor of client software a peer declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppVariant {
    /// Shipped by the Meshwave project itself
    Official,

    /// Derivative build carrying the brand name
    Fork,

    /// Anything else talking the protocol
    Custom,
}

/// Application-trust tier derived from declared metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrustLevel {
    Trusted,
    SemiTrusted,
    Untrusted,
}

/// Trust classification computed once at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub app_variant: AppVariant,
    pub trust_level: TrustLevel,
    pub is_official: bool,
}

/// Client-declared metadata sent with a registration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientMetadata {
    #[serde(default)]
    pub bundle_id: Option<String>,

    #[serde(default)]
    pub app_name: Option<String>,

    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl ClientMetadata {
    pub fn bundle_id_or_unknown(&self) -> &str {
        self.bundle_id.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn app_name_or_unknown(&self) -> &str {
        self.app_name.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn app_version_or_unknown(&self) -> &str {
        self.app_version.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn user_agent_or_unknown(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(UNKNOWN)
    }
}

// =============================================================================
// SIGNALING
// =============================================================================

/// Closed set of signaling actions the relay routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalAction {
    Offer,
    Answer,
    #[serde(rename = "ice-candidate")]
    IceCandidate,
    /// Broadcast to every registered peer except the sender
    Gossip,
    /// Unicast variant of gossip
    GossipTo,
}

impl SignalAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalAction::Offer => "offer",
            SignalAction::Answer => "answer",
            SignalAction::IceCandidate => "ice-candidate",
            SignalAction::Gossip => "gossip",
            SignalAction::GossipTo => "gossip_to",
        }
    }

    pub fn is_broadcast(self) -> bool {
        matches!(self, SignalAction::Gossip)
    }
}

/// The envelope delivered to a signaling target
///
/// Delivery is fire-and-forget, at-most-once; the relay never persists or
/// acknowledges frames beyond the sender's success/failure result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalFrame {
    pub action: SignalAction,
    pub from: PeerId,
    pub payload: serde_json::Value,
    pub timestamp: u64,
}

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Registration request sent by a peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub peer_id: PeerId,

    /// Stable secondary identifier (wallet/account address) used as the
    /// proximity-metric input; may differ from `peer_id`
    pub identity_key: String,

    /// Declared reachability address; the connection origin is used when absent
    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub metadata: ClientMetadata,
}

/// Messages a peer sends over its WebSocket session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Register(RegisterRequest),

    Heartbeat {
        #[serde(default)]
        peer_id: Option<PeerId>,
    },

    Unregister,

    Signal {
        action: SignalAction,
        #[serde(default)]
        to: Option<PeerId>,
        payload: serde_json::Value,
    },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// One dialable candidate returned by the bootstrap selector
///
/// Never carries the transport handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapCandidate {
    pub peer_id: PeerId,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub classification: Classification,
    pub region: String,
    pub last_seen: u64,
}

/// Reduced peer view exposed by lookup and listing endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerSummary {
    pub peer_id: PeerId,
    pub address: String,
    pub last_seen: u64,
    pub classification: Classification,
    pub region: String,
}

/// One entry of a closest-peers query result, ordered by XOR distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosestPeer {
    pub peer_id: PeerId,
    pub identity_key: String,
    pub address: String,
}

/// Aggregate network statistics, derived from the live registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub active_peers: usize,
    pub official: usize,
    pub forks: usize,
    pub custom: usize,
    pub peak_peers: usize,
    pub total_registrations: u64,
    pub regions: HashMap<String, usize>,
    pub timestamp: u64,
}

/// Registration response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub region: String,
    pub classification: Classification,
    pub peers: Vec<BootstrapCandidate>,
    pub network_stats: NetworkStats,
    pub next_heartbeat_deadline: u64,
}

/// Messages the service sends to a peer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Registered(RegisterResponse),

    HeartbeatAck {
        next_heartbeat_deadline: u64,
    },

    Unregistered {
        success: bool,
    },

    /// Outcome of a relay request: directed sends report 1/0, broadcasts
    /// report per-peer delivery counts
    SignalSent {
        delivered: usize,
        failed: usize,
    },

    /// An inbound signaling frame relayed from another peer
    Signal(SignalFrame),

    Error {
        code: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_message_roundtrip() {
        let json = r#"{
            "type": "register",
            "peer_id": "p1",
            "identity_key": "0xabc",
            "port": 9000,
            "metadata": {"bundle_id": "io.meshwave.app"}
        }"#;

        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match &msg {
            ClientMessage::Register(req) => {
                assert_eq!(req.peer_id, "p1");
                assert_eq!(req.identity_key, "0xabc");
                assert_eq!(req.port, Some(9000));
                assert_eq!(req.address, None);
                assert_eq!(req.metadata.bundle_id.as_deref(), Some("io.meshwave.app"));
            }
            other => panic!("unexpected message: {:?}", other),
        }

        let encoded = serde_json::to_string(&msg).unwrap();
        assert!(encoded.contains("\"type\":\"register\""));
    }

    #[test]
    fn test_signal_action_wire_names() {
        let json = r#"{"type":"signal","action":"ice-candidate","to":"p2","payload":{"candidate":"udp 1.2.3.4"}}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();

        match msg {
            ClientMessage::Signal { action, to, .. } => {
                assert_eq!(action, SignalAction::IceCandidate);
                assert_eq!(to.as_deref(), Some("p2"));
            }
            other => panic!("unexpected message: {:?}", other),
        }

        assert_eq!(SignalAction::IceCandidate.as_str(), "ice-candidate");
        assert_eq!(SignalAction::GossipTo.as_str(), "gossip_to");
        assert!(SignalAction::Gossip.is_broadcast());
        assert!(!SignalAction::GossipTo.is_broadcast());
    }

    #[test]
    fn test_heartbeat_without_peer_id() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"heartbeat"}"#).unwrap();
        match msg {
            ClientMessage::Heartbeat { peer_id } => assert!(peer_id.is_none()),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_metadata_unknown_defaults() {
        let meta = ClientMetadata::default();
        assert_eq!(meta.bundle_id_or_unknown(), UNKNOWN);
        assert_eq!(meta.app_name_or_unknown(), UNKNOWN);

        let meta = ClientMetadata {
            app_name: Some("Unknown".to_string()),
            ..Default::default()
        };
        // A declared literal "Unknown" and an absent field read the same
        // through the accessor but differ on the option itself.
        assert_eq!(meta.app_name_or_unknown(), UNKNOWN);
        assert!(meta.app_name.is_some());
    }

    #[test]
    fn test_trust_level_wire_names() {
        let encoded = serde_json::to_string(&TrustLevel::SemiTrusted).unwrap();
        assert_eq!(encoded, "\"semi-trusted\"");
    }

    #[test]
    fn test_server_error_shape() {
        let msg = ServerMessage::Error {
            code: "validation_error".to_string(),
            message: "missing required field: peer_id".to_string(),
        };
        let encoded = serde_json::to_string(&msg).unwrap();
        assert!(encoded.contains("\"type\":\"error\""));
        assert!(encoded.contains("validation_error"));
    }
}
