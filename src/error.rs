//! Error taxonomy for rendezvous operations
//!
//! Every error is scoped to a single request and carries a stable wire code
//! so transport layers can report it without matching on variants.

use thiserror::Error;

/// Errors produced by registry, relay, and query operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RendezvousError {
    /// A required field was missing or empty on an inbound request
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The referenced peer has no record in the registry
    #[error("unknown peer: {0}")]
    PeerNotFound(String),

    /// The peer exists but its connection is not open for delivery
    #[error("peer {0} has no open connection")]
    PeerUnreachable(String),
}

impl RendezvousError {
    /// Stable machine-readable code reported to clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "validation_error",
            Self::PeerNotFound(_) => "peer_not_found",
            Self::PeerUnreachable(_) => "peer_unreachable",
        }
    }
}
