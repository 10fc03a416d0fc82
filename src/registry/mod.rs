//! Peer Registry Module
//!
//! Ground-truth store for every registered peer: liveness timestamps,
//! classification, region index, and the live transport link used by the
//! signaling relay. Fully in-memory; peers re-register after a restart.

mod store;
pub mod liveness;

pub use store::{PeerRecord, PeerRegistry};
