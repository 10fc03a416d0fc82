//! Rendezvous service configuration
//!
//! Defaults balance responsiveness against churn: the staleness timeout is
//! a multiple of the heartbeat interval so a peer survives a couple of
//! missed heartbeats before eviction.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the rendezvous service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendezvousConfig {
    // === Timing ===

    /// Interval peers are told to heartbeat at (seconds)
    pub heartbeat_interval_secs: u64,

    /// Inactivity after which a peer is evicted (seconds)
    /// Must exceed heartbeat_interval_secs; 3x tolerates two missed beats
    pub peer_timeout_secs: u64,

    /// Interval of the liveness monitor tick (seconds)
    pub eviction_interval_secs: u64,

    /// Window used by the recent-activity view (seconds)
    pub recent_activity_window_secs: u64,

    // === Limits ===

    /// Cap on bootstrap candidates returned at registration
    pub max_bootstrap_peers: usize,

    /// Default k for closest-peer queries when the caller omits it
    pub default_closest_peers: usize,

    /// Hard cap on requested k for closest-peer queries
    pub max_closest_peers: usize,

    /// Cap on entries returned by the peer-listing endpoint
    pub max_listed_peers: usize,

    /// Reject signaling messages larger than this (bytes)
    pub max_signal_payload_bytes: usize,

    // === Network ===

    /// Bind address for the HTTP/WebSocket server
    pub bind_address: String,

    /// Port for the HTTP/WebSocket server
    pub api_port: u16,

    /// Allow cross-origin browser clients
    pub enable_cors: bool,
}

impl Default for RendezvousConfig {
    fn default() -> Self {
        Self {
            // Timing
            heartbeat_interval_secs: 30,
            peer_timeout_secs: 90,
            eviction_interval_secs: 15,
            recent_activity_window_secs: 300,

            // Limits
            max_bootstrap_peers: 10,
            default_closest_peers: 8,
            max_closest_peers: 32,
            max_listed_peers: 50,
            max_signal_payload_bytes: 64 * 1024,

            // Network
            bind_address: "0.0.0.0".to_string(),
            api_port: 8080,
            enable_cors: true,
        }
    }
}

impl RendezvousConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    // Builder-style methods for CLI overrides

    pub fn with_api_port(mut self, port: u16) -> Self {
        self.api_port = port;
        self
    }

    pub fn with_bind_address(mut self, addr: Option<String>) -> Self {
        if let Some(addr) = addr {
            self.bind_address = addr;
        }
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.peer_timeout_secs <= self.heartbeat_interval_secs {
            anyhow::bail!(
                "peer_timeout_secs ({}) must be greater than heartbeat_interval_secs ({})",
                self.peer_timeout_secs,
                self.heartbeat_interval_secs
            );
        }

        if self.eviction_interval_secs == 0 {
            anyhow::bail!("eviction_interval_secs must be nonzero");
        }

        if self.max_bootstrap_peers == 0 {
            anyhow::bail!("max_bootstrap_peers must be nonzero");
        }

        if self.default_closest_peers > self.max_closest_peers {
            anyhow::bail!(
                "default_closest_peers ({}) must not exceed max_closest_peers ({})",
                self.default_closest_peers,
                self.max_closest_peers
            );
        }

        Ok(())
    }
}
