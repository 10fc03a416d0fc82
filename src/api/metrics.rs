//! Metrics Collection
//!
//! Collects and exposes counters for monitoring the rendezvous service.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Metrics collector for the rendezvous service
#[derive(Default)]
pub struct Metrics {
    /// Start time for uptime calculation
    start_time: Option<Instant>,

    /// Total accepted registrations
    pub registrations: AtomicU64,

    /// Registrations rejected for validation failures
    pub registrations_rejected: AtomicU64,

    /// Heartbeats accepted
    pub heartbeats: AtomicU64,

    /// Heartbeats for unknown peers
    pub heartbeats_rejected: AtomicU64,

    /// Signaling frames delivered
    pub signals_delivered: AtomicU64,

    /// Signaling deliveries that failed (unreachable, closed, absent)
    pub signals_failed: AtomicU64,

    /// WebSocket sessions accepted
    pub ws_connections: AtomicU64,

    /// Peers evicted by the liveness monitor
    pub peers_evicted: AtomicU64,

    /// Current active peers
    pub active_peers: AtomicU64,

    /// High-water mark of concurrent peers
    pub peak_peers: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    pub fn inc_registrations(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_registrations_rejected(&self) {
        self.registrations_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_heartbeats(&self) {
        self.heartbeats.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_heartbeats_rejected(&self) {
        self.heartbeats_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_signals_delivered(&self, count: u64) {
        self.signals_delivered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_signals_failed(&self, count: u64) {
        self.signals_failed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_ws_connections(&self) {
        self.ws_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_evicted(&self, count: u64) {
        self.peers_evicted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn set_active_peers(&self, count: u64) {
        self.active_peers.store(count, Ordering::Relaxed);
    }

    pub fn set_peak_peers(&self, count: u64) {
        self.peak_peers.store(count, Ordering::Relaxed);
    }

    /// Export metrics in Prometheus format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "# HELP meshwave_rendezvous_uptime_seconds Service uptime in seconds\n\
             # TYPE meshwave_rendezvous_uptime_seconds gauge\n\
             meshwave_rendezvous_uptime_seconds {}\n\n",
            self.uptime_secs()
        ));

        output.push_str(&format!(
            "# HELP meshwave_rendezvous_registrations_total Accepted registrations\n\
             # TYPE meshwave_rendezvous_registrations_total counter\n\
             meshwave_rendezvous_registrations_total {}\n\n",
            self.registrations.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP meshwave_rendezvous_registrations_rejected Rejected registrations\n\
             # TYPE meshwave_rendezvous_registrations_rejected counter\n\
             meshwave_rendezvous_registrations_rejected {}\n\n",
            self.registrations_rejected.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP meshwave_rendezvous_heartbeats_total Accepted heartbeats\n\
             # TYPE meshwave_rendezvous_heartbeats_total counter\n\
             meshwave_rendezvous_heartbeats_total {}\n\n",
            self.heartbeats.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP meshwave_rendezvous_heartbeats_rejected Heartbeats for unknown peers\n\
             # TYPE meshwave_rendezvous_heartbeats_rejected counter\n\
             meshwave_rendezvous_heartbeats_rejected {}\n\n",
            self.heartbeats_rejected.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP meshwave_rendezvous_signals_delivered Signaling frames delivered\n\
             # TYPE meshwave_rendezvous_signals_delivered counter\n\
             meshwave_rendezvous_signals_delivered {}\n\n",
            self.signals_delivered.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP meshwave_rendezvous_signals_failed Failed signaling deliveries\n\
             # TYPE meshwave_rendezvous_signals_failed counter\n\
             meshwave_rendezvous_signals_failed {}\n\n",
            self.signals_failed.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP meshwave_rendezvous_ws_connections WebSocket sessions accepted\n\
             # TYPE meshwave_rendezvous_ws_connections counter\n\
             meshwave_rendezvous_ws_connections {}\n\n",
            self.ws_connections.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP meshwave_rendezvous_peers_evicted Peers evicted by the liveness monitor\n\
             # TYPE meshwave_rendezvous_peers_evicted counter\n\
             meshwave_rendezvous_peers_evicted {}\n\n",
            self.peers_evicted.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP meshwave_rendezvous_active_peers Active peers count\n\
             # TYPE meshwave_rendezvous_active_peers gauge\n\
             meshwave_rendezvous_active_peers {}\n\n",
            self.active_peers.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP meshwave_rendezvous_peak_peers Peak concurrent peers\n\
             # TYPE meshwave_rendezvous_peak_peers gauge\n\
             meshwave_rendezvous_peak_peers {}\n\n",
            self.peak_peers.load(Ordering::Relaxed)
        ));

        output
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "uptime_secs": self.uptime_secs(),
            "registrations": {
                "accepted": self.registrations.load(Ordering::Relaxed),
                "rejected": self.registrations_rejected.load(Ordering::Relaxed),
            },
            "heartbeats": {
                "accepted": self.heartbeats.load(Ordering::Relaxed),
                "rejected": self.heartbeats_rejected.load(Ordering::Relaxed),
            },
            "signals": {
                "delivered": self.signals_delivered.load(Ordering::Relaxed),
                "failed": self.signals_failed.load(Ordering::Relaxed),
            },
            "ws_connections": self.ws_connections.load(Ordering::Relaxed),
            "peers": {
                "active": self.active_peers.load(Ordering::Relaxed),
                "peak": self.peak_peers.load(Ordering::Relaxed),
                "evicted": self.peers_evicted.load(Ordering::Relaxed),
            },
        })
    }
}
