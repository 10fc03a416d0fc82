//! Meshwave Rendezvous Service
//!
//! Peer discovery and signaling relay for the Meshwave overlay. Peers
//! register over WebSocket, receive a region- and trust-ranked bootstrap
//! set, keep themselves alive with heartbeats, and exchange WebRTC
//! signaling payloads through the relay until they can talk directly.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  MESHWAVE RENDEZVOUS                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  WebSocket sessions (/ws)  ←── register / heartbeat / signal│
//! │  Peer Registry (in-memory) ←── records + region index       │
//! │  Bootstrap Selector        ←── tiered candidate ranking     │
//! │  Proximity Index           ←── XOR-closest identity keys    │
//! │  Signaling Relay           ←── offer/answer/ICE forwarding  │
//! │  Liveness Monitor          ←── evicts silent peers          │
//! │  HTTP API                  ←── peers, stats, metrics        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

mod api;
mod bootstrap;
mod classify;
mod config;
mod error;
mod proximity;
mod registry;
mod relay;
mod stats;
mod types;

use api::Metrics;
use config::RendezvousConfig;
use registry::PeerRegistry;
use stats::NetworkStatsAggregator;

/// Meshwave Rendezvous - peer discovery and signaling relay
#[derive(Parser, Debug)]
#[command(name = "meshwave-rendezvous")]
#[command(author = "Meshwave Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Rendezvous service for Meshwave peer discovery", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "rendezvous.toml")]
    config: PathBuf,

    /// HTTP/WebSocket listen port
    #[arg(long, default_value = "8080")]
    api_port: u16,

    /// Bind address for the server
    #[arg(long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .init();

    info!("🌐 Meshwave Rendezvous v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if args.config.exists() {
        RendezvousConfig::load(&args.config)?
    } else {
        warn!("Config file not found, using defaults");
        RendezvousConfig::default()
    };

    // Override config with CLI args
    let config = config.with_api_port(args.api_port).with_bind_address(args.bind);

    config.validate()?;

    info!("⚙️  Configuration:");
    info!("   Listen: {}:{}", config.bind_address, config.api_port);
    info!("   Heartbeat interval: {}s", config.heartbeat_interval_secs);
    info!("   Peer timeout: {}s", config.peer_timeout_secs);
    info!("   Eviction tick: {}s", config.eviction_interval_secs);

    let shared_config = Arc::new(config);

    // The registry is rebuilt from scratch on every start; peers re-register
    let registry = Arc::new(RwLock::new(PeerRegistry::new()));

    let started = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let network_stats = Arc::new(RwLock::new(NetworkStatsAggregator::new(started)));

    let metrics = Arc::new(Metrics::new());

    // Start all services concurrently
    let api_handle = tokio::spawn(api::run_api_server(
        shared_config.clone(),
        registry.clone(),
        network_stats.clone(),
        metrics.clone(),
    ));

    let liveness_handle = tokio::spawn(registry::liveness::run_liveness_monitor(
        shared_config.clone(),
        registry.clone(),
        network_stats.clone(),
        metrics.clone(),
    ));

    info!("✅ All services started");
    info!("   Press Ctrl+C to shutdown gracefully");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Shutdown signal received");
        }
        result = api_handle => {
            error!("API server exited: {:?}", result);
        }
        result = liveness_handle => {
            error!("Liveness monitor exited: {:?}", result);
        }
    }

    info!("👋 Meshwave Rendezvous shutting down");
    Ok(())
}
