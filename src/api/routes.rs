//! API Routes
//!
//! HTTP endpoints for health checks, peer views, statistics, and metrics,
//! plus the WebSocket upgrade that carries the peer protocol itself.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::api::{ws, Metrics};
use crate::config::RendezvousConfig;
use crate::proximity;
use crate::registry::PeerRegistry;
use crate::stats::{self, NetworkStatsAggregator};

/// Shared API state
pub struct ApiState {
    pub config: Arc<RendezvousConfig>,
    pub registry: Arc<RwLock<PeerRegistry>>,
    pub stats: Arc<RwLock<NetworkStatsAggregator>>,
    pub metrics: Arc<Metrics>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Run the HTTP/WebSocket server
pub async fn run_api_server(
    config: Arc<RendezvousConfig>,
    registry: Arc<RwLock<PeerRegistry>>,
    stats: Arc<RwLock<NetworkStatsAggregator>>,
    metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
    let state = Arc::new(ApiState {
        config: config.clone(),
        registry,
        stats,
        metrics,
        started_at: chrono::Utc::now(),
    });

    let mut app = Router::new()
        // Peer protocol
        .route("/ws", get(ws::ws_handler))

        // Health & Status
        .route("/health", get(health_check))
        .route("/status", get(get_status))

        // Peer views
        .route("/peers", get(get_peers))
        .route("/peers/:peer_id", get(get_peer))
        .route("/closest", get(get_closest))

        // Statistics
        .route("/stats", get(get_stats))

        // Metrics
        .route("/metrics", get(get_metrics_prometheus))
        .route("/metrics/json", get(get_metrics_json))

        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.api_port).parse()?;
    info!("📡 Rendezvous API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// GET /health - Simple health check
async fn health_check() -> impl IntoResponse {
    "OK"
}

/// GET /status - Detailed status
async fn get_status(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let reg = state.registry.read().await;
    let agg = state.stats.read().await;
    let current = agg.current();

    let status = serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": state.started_at.to_rfc3339(),
        "uptime_secs": state.metrics.uptime_secs(),
        "network": {
            "active_peers": reg.len(),
            "peak_peers": current.peak_peers,
            "total_registrations": reg.total_registrations(),
            "official": current.official,
            "forks": current.forks,
            "custom": current.custom,
        }
    });

    Json(status)
}

/// GET /peers - List of active peers (limited info)
async fn get_peers(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let reg = state.registry.read().await;

    let peers: Vec<_> = reg
        .peers()
        .take(state.config.max_listed_peers)
        .map(|p| p.summary())
        .collect();

    Json(serde_json::json!({
        "count": peers.len(),
        "peers": peers,
    }))
}

/// GET /peers/{peer_id} - Single peer lookup
async fn get_peer(
    State(state): State<Arc<ApiState>>,
    Path(peer_id): Path<String>,
) -> impl IntoResponse {
    let reg = state.registry.read().await;

    match reg.get(&peer_id) {
        Some(peer) => Json(serde_json::json!({
            "found": true,
            "peer": peer.summary(),
        })),
        None => Json(serde_json::json!({
            "found": false,
        })),
    }
}

#[derive(Debug, Deserialize)]
struct ClosestQuery {
    key: String,
    k: Option<usize>,
}

/// GET /closest?key=&k= - Peers nearest an identity key, by XOR distance
async fn get_closest(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ClosestQuery>,
) -> impl IntoResponse {
    if query.key.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "validation_error",
                "message": "missing required field: key",
            })),
        );
    }

    let k = query
        .k
        .unwrap_or(state.config.default_closest_peers)
        .min(state.config.max_closest_peers);

    let reg = state.registry.read().await;
    let closest = proximity::find_closest(&reg, &query.key, k);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "count": closest.len(),
            "peers": closest,
        })),
    )
}

/// GET /stats - Derived network statistics
async fn get_stats(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let now = current_timestamp();
    let reg = state.registry.read().await;

    let network_stats = {
        let mut agg = state.stats.write().await;
        agg.update_from_registry(&reg, now);
        agg.current()
    };

    let recent = stats::recent_activity(&reg, state.config.recent_activity_window_secs, now);

    Json(serde_json::json!({
        "network": network_stats,
        "recent_activity": recent,
    }))
}

/// GET /metrics - Prometheus format metrics
async fn get_metrics_prometheus(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    {
        let reg = state.registry.read().await;
        let agg = state.stats.read().await;

        state.metrics.set_active_peers(reg.len() as u64);
        state.metrics.set_peak_peers(agg.peak_peers() as u64);
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.to_prometheus(),
    )
}

/// GET /metrics/json - JSON format metrics
async fn get_metrics_json(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    {
        let reg = state.registry.read().await;
        let agg = state.stats.read().await;

        state.metrics.set_active_peers(reg.len() as u64);
        state.metrics.set_peak_peers(agg.peak_peers() as u64);
    }

    Json(state.metrics.to_json())
}

/// Get current Unix timestamp
fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
