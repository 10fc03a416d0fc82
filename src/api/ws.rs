//! WebSocket peer sessions
//!
//! Each connected peer holds one WebSocket session. The session adapts the
//! transport to the core: registrations and heartbeats flow into the
//! registry, signaling requests into the relay, and the session's outbound
//! queue is the [`PeerLink`] handle other peers deliver through. When the
//! socket closes, the peer is removed through the same path as an explicit
//! unregister, guarded by link identity so a re-registered peer survives
//! its old session closing late.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::routes::ApiState;
use crate::bootstrap::select_bootstrap;
use crate::classify::{classify_region, classify_trust};
use crate::error::RendezvousError;
use crate::registry::PeerRecord;
use crate::relay::{self, DeliveryError, PeerLink};
use crate::types::{
    ClientMessage, PeerId, RegisterRequest, RegisterResponse, ServerMessage, SignalAction,
    SignalFrame,
};

/// Transport handle for one WebSocket session
///
/// Delivery is a hand-off onto the session's outbound queue; the writer
/// task drains it onto the socket. Closing flips `open` so in-flight
/// relays fail fast instead of queueing into the void.
pub(crate) struct WsLink {
    tx: mpsc::UnboundedSender<ServerMessage>,
    open: AtomicBool,
}

impl WsLink {
    fn new(tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            tx,
            open: AtomicBool::new(true),
        }
    }

    /// Queue a protocol message for this session
    fn send(&self, msg: ServerMessage) {
        let _ = self.tx.send(msg);
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl PeerLink for WsLink {
    fn deliver(&self, frame: SignalFrame) -> Result<(), DeliveryError> {
        if !self.is_open() {
            return Err(DeliveryError::Closed);
        }
        self.tx
            .send(ServerMessage::Signal(frame))
            .map_err(|_| DeliveryError::Closed)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.tx.is_closed()
    }
}

/// GET /ws - upgrade to a peer session
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(origin): ConnectInfo<SocketAddr>,
    State(state): State<Arc<ApiState>>,
) -> impl IntoResponse {
    state.metrics.inc_ws_connections();
    debug!("websocket upgrade from {}", origin);
    ws.on_upgrade(move |socket| handle_session(socket, origin, state))
}

async fn handle_session(socket: WebSocket, origin: SocketAddr, state: Arc<ApiState>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let link = Arc::new(WsLink::new(tx));
    let link_dyn: Arc<dyn PeerLink> = link.clone();

    // Writer task: drain the outbound queue onto the socket
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("failed to encode outbound message: {}", e),
            }
        }
    });

    let mut session = Session {
        state,
        origin,
        link: link.clone(),
        link_dyn,
        peer_id: None,
    };

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => session.handle_text(&text).await,
            Message::Close(_) => break,
            // Pings are answered by axum; binary frames are not part of
            // the protocol
            _ => {}
        }
    }

    session.teardown().await;
    writer.abort();
}

/// Per-connection protocol state
struct Session {
    state: Arc<ApiState>,
    origin: SocketAddr,
    link: Arc<WsLink>,
    link_dyn: Arc<dyn PeerLink>,
    peer_id: Option<PeerId>,
}

impl Session {
    async fn handle_text(&mut self, text: &str) {
        if text.len() > self.state.config.max_signal_payload_bytes {
            self.link.send(ServerMessage::Error {
                code: "validation_error".to_string(),
                message: format!(
                    "message exceeds {} bytes",
                    self.state.config.max_signal_payload_bytes
                ),
            });
            return;
        }

        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Register(request)) => self.handle_register(request).await,
            Ok(ClientMessage::Heartbeat { peer_id }) => self.handle_heartbeat(peer_id).await,
            Ok(ClientMessage::Unregister) => self.handle_unregister().await,
            Ok(ClientMessage::Signal {
                action,
                to,
                payload,
            }) => self.handle_signal(action, to, payload).await,
            Err(e) => {
                debug!("invalid message from {}: {}", self.origin, e);
                self.link.send(ServerMessage::Error {
                    code: "validation_error".to_string(),
                    message: format!("invalid message: {}", e),
                });
            }
        }
    }

    async fn handle_register(&mut self, request: RegisterRequest) {
        let now = current_timestamp();
        let origin_ip = self.origin.ip().to_string();

        // Region comes from the connection origin, trust from declared
        // metadata; both are fixed for this registration's lifetime
        let region = classify_region(&origin_ip).to_string();
        let classification = classify_trust(&request.metadata);

        let address = request
            .address
            .clone()
            .filter(|a| !a.is_empty())
            .unwrap_or(origin_ip);

        let record = PeerRecord {
            peer_id: request.peer_id.clone(),
            identity_key: request.identity_key.clone(),
            address,
            declared_port: request.port,
            classification,
            region: region.clone(),
            registered_at: now,
            last_seen: now,
            heartbeat_count: 0,
            link: Some(self.link_dyn.clone()),
        };

        let outcome = {
            let mut reg = self.state.registry.write().await;
            reg.register(record)
        };

        match outcome {
            Ok(()) => {
                self.peer_id = Some(request.peer_id.clone());
                self.state.metrics.inc_registrations();

                info!(
                    "🤝 Registered peer {} ({:?}, {})",
                    request.peer_id, classification.app_variant, region
                );

                let (peers, network_stats) = {
                    let reg = self.state.registry.read().await;
                    let peers = select_bootstrap(
                        &reg,
                        &request.peer_id,
                        &region,
                        self.state.config.max_bootstrap_peers,
                    );
                    let mut agg = self.state.stats.write().await;
                    agg.update_from_registry(&reg, now);
                    (peers, agg.current())
                };

                self.link.send(ServerMessage::Registered(RegisterResponse {
                    success: true,
                    region,
                    classification,
                    peers,
                    network_stats,
                    next_heartbeat_deadline: now + self.state.config.heartbeat_interval_secs,
                }));
            }
            Err(e) => {
                self.state.metrics.inc_registrations_rejected();
                warn!("rejected registration from {}: {}", self.origin, e);
                self.send_error(&e);
            }
        }
    }

    async fn handle_heartbeat(&mut self, explicit_id: Option<PeerId>) {
        let now = current_timestamp();

        let Some(id) = explicit_id.or_else(|| self.peer_id.clone()) else {
            self.state.metrics.inc_heartbeats_rejected();
            self.send_error(&RendezvousError::PeerNotFound("unregistered".to_string()));
            return;
        };

        let renewed = {
            let mut reg = self.state.registry.write().await;
            reg.heartbeat(&id, now)
        };

        if renewed {
            self.state.metrics.inc_heartbeats();
            self.link.send(ServerMessage::HeartbeatAck {
                next_heartbeat_deadline: now + self.state.config.heartbeat_interval_secs,
            });
        } else {
            self.state.metrics.inc_heartbeats_rejected();
            self.send_error(&RendezvousError::PeerNotFound(id));
        }
    }

    async fn handle_unregister(&mut self) {
        let Some(id) = self.peer_id.take() else {
            self.link.send(ServerMessage::Unregistered { success: false });
            return;
        };

        let removed = {
            let mut reg = self.state.registry.write().await;
            reg.remove(&id)
        };

        if removed {
            info!("👋 Peer {} unregistered", id);
        }
        self.link.send(ServerMessage::Unregistered { success: removed });
    }

    async fn handle_signal(
        &mut self,
        action: SignalAction,
        to: Option<PeerId>,
        payload: serde_json::Value,
    ) {
        let now = current_timestamp();

        let Some(from) = self.peer_id.clone() else {
            self.send_error(&RendezvousError::MissingField("peer_id"));
            return;
        };

        let outcome = {
            let mut reg = self.state.registry.write().await;
            // Any inbound signaling counts as activity
            reg.touch(&from, now);
            relay::relay(&reg, action, &from, to.as_deref(), payload, now)
        };

        match outcome {
            Ok(receipt) => {
                self.state.metrics.add_signals_delivered(receipt.delivered as u64);
                self.state.metrics.add_signals_failed(receipt.failed as u64);
                self.link.send(ServerMessage::SignalSent {
                    delivered: receipt.delivered,
                    failed: receipt.failed,
                });
            }
            Err(e) => {
                self.state.metrics.add_signals_failed(1);
                self.send_error(&e);
            }
        }
    }

    /// Connection-close path: same removal as unregister, but only when
    /// the registry still points at this session's link
    async fn teardown(&mut self) {
        self.link.close();

        if let Some(id) = self.peer_id.take() {
            let removed = {
                let mut reg = self.state.registry.write().await;
                reg.remove_if_link(&id, &self.link_dyn)
            };
            if removed {
                info!("👋 Connection closed, removed peer {}", id);
            }
        }
    }

    fn send_error(&self, err: &RendezvousError) {
        self.link.send(ServerMessage::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        });
    }
}

/// Get current Unix timestamp
fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
