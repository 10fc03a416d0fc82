//! HTTP/WebSocket API Module
//!
//! Serves the peer-facing WebSocket protocol plus monitoring endpoints
//! (health, status, peer views, metrics) for the rendezvous service.

mod metrics;
mod routes;
mod ws;

pub use metrics::Metrics;
pub use routes::run_api_server;
