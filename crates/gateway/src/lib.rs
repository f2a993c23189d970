//! HTTP surface of the bpi layer.
//!
//! Exposes DetectIntent and the context relays as JSON routes over axum,
//! plus `/health` and a Prometheus `/metrics` endpoint.

pub mod error;
#[cfg(feature = "metrics")]
pub mod metrics_middleware;
pub mod metrics_routes;
pub mod routes;
pub mod server;
pub mod state;

pub use {
    error::ApiError,
    server::{AppState, build_gateway_app, serve, start_gateway},
    state::GatewayState,
};
