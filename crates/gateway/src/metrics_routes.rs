//! Prometheus scrape endpoint.

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::server::AppState;

/// Metrics in Prometheus text exposition format.
///
/// Unauthenticated so scrapers can reach it.
pub async fn prometheus_metrics_handler(State(state): State<AppState>) -> Response {
    #[cfg(feature = "prometheus")]
    {
        if let Some(handle) = state.gateway.metrics_handle.as_ref() {
            return (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
                .into_response();
        }
    }
    #[cfg(not(feature = "prometheus"))]
    let _ = state;

    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::CONTENT_TYPE, "text/plain")],
        "Metrics not enabled",
    )
        .into_response()
}
