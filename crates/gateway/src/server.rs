use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::State,
        response::{IntoResponse, Json},
        routing::{get, post},
    },
    bpi_config::ServerConfig,
    tokio::net::TcpListener,
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::{info, warn},
};

use crate::{routes, state::GatewayState};

/// Router state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayState>,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/v2/sessions/detect-intent",
            post(routes::detect_intent_handler),
        )
        .route(
            "/v2/contexts",
            post(routes::create_context_handler)
                .get(routes::get_context_handler)
                .patch(routes::update_context_handler)
                .delete(routes::delete_context_handler),
        )
        .route(
            "/metrics",
            get(crate::metrics_routes::prometheus_metrics_handler),
        );

    #[cfg(feature = "metrics")]
    let router = router.layer(axum::middleware::from_fn(
        crate::metrics_middleware::http_metrics_middleware,
    ));

    let app_state = AppState { gateway: state };

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Serve `app` on an already bound listener until ctrl-c.
pub async fn serve(listener: TcpListener, app: Router) -> anyhow::Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

/// Start the gateway HTTP server on the configured address.
pub async fn start_gateway(server: &ServerConfig, state: Arc<GatewayState>) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", server.bind, server.port).parse()?;
    let maintenance = state.service.spawn_maintenance();
    let app = build_gateway_app(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "bpi gateway listening");
    let result = serve(listener, app).await;

    if let Some(task) = maintenance {
        task.abort();
    }
    info!("bpi gateway stopped");
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state
        .gateway
        .service
        .session_loops()
        .map_or(0, |loops| loops.len());
    Json(serde_json::json!({
        "status": "ok",
        "version": state.gateway.version,
        "uptime_secs": state.gateway.started_at.elapsed().as_secs(),
        "qa_sessions": sessions,
    }))
}
