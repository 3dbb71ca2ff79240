// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use livedesk_core::LivedeskError;
use livedesk_relay::RelayService;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::agent_auth;
use crate::handlers;

/// Health state for unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub relay: Arc<RelayService>,
    pub health: HealthState,
}

/// Build the application router.
///
/// - GET|POST /widget/api, /widget/api.php (widget key in parameters)
/// - GET /health, GET /metrics (unauthenticated)
/// - /v1/agent/* (agent key as bearer token)
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .route("/metrics", get(handlers::get_public_metrics))
        .route(
            "/widget/api",
            get(handlers::widget_api).post(handlers::widget_api),
        )
        .route(
            "/widget/api.php",
            get(handlers::widget_api).post(handlers::widget_api),
        )
        .with_state(state.clone());

    let agent_routes = Router::new()
        .route("/v1/agent/heartbeat", post(handlers::agent_heartbeat))
        .route("/v1/agent/visitors", get(handlers::agent_visitors))
        .route(
            "/v1/agent/visitors/{visitor_id}/messages",
            get(handlers::agent_messages).post(handlers::agent_send),
        )
        .route(
            "/v1/agent/visitors/{visitor_id}/read",
            post(handlers::agent_mark_read),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            agent_auth,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(agent_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the listener for `host:port`.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, LivedeskError> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|e| LivedeskError::Transport {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Serve the router on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), LivedeskError> {
    let app = build_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| LivedeskError::Transport {
        message: format!("gateway server error: {e}"),
        source: Some(Box::new(e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_reports_unusable_addresses() {
        let err = bind("256.0.0.1", 0).await.unwrap_err();
        assert!(matches!(err, LivedeskError::Transport { .. }));
        assert!(err.to_string().contains("256.0.0.1"));
    }
}
