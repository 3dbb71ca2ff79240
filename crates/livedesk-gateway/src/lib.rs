// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the livedesk relay.
//!
//! Exposes the widget protocol at `/widget/api` and the agent API under
//! `/v1/agent`. The gateway runs an axum server as a background task and
//! holds no per-visitor state; every request is handed to the
//! [`RelayService`].

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use livedesk_config::model::ServerConfig;
use livedesk_core::types::{AdapterType, HealthStatus};
use livedesk_core::{LivedeskError, PluginAdapter};
use livedesk_relay::RelayService;
use tokio::sync::{Mutex, oneshot};

pub use crate::error::{ApiError, ErrorResponse};
pub use crate::server::{GatewayState, HealthState, build_router};

struct Running {
    handle: tokio::task::JoinHandle<()>,
    stop: oneshot::Sender<()>,
}

/// The HTTP gateway as a managed adapter.
pub struct Gateway {
    config: ServerConfig,
    state: GatewayState,
    running: Mutex<Option<Running>>,
}

impl Gateway {
    pub fn new(
        config: ServerConfig,
        relay: Arc<RelayService>,
        prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    ) -> Self {
        Self {
            config,
            state: GatewayState {
                relay,
                health: HealthState {
                    start_time: std::time::Instant::now(),
                    prometheus_render,
                },
            },
            running: Mutex::new(None),
        }
    }

    /// Bind and start serving in the background. Returns the bound address.
    pub async fn start(&self) -> Result<SocketAddr, LivedeskError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(LivedeskError::Internal(
                "gateway already started".to_string(),
            ));
        }

        let listener = server::bind(&self.config.host, self.config.port).await?;
        let addr = listener.local_addr().map_err(|e| LivedeskError::Transport {
            message: format!("gateway listener has no local address: {e}"),
            source: Some(Box::new(e)),
        })?;

        let (stop, stopped) = oneshot::channel::<()>();
        let state = self.state.clone();
        let handle = tokio::spawn(async move {
            let shutdown = async {
                let _ = stopped.await;
            };
            if let Err(e) = server::serve(listener, state, shutdown).await {
                tracing::error!(error = %e, "gateway server error");
            }
        });
        *running = Some(Running { handle, stop });

        tracing::info!(%addr, "gateway listening");
        Ok(addr)
    }
}

#[async_trait]
impl PluginAdapter for Gateway {
    fn name(&self) -> &str {
        "gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, LivedeskError> {
        let running = self.running.lock().await;
        match running.as_ref() {
            Some(r) if !r.handle.is_finished() => Ok(HealthStatus::Healthy),
            Some(_) => Ok(HealthStatus::Unhealthy("server exited".to_string())),
            None => Ok(HealthStatus::Unhealthy("server not started".to_string())),
        }
    }

    /// Stop accepting connections and wait for in-flight requests.
    async fn shutdown(&self) -> Result<(), LivedeskError> {
        let Some(Running { handle, stop }) = self.running.lock().await.take() else {
            return Ok(());
        };
        let _ = stop.send(());
        handle
            .await
            .map_err(|e| LivedeskError::Internal(format!("gateway task failed: {e}")))
    }
}
