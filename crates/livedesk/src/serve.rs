// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `livedesk serve` command implementation.
//!
//! Opens SQLite storage, wires the relay service to the optional Prometheus
//! recorder, and runs the HTTP gateway until SIGINT or SIGTERM.

use std::sync::Arc;

use livedesk_config::model::LivedeskConfig;
use livedesk_core::{LivedeskError, ObservabilityAdapter, PluginAdapter, StorageAdapter};
use livedesk_gateway::Gateway;
use livedesk_relay::RelayService;
use livedesk_storage::SqliteStorage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type RenderFn = Arc<dyn Fn() -> String + Send + Sync>;

/// Runs the `livedesk serve` command.
pub async fn run_serve(config: LivedeskConfig) -> Result<(), LivedeskError> {
    info!("starting livedesk serve");

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;
    info!(path = config.storage.database_path.as_str(), "storage ready");

    let mut relay = RelayService::new(
        storage.clone(),
        config.relay.clone(),
        config.server.public_url.clone(),
    );
    let (observer, prometheus_render) = install_metrics(&config);
    if let Some(observer) = observer {
        relay = relay.with_observer(observer);
    }
    let relay = Arc::new(relay);

    let gateway = Gateway::new(config.server.clone(), relay, prometheus_render);
    let addr = gateway.start().await?;
    info!(
        %addr,
        public_url = config.server.public_url.as_str(),
        "livedesk relay ready"
    );

    let cancel = install_signal_handler()?;
    cancel.cancelled().await;

    if let Err(e) = gateway.shutdown().await {
        error!(error = %e, "gateway shutdown failed");
    }
    storage.close().await?;

    info!("livedesk serve shutdown complete");
    Ok(())
}

/// Installs the Prometheus recorder when enabled.
///
/// Returns the relay observer and the `/metrics` render function.
#[cfg(feature = "prometheus")]
fn install_metrics(
    config: &LivedeskConfig,
) -> (Option<Arc<dyn ObservabilityAdapter>>, Option<RenderFn>) {
    if !config.metrics.enabled {
        debug!("prometheus metrics disabled by configuration");
        return (None, None);
    }
    match livedesk_prometheus::PrometheusAdapter::new() {
        Ok(adapter) => {
            info!("prometheus metrics enabled");
            let handle = adapter.handle().clone();
            let render = Arc::new(move || handle.render()) as RenderFn;
            (Some(Arc::new(adapter) as Arc<dyn ObservabilityAdapter>), Some(render))
        }
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            (None, None)
        }
    }
}

#[cfg(not(feature = "prometheus"))]
fn install_metrics(
    config: &LivedeskConfig,
) -> (Option<Arc<dyn ObservabilityAdapter>>, Option<RenderFn>) {
    if config.metrics.enabled {
        warn!("metrics enabled but the prometheus feature is not compiled in");
    }
    (None, None)
}

/// Returns a token cancelled on SIGINT (Ctrl+C) or SIGTERM.
fn install_signal_handler() -> Result<CancellationToken, LivedeskError> {
    let token = CancellationToken::new();
    let trigger = token.clone();

    #[cfg(unix)]
    let mut sigterm = {
        use tokio::signal::unix::{SignalKind, signal};
        signal(SignalKind::terminate())
            .map_err(|e| LivedeskError::Internal(format!("failed to install SIGTERM handler: {e}")))?
    };

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            tokio::select! {
                _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        trigger.cancel();
        debug!("shutdown signal handler completed");
    });

    Ok(token)
}
