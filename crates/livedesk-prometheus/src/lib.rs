// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics adapter for the livedesk relay.
//!
//! Uses the metrics-rs facade with the Prometheus exporter.
//! Metrics are rendered as Prometheus text format via the `render()` method,
//! which is exposed through the gateway's /metrics endpoint.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use livedesk_core::LivedeskError;
use livedesk_core::traits::adapter::PluginAdapter;
use livedesk_core::traits::observability::ObservabilityAdapter;
use livedesk_core::types::{AdapterType, HealthStatus, MetricEvent};

pub use recording::{record_auto_reply, record_message, record_request, record_visitor_created};

/// Prometheus metrics adapter.
///
/// Installs the Prometheus recorder and exposes a handle for rendering
/// metrics in Prometheus text format.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Create a new PrometheusAdapter.
    ///
    /// Installs the Prometheus recorder globally. Only one recorder can be
    /// installed per process. Returns an error if a recorder is already installed.
    pub fn new() -> Result<Self, LivedeskError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            LivedeskError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Wrap an existing handle without installing a global recorder.
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Get a reference to the Prometheus handle for rendering.
    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Forward one relay event to the metrics facade.
pub fn apply_event(event: &MetricEvent) {
    match *event {
        MetricEvent::Request {
            action,
            outcome,
            latency_secs,
        } => record_request(action, outcome, latency_secs),
        MetricEvent::MessageStored { role } => record_message(role),
        MetricEvent::AutoReply => record_auto_reply(),
        MetricEvent::VisitorCreated => record_visitor_created(),
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, LivedeskError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LivedeskError> {
        Ok(())
    }
}

#[async_trait]
impl ObservabilityAdapter for PrometheusAdapter {
    async fn record(&self, event: MetricEvent) -> Result<(), LivedeskError> {
        apply_event(&event);
        Ok(())
    }
}
