// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observability adapter trait for metrics and telemetry.

use async_trait::async_trait;

use crate::error::LivedeskError;
use crate::traits::adapter::PluginAdapter;
use crate::types::MetricEvent;

/// Adapter for recording relay metrics.
///
/// Recording must never fail a relay request; implementations swallow
/// their own errors and report them through tracing.
#[async_trait]
pub trait ObservabilityAdapter: PluginAdapter {
    /// Records a relay event.
    async fn record(&self, event: MetricEvent) -> Result<(), LivedeskError>;
}
