// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observability adapter that keeps every event in memory.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use livedesk_core::types::{AdapterType, HealthStatus, MetricEvent};
use livedesk_core::{LivedeskError, ObservabilityAdapter, PluginAdapter};

/// Captures [`MetricEvent`]s for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<MetricEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events, oldest first.
    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of events matching `pred`.
    pub fn count(&self, pred: impl Fn(&MetricEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

#[async_trait]
impl PluginAdapter for RecordingObserver {
    fn name(&self) -> &str {
        "recording"
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
impl ObservabilityAdapter for RecordingObserver {
    async fn record(&self, event: MetricEvent) -> Result<(), LivedeskError> {
        self.events
            .lock()
            .map_err(|_| LivedeskError::Internal("recording observer poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}
