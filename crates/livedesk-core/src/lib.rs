// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the livedesk chat relay.
//!
//! This crate provides the trait definitions, error types, and common types
//! shared by the storage backend, the relay service, the HTTP gateway, and
//! the widget client. Storage backends implement the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::LivedeskError;
pub use types::{
    AdapterType, ChatMessage, HealthStatus, MessageId, MetricEvent, NewMessage, NewTenant,
    RequestOutcome, ResolutionStep, SenderRole, Tenant, TenantId, Visitor, VisitorContact,
    VisitorId, VisitorResolution, VisitorSummary, WidgetPosition, WidgetSettings,
};

// Re-export all adapter traits at crate root.
pub use traits::{
    MessageStore, ObservabilityAdapter, PluginAdapter, StorageAdapter, TenantDirectory,
    VisitorRegistry,
};
