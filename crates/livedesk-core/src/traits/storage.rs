// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter traits: tenant directory, visitor registry, message store.

use async_trait::async_trait;

use crate::error::LivedeskError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChatMessage, MessageId, NewMessage, SenderRole, Tenant, TenantId, Visitor, VisitorContact,
    VisitorId, VisitorResolution, VisitorSummary, WidgetSettings,
};

/// Maps credentials to tenants and exposes tenant-level state.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Looks up the tenant owning `widget_key`.
    async fn resolve_tenant(&self, widget_key: &str) -> Result<Option<Tenant>, LivedeskError>;

    /// Looks up the tenant owning the agent API key.
    async fn resolve_agent(&self, agent_key: &str) -> Result<Option<Tenant>, LivedeskError>;

    /// Widget customisation for the tenant, if any was saved.
    async fn widget_settings(
        &self,
        tenant: TenantId,
    ) -> Result<Option<WidgetSettings>, LivedeskError>;

    /// Records agent activity now; drives the online flag.
    async fn record_heartbeat(&self, tenant: TenantId) -> Result<(), LivedeskError>;
}

/// Creates, finds, and touches visitors.
#[async_trait]
pub trait VisitorRegistry: Send + Sync {
    /// Resolves a visitor by client id, then by client address, else creates one.
    ///
    /// The first two steps touch `last_active` and `url` on the matched row.
    async fn resolve_or_create_visitor(
        &self,
        tenant: TenantId,
        contact: &VisitorContact,
    ) -> Result<VisitorResolution, LivedeskError>;

    /// Updates `last_active` (and `url` when given). Returns whether a row matched;
    /// a missing row is not an error.
    async fn touch_activity(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
        url: Option<&str>,
    ) -> Result<bool, LivedeskError>;

    async fn get_visitor(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
    ) -> Result<Option<Visitor>, LivedeskError>;

    async fn visitor_exists(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
    ) -> Result<bool, LivedeskError> {
        Ok(self.get_visitor(tenant, visitor).await?.is_some())
    }

    /// Appends a row to the visitor activity history.
    async fn record_activity(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
        activity: &str,
        url: Option<&str>,
    ) -> Result<(), LivedeskError>;

    /// Inbox listing, most recently active first.
    async fn list_visitors(&self, tenant: TenantId) -> Result<Vec<VisitorSummary>, LivedeskError>;
}

/// Append-only per-(tenant, visitor) message log.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends one message and returns it with its assigned id and timestamp.
    async fn append(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
        body: &str,
        role: SenderRole,
    ) -> Result<ChatMessage, LivedeskError>;

    /// Appends all messages atomically; they receive consecutive ids in input order.
    async fn append_batch(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
        messages: &[NewMessage],
    ) -> Result<Vec<ChatMessage>, LivedeskError>;

    /// Messages ascending by (created_at, id), restricted to ids above `since`.
    async fn list_since(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
        since: Option<MessageId>,
    ) -> Result<Vec<ChatMessage>, LivedeskError>;

    /// Flags messages read, but only those sent by the reader's counterpart.
    /// Returns the number of rows that changed.
    async fn mark_read(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
        ids: &[MessageId],
        reader: SenderRole,
    ) -> Result<usize, LivedeskError>;

    /// Unread messages the reader has yet to see.
    async fn unread_count(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
        reader: SenderRole,
    ) -> Result<i64, LivedeskError>;
}

/// Adapter for storage and persistence backends.
///
/// Storage adapters own the connection lifecycle and provide all three
/// relay stores over one schema.
#[async_trait]
pub trait StorageAdapter: PluginAdapter + TenantDirectory + VisitorRegistry + MessageStore {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), LivedeskError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), LivedeskError>;
}
