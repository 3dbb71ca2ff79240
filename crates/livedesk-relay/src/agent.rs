// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent-side operations. The caller has already resolved the tenant from
//! its agent key.

use livedesk_core::{LivedeskError, MessageStore, TenantDirectory, VisitorRegistry};
use livedesk_core::types::{
    ChatMessage, MessageId, MetricEvent, SenderRole, Tenant, VisitorId, VisitorSummary,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::service::RelayService;

/// Heartbeat acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub online: bool,
}

/// Agent inbox listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxResponse {
    pub visitors: Vec<VisitorSummary>,
}

impl RelayService {
    /// Resolve an agent API key.
    pub async fn authenticate_agent(&self, agent_key: &str) -> Result<Tenant, LivedeskError> {
        let agent_key = agent_key.trim();
        if agent_key.is_empty() {
            return Err(LivedeskError::invalid_agent_key());
        }
        self.store()
            .resolve_agent(agent_key)
            .await?
            .ok_or_else(LivedeskError::invalid_agent_key)
    }

    pub async fn agent_heartbeat(&self, tenant: &Tenant) -> Result<HeartbeatResponse, LivedeskError> {
        self.store().record_heartbeat(tenant.id).await?;
        debug!(tenant_id = %tenant.id, "agent heartbeat");
        Ok(HeartbeatResponse { online: true })
    }

    pub async fn agent_inbox(&self, tenant: &Tenant) -> Result<InboxResponse, LivedeskError> {
        let visitors = self.store().list_visitors(tenant.id).await?;
        Ok(InboxResponse { visitors })
    }

    pub async fn agent_messages(
        &self,
        tenant: &Tenant,
        visitor_id: &VisitorId,
        since: Option<MessageId>,
    ) -> Result<Vec<ChatMessage>, LivedeskError> {
        self.require_visitor(tenant, visitor_id).await?;
        self.store().list_since(tenant.id, visitor_id, since).await
    }

    /// Post an agent reply. Replying counts as agent activity.
    pub async fn agent_send(
        &self,
        tenant: &Tenant,
        visitor_id: &VisitorId,
        body: &str,
    ) -> Result<ChatMessage, LivedeskError> {
        let body = self.validate_body(body)?;
        self.require_visitor(tenant, visitor_id).await?;
        let message = self
            .store()
            .append(tenant.id, visitor_id, &body, SenderRole::Agent)
            .await?;
        self.store().record_heartbeat(tenant.id).await?;
        self.emit(MetricEvent::MessageStored {
            role: SenderRole::Agent,
        })
        .await;
        debug!(tenant_id = %tenant.id, visitor_id = %visitor_id, message_id = %message.id, "agent reply stored");
        Ok(message)
    }

    /// Mark visitor messages read on behalf of the agent.
    pub async fn agent_mark_read(
        &self,
        tenant: &Tenant,
        visitor_id: &VisitorId,
        message_ids: &[MessageId],
    ) -> Result<usize, LivedeskError> {
        if message_ids.is_empty() {
            return Err(LivedeskError::Validation(
                "message_ids is required".to_string(),
            ));
        }
        self.store()
            .mark_read(tenant.id, visitor_id, message_ids, SenderRole::Agent)
            .await
    }
}
