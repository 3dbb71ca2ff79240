// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The relay protocol handler.
//!
//! Every operation starts from a credential and re-resolves the tenant; no
//! state survives between calls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use livedesk_config::model::RelayConfig;
use livedesk_core::types::{
    MessageId, MetricEvent, NewMessage, RequestOutcome, ResolutionStep, SenderRole, Tenant,
    VisitorContact, VisitorId, WidgetSettings,
};
use livedesk_core::{
    LivedeskError, MessageStore, ObservabilityAdapter, StorageAdapter, TenantDirectory,
    VisitorRegistry,
};
use tracing::{debug, info, warn};

use crate::protocol::{
    ActivityResponse, ConfigResponse, MarkReadResponse, MessagesResponse, RegisterResponse,
    RelayRequest, RelayResponse, SendResponse, WidgetConfig,
};

const DEFAULT_THEME: &str = "light";
const DEFAULT_PRIMARY_COLOR: &str = "#4a6cf7";
const DEFAULT_ACTIVITY: &str = "ping";

/// Stateless dispatcher over the tenant directory, visitor registry, and message store.
pub struct RelayService {
    store: Arc<dyn StorageAdapter>,
    observer: Option<Arc<dyn ObservabilityAdapter>>,
    config: RelayConfig,
    site_url: String,
}

impl RelayService {
    pub fn new(store: Arc<dyn StorageAdapter>, config: RelayConfig, site_url: impl Into<String>) -> Self {
        Self {
            store,
            observer: None,
            config,
            site_url: site_url.into(),
        }
    }

    /// Attach a metrics sink.
    pub fn with_observer(mut self, observer: Arc<dyn ObservabilityAdapter>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn store(&self) -> &Arc<dyn StorageAdapter> {
        &self.store
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Whether the tenant's agent heartbeat is fresh.
    pub fn is_online(&self, tenant: &Tenant) -> bool {
        tenant.is_online(
            Utc::now(),
            Duration::from_secs(self.config.online_window_secs),
        )
    }

    pub(crate) async fn emit(&self, event: MetricEvent) {
        let Some(observer) = &self.observer else {
            return;
        };
        if let Err(e) = observer.record(event).await {
            warn!(error = %e, "failed to record metric");
        }
    }

    /// Resolve a widget key; unknown or blank keys are uniformly unauthorized.
    pub async fn authenticate(&self, widget_key: &str) -> Result<Tenant, LivedeskError> {
        let widget_key = widget_key.trim();
        if widget_key.is_empty() {
            return Err(LivedeskError::invalid_widget_key());
        }
        self.store
            .resolve_tenant(widget_key)
            .await?
            .ok_or_else(LivedeskError::invalid_widget_key)
    }

    /// Trim and bound a message body.
    pub(crate) fn validate_body(&self, body: &str) -> Result<String, LivedeskError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(LivedeskError::Validation("message is required".to_string()));
        }
        let len = body.chars().count();
        if len > self.config.max_message_len {
            return Err(LivedeskError::Validation(format!(
                "message is too long ({len} characters, limit {})",
                self.config.max_message_len
            )));
        }
        Ok(body.to_string())
    }

    /// Run one widget request, recording its outcome and latency.
    pub async fn dispatch(
        &self,
        widget_key: &str,
        request: RelayRequest,
    ) -> Result<RelayResponse, LivedeskError> {
        let action = request.action();
        let started = Instant::now();

        let result = match request {
            RelayRequest::GetConfig => self.get_config(widget_key).await.map(RelayResponse::Config),
            RelayRequest::RegisterVisitor { contact } => self
                .register_visitor(widget_key, &contact)
                .await
                .map(RelayResponse::Registered),
            RelayRequest::SendMessage { message, contact } => self
                .send_message(widget_key, &message, &contact)
                .await
                .map(RelayResponse::Sent),
            RelayRequest::GetMessages { visitor_id, since } => self
                .get_messages(widget_key, &visitor_id, since)
                .await
                .map(RelayResponse::Messages),
            RelayRequest::MarkAsRead {
                visitor_id,
                message_ids,
            } => self
                .mark_as_read(widget_key, &visitor_id, &message_ids)
                .await
                .map(RelayResponse::MarkedRead),
            RelayRequest::UpdateActivity {
                visitor_id,
                activity,
                url,
            } => self
                .update_activity(widget_key, &visitor_id, activity.as_deref(), url.as_deref())
                .await
                .map(RelayResponse::Activity),
        };

        let outcome = outcome_of(&result);
        match &result {
            Ok(_) => debug!(action = %action, "relay request ok"),
            Err(e) if e.is_client_error() => debug!(action = %action, error = %e, "relay request rejected"),
            Err(e) => warn!(action = %action, error = %e, "relay request failed"),
        }
        self.emit(MetricEvent::Request {
            action: action.into(),
            outcome,
            latency_secs: started.elapsed().as_secs_f64(),
        })
        .await;
        result
    }

    /// Widget appearance and presence for the tenant.
    pub async fn get_config(&self, widget_key: &str) -> Result<ConfigResponse, LivedeskError> {
        let tenant = self.authenticate(widget_key).await?;
        let now = Utc::now();
        let settings = if tenant.subscription_active(now) {
            self.store.widget_settings(tenant.id).await?
        } else {
            None
        };
        let online = self.is_online(&tenant);
        Ok(ConfigResponse {
            config: build_widget_config(
                &tenant,
                settings.as_ref(),
                &self.config,
                &self.site_url,
                online,
                now,
            ),
        })
    }

    /// Resolve or create the caller's visitor.
    pub async fn register_visitor(
        &self,
        widget_key: &str,
        contact: &VisitorContact,
    ) -> Result<RegisterResponse, LivedeskError> {
        let tenant = self.authenticate(widget_key).await?;
        let visitor_id = self.resolve_visitor(&tenant, contact).await?;
        Ok(RegisterResponse { visitor_id })
    }

    async fn resolve_visitor(
        &self,
        tenant: &Tenant,
        contact: &VisitorContact,
    ) -> Result<VisitorId, LivedeskError> {
        let resolution = self
            .store
            .resolve_or_create_visitor(tenant.id, contact)
            .await?;
        if resolution.step == ResolutionStep::Created {
            info!(tenant_id = %tenant.id, visitor_id = %resolution.visitor_id, "visitor created");
            self.emit(MetricEvent::VisitorCreated).await;
        }
        Ok(resolution.visitor_id)
    }

    /// Store a visitor message, plus the offline auto-reply when no agent is online.
    pub async fn send_message(
        &self,
        widget_key: &str,
        body: &str,
        contact: &VisitorContact,
    ) -> Result<SendResponse, LivedeskError> {
        let tenant = self.authenticate(widget_key).await?;
        let body = self.validate_body(body)?;
        let visitor_id = self.resolve_visitor(&tenant, contact).await?;

        let mut batch = vec![NewMessage::new(body, SenderRole::Visitor)];
        let online = self.is_online(&tenant);
        if !online {
            let settings = self.store.widget_settings(tenant.id).await?;
            batch.push(NewMessage::new(
                auto_reply_text(settings.as_ref(), &self.config),
                SenderRole::Agent,
            ));
        }

        let stored = self
            .store
            .append_batch(tenant.id, &visitor_id, &batch)
            .await?;
        let mut stored = stored.into_iter();
        let message = stored
            .next()
            .ok_or_else(|| LivedeskError::Internal("append returned no rows".to_string()))?;
        let reply = stored.next();

        self.emit(MetricEvent::MessageStored {
            role: SenderRole::Visitor,
        })
        .await;
        if reply.is_some() {
            self.emit(MetricEvent::MessageStored {
                role: SenderRole::Agent,
            })
            .await;
            self.emit(MetricEvent::AutoReply).await;
        }
        debug!(
            tenant_id = %tenant.id,
            visitor_id = %visitor_id,
            message_id = %message.id,
            auto_reply = reply.is_some(),
            "visitor message stored"
        );

        Ok(SendResponse {
            message_id: message.id,
            created_at: message.created_at,
            visitor_id,
            reply_id: reply.as_ref().map(|r| r.id),
            reply: reply.map(|r| r.body),
        })
    }

    /// Messages newer than `since` for a known visitor.
    pub async fn get_messages(
        &self,
        widget_key: &str,
        visitor_id: &VisitorId,
        since: Option<MessageId>,
    ) -> Result<MessagesResponse, LivedeskError> {
        let tenant = self.authenticate(widget_key).await?;
        self.require_visitor(&tenant, visitor_id).await?;
        let messages = self.store.list_since(tenant.id, visitor_id, since).await?;
        Ok(MessagesResponse {
            messages,
            agent_online: self.is_online(&tenant),
            agent_typing: false,
        })
    }

    /// Mark agent messages read on behalf of the visitor.
    pub async fn mark_as_read(
        &self,
        widget_key: &str,
        visitor_id: &VisitorId,
        message_ids: &[MessageId],
    ) -> Result<MarkReadResponse, LivedeskError> {
        let tenant = self.authenticate(widget_key).await?;
        if message_ids.is_empty() {
            return Err(LivedeskError::Validation(
                "message_ids is required".to_string(),
            ));
        }
        let updated = self
            .store
            .mark_read(tenant.id, visitor_id, message_ids, SenderRole::Visitor)
            .await?;
        Ok(MarkReadResponse { updated })
    }

    /// Heartbeat from the widget. An unknown visitor is a silent no-op.
    pub async fn update_activity(
        &self,
        widget_key: &str,
        visitor_id: &VisitorId,
        activity: Option<&str>,
        url: Option<&str>,
    ) -> Result<ActivityResponse, LivedeskError> {
        let tenant = self.authenticate(widget_key).await?;
        let touched = self
            .store
            .touch_activity(tenant.id, visitor_id, url)
            .await?;
        if touched {
            self.store
                .record_activity(
                    tenant.id,
                    visitor_id,
                    activity.unwrap_or(DEFAULT_ACTIVITY),
                    url,
                )
                .await?;
        } else {
            debug!(tenant_id = %tenant.id, visitor_id = %visitor_id, "activity for unknown visitor ignored");
        }
        Ok(ActivityResponse { touched })
    }

    pub(crate) async fn require_visitor(
        &self,
        tenant: &Tenant,
        visitor_id: &VisitorId,
    ) -> Result<(), LivedeskError> {
        if self.store.visitor_exists(tenant.id, visitor_id).await? {
            Ok(())
        } else {
            Err(LivedeskError::NotFound {
                kind: "visitor",
                id: visitor_id.to_string(),
            })
        }
    }
}

/// Metrics outcome class for a result.
pub fn outcome_of<T>(result: &Result<T, LivedeskError>) -> RequestOutcome {
    match result {
        Ok(_) => RequestOutcome::Ok,
        Err(LivedeskError::Unauthorized(_)) => RequestOutcome::Unauthorized,
        Err(e) if e.is_client_error() => RequestOutcome::Invalid,
        Err(_) => RequestOutcome::Failed,
    }
}

/// The tenant's offline message when set, else the configured default.
pub fn auto_reply_text(settings: Option<&WidgetSettings>, config: &RelayConfig) -> String {
    settings
        .and_then(|s| s.offline_message.as_deref())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(&config.default_auto_reply)
        .to_string()
}

/// Build the widget config. Saved settings only apply to active subscriptions.
pub fn build_widget_config(
    tenant: &Tenant,
    settings: Option<&WidgetSettings>,
    config: &RelayConfig,
    site_url: &str,
    online: bool,
    now: DateTime<Utc>,
) -> WidgetConfig {
    let subscription_active = tenant.subscription_active(now);
    match settings.filter(|_| subscription_active) {
        Some(s) => WidgetConfig {
            theme: DEFAULT_THEME.to_string(),
            position: s.position.css_name().to_string(),
            primary_color: s
                .theme_color
                .clone()
                .unwrap_or_else(|| DEFAULT_PRIMARY_COLOR.to_string()),
            auto_open: s.auto_popup,
            greeting_message: s
                .welcome_message
                .clone()
                .unwrap_or_else(|| config.default_greeting.clone()),
            offline_message: s
                .offline_message
                .clone()
                .unwrap_or_else(|| config.default_offline_message.clone()),
            show_branding: s.show_branding,
            user_online: online,
            site_url: site_url.to_string(),
        },
        None => WidgetConfig {
            theme: DEFAULT_THEME.to_string(),
            position: livedesk_core::types::WidgetPosition::default()
                .css_name()
                .to_string(),
            primary_color: DEFAULT_PRIMARY_COLOR.to_string(),
            auto_open: false,
            greeting_message: config.default_greeting.clone(),
            offline_message: config.default_offline_message.clone(),
            show_branding: !subscription_active,
            user_online: online,
            site_url: site_url.to_string(),
        },
    }
}
