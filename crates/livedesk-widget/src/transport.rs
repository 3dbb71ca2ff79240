// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client side of the widget protocol.
//!
//! [`HttpTransport`] posts JSON to `<server>/widget/api` and decodes the
//! `{success, ...}` envelope. Failure envelopes are mapped back onto
//! [`LivedeskError`] by their `code`.

use std::time::Duration;

use async_trait::async_trait;
use livedesk_core::LivedeskError;
use livedesk_core::types::{MessageId, VisitorId};
use livedesk_relay::protocol::{
    ActivityResponse, ConfigResponse, MarkReadResponse, MessagesResponse, RegisterResponse,
    SendResponse, WIDGET_KEY_PARAM, WidgetConfig,
};
use livedesk_relay::Action;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::debug;

/// Path of the widget endpoint relative to the server URL.
pub const WIDGET_API_PATH: &str = "/widget/api";

/// What the host page reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContext {
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// The six widget calls, bound to one widget key.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn get_config(&self) -> Result<WidgetConfig, LivedeskError>;

    async fn register_visitor(
        &self,
        visitor: Option<&VisitorId>,
        page: &PageContext,
    ) -> Result<VisitorId, LivedeskError>;

    async fn send_message(
        &self,
        visitor: Option<&VisitorId>,
        body: &str,
        page: &PageContext,
    ) -> Result<SendResponse, LivedeskError>;

    async fn get_messages(
        &self,
        visitor: &VisitorId,
        since: Option<MessageId>,
    ) -> Result<MessagesResponse, LivedeskError>;

    async fn mark_as_read(
        &self,
        visitor: &VisitorId,
        ids: &[MessageId],
    ) -> Result<usize, LivedeskError>;

    async fn update_activity(
        &self,
        visitor: &VisitorId,
        activity: &str,
        url: Option<&str>,
    ) -> Result<bool, LivedeskError>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    widget_key: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(
        server_url: &str,
        widget_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LivedeskError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("livedesk-widget/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LivedeskError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            endpoint: format!("{}{WIDGET_API_PATH}", server_url.trim_end_matches('/')),
            widget_key: widget_key.into(),
            timeout,
        })
    }

    pub fn widget_key(&self) -> &str {
        &self.widget_key
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(
        &self,
        action: Action,
        fields: Map<String, Value>,
    ) -> Result<T, LivedeskError> {
        let name: &'static str = action.into();
        let mut body = fields;
        body.insert("action".to_string(), json!(name));
        body.insert(WIDGET_KEY_PARAM.to_string(), json!(self.widget_key));

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let status = response.status();
        debug!(action = %action, status = %status, "relay response received");

        let bytes = response.bytes().await.map_err(|e| self.request_error(e))?;
        let envelope: Value = serde_json::from_slice(&bytes).map_err(|e| LivedeskError::Transport {
            message: format!("undecodable response ({status}): {e}"),
            source: Some(Box::new(e)),
        })?;
        decode_envelope(envelope)
    }

    fn request_error(&self, e: reqwest::Error) -> LivedeskError {
        if e.is_timeout() {
            LivedeskError::Timeout {
                duration: self.timeout,
            }
        } else {
            LivedeskError::Transport {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            }
        }
    }
}

/// Unwrap a `{success, ...}` envelope into `T`, or the error it carries.
pub fn decode_envelope<T: DeserializeOwned>(envelope: Value) -> Result<T, LivedeskError> {
    if envelope.get("success").and_then(Value::as_bool) == Some(true) {
        return serde_json::from_value(envelope).map_err(|e| LivedeskError::Transport {
            message: format!("unexpected response shape: {e}"),
            source: Some(Box::new(e)),
        });
    }
    let message = envelope
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("request failed")
        .to_string();
    Err(match envelope.get("code").and_then(Value::as_str) {
        Some("unauthorized") => LivedeskError::invalid_widget_key(),
        Some("validation") => LivedeskError::Validation(message),
        Some("not_found") => LivedeskError::NotFound {
            kind: "resource",
            id: message,
        },
        _ => LivedeskError::Transport {
            message,
            source: None,
        },
    })
}

fn contact_fields(visitor: Option<&VisitorId>, page: &PageContext) -> Map<String, Value> {
    let mut fields = Map::new();
    if let Some(visitor) = visitor {
        fields.insert("visitor_id".into(), json!(visitor));
    }
    for (key, value) in [
        ("url", &page.url),
        ("user_agent", &page.user_agent),
        ("referrer", &page.referrer),
    ] {
        if let Some(value) = value {
            fields.insert(key.into(), json!(value));
        }
    }
    fields
}

#[async_trait]
impl RelayTransport for HttpTransport {
    async fn get_config(&self) -> Result<WidgetConfig, LivedeskError> {
        let response: ConfigResponse = self.call(Action::GetConfig, Map::new()).await?;
        Ok(response.config)
    }

    async fn register_visitor(
        &self,
        visitor: Option<&VisitorId>,
        page: &PageContext,
    ) -> Result<VisitorId, LivedeskError> {
        let response: RegisterResponse = self
            .call(Action::RegisterVisitor, contact_fields(visitor, page))
            .await?;
        Ok(response.visitor_id)
    }

    async fn send_message(
        &self,
        visitor: Option<&VisitorId>,
        body: &str,
        page: &PageContext,
    ) -> Result<SendResponse, LivedeskError> {
        let mut fields = contact_fields(visitor, page);
        fields.insert("message".into(), json!(body));
        self.call(Action::SendMessage, fields).await
    }

    async fn get_messages(
        &self,
        visitor: &VisitorId,
        since: Option<MessageId>,
    ) -> Result<MessagesResponse, LivedeskError> {
        let mut fields = Map::new();
        fields.insert("visitor_id".into(), json!(visitor));
        if let Some(since) = since {
            fields.insert("since".into(), json!(since));
        }
        self.call(Action::GetMessages, fields).await
    }

    async fn mark_as_read(
        &self,
        visitor: &VisitorId,
        ids: &[MessageId],
    ) -> Result<usize, LivedeskError> {
        let mut fields = Map::new();
        fields.insert("visitor_id".into(), json!(visitor));
        fields.insert("message_ids".into(), json!(ids));
        let response: MarkReadResponse = self.call(Action::MarkAsRead, fields).await?;
        Ok(response.updated)
    }

    async fn update_activity(
        &self,
        visitor: &VisitorId,
        activity: &str,
        url: Option<&str>,
    ) -> Result<bool, LivedeskError> {
        let mut fields = Map::new();
        fields.insert("visitor_id".into(), json!(visitor));
        fields.insert("activity".into(), json!(activity));
        if let Some(url) = url {
            fields.insert("url".into(), json!(url));
        }
        let response: ActivityResponse = self.call(Action::UpdateActivity, fields).await?;
        Ok(response.touched)
    }
}
