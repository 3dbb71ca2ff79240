// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the storage, relay, gateway, and widget crates.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Storage format for every timestamp the relay writes.
///
/// Fixed width with millisecond precision, so lexical order equals
/// chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Current time in [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Formats a UTC instant in [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a stored timestamp. Accepts RFC 3339 and the legacy
/// `YYYY-MM-DD HH:MM:SS` form (interpreted as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Store-assigned tenant identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub i64);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque visitor identifier, unique within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitorId(pub String);

impl VisitorId {
    /// Generates a fresh server-side visitor id (`v_` + 32 hex chars).
    pub fn generate() -> Self {
        Self(format!("v_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VisitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store-assigned message identifier. Strictly increasing in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which party wrote a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SenderRole {
    Visitor,
    Agent,
}

impl SenderRole {
    /// The other party. A reader may only mark messages from this role as read.
    pub fn counterpart(self) -> Self {
        match self {
            Self::Visitor => Self::Agent,
            Self::Agent => Self::Visitor,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Visitor => "visitor",
            Self::Agent => "agent",
        }
    }
}

/// A tenant account as seen by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub widget_key: String,
    pub agent_key: String,
    /// Last agent heartbeat, `None` if the agent never connected.
    pub last_activity: Option<String>,
    pub subscription_status: Option<String>,
    pub subscription_expiry: Option<String>,
    pub created_at: String,
}

impl Tenant {
    /// True iff the subscription is `active` and its expiry lies in the future.
    pub fn subscription_active(&self, now: DateTime<Utc>) -> bool {
        let active = self.subscription_status.as_deref() == Some("active");
        let unexpired = self
            .subscription_expiry
            .as_deref()
            .and_then(parse_timestamp)
            .is_some_and(|expiry| expiry > now);
        active && unexpired
    }

    /// True iff the last agent activity lies within `window` of `now`.
    pub fn is_online(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let Some(last) = self.last_activity.as_deref().and_then(parse_timestamp) else {
            return false;
        };
        let Ok(window) = chrono::Duration::from_std(window) else {
            return false;
        };
        now.signed_duration_since(last) < window
    }
}

/// Input for provisioning a tenant.
#[derive(Debug, Clone, Default)]
pub struct NewTenant {
    pub name: String,
    pub subscription_status: Option<String>,
    pub subscription_expiry: Option<String>,
}

/// Corner of the host page the widget docks to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WidgetPosition {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

impl WidgetPosition {
    /// Hyphenated form used by the embed script (`bottom-right`).
    pub fn css_name(self) -> &'static str {
        match self {
            Self::BottomRight => "bottom-right",
            Self::BottomLeft => "bottom-left",
            Self::TopRight => "top-right",
            Self::TopLeft => "top-left",
        }
    }
}

/// Per-tenant widget customisation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WidgetSettings {
    pub theme_color: Option<String>,
    pub position: WidgetPosition,
    pub welcome_message: Option<String>,
    pub offline_message: Option<String>,
    pub auto_popup: bool,
    pub show_branding: bool,
}

/// A visitor row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Visitor {
    pub id: VisitorId,
    pub tenant_id: TenantId,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub url: Option<String>,
    pub referrer: Option<String>,
    pub created_at: String,
    pub last_active: String,
}

/// What a client tells us about itself when it makes contact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorContact {
    /// Visitor id the client remembers, if any.
    pub client_visitor_id: Option<VisitorId>,
    pub client_address: Option<String>,
    pub user_agent: Option<String>,
    pub url: Option<String>,
    pub referrer: Option<String>,
}

/// Which resolution step produced the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ResolutionStep {
    ClientId,
    ClientAddress,
    Created,
}

/// Result of visitor resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorResolution {
    pub visitor_id: VisitorId,
    pub step: ResolutionStep,
}

/// One stored line of conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub tenant_id: TenantId,
    pub visitor_id: VisitorId,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(rename = "sender_type")]
    pub sender_role: SenderRole,
    pub read: bool,
    pub created_at: String,
}

/// A message waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub body: String,
    pub sender_role: SenderRole,
}

impl NewMessage {
    pub fn new(body: impl Into<String>, sender_role: SenderRole) -> Self {
        Self {
            body: body.into(),
            sender_role,
        }
    }
}

/// Inbox row for the agent API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitorSummary {
    #[serde(flatten)]
    pub visitor: Visitor,
    pub total_messages: i64,
    pub unread_messages: i64,
    pub last_message_at: Option<String>,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Observability,
    Transport,
}

/// Outcome class of one relay operation, used for metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RequestOutcome {
    Ok,
    Unauthorized,
    Invalid,
    Failed,
}

/// A relay event recorded by observability adapters.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricEvent {
    /// A relay operation finished.
    Request {
        action: &'static str,
        outcome: RequestOutcome,
        latency_secs: f64,
    },
    /// A message row was appended.
    MessageStored { role: SenderRole },
    /// An offline auto-reply was synthesized.
    AutoReply,
    /// A visitor row was created.
    VisitorCreated,
}
