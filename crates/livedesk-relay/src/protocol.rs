// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Widget protocol: actions, parameter parsing, and response bodies.
//!
//! Parameters arrive as a flat JSON object merged from the query string and
//! the request body. Values may be strings or numbers; the embed script sends
//! both.

use livedesk_core::LivedeskError;
use livedesk_core::types::{ChatMessage, MessageId, VisitorContact, VisitorId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString, IntoStaticStr};

/// Merged request parameters.
pub type Params = serde_json::Map<String, Value>;

/// Parameter carrying the widget key. Named after the embed script's field.
pub const WIDGET_KEY_PARAM: &str = "widget_id";

/// The six widget operations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    GetConfig,
    RegisterVisitor,
    SendMessage,
    GetMessages,
    MarkAsRead,
    UpdateActivity,
}

impl Action {
    /// Parse the `action` parameter; unknown names are a validation failure.
    pub fn parse(raw: Option<&str>) -> Result<Self, LivedeskError> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
            LivedeskError::Validation("action is required".to_string())
        })?;
        raw.parse()
            .map_err(|_| LivedeskError::Validation(format!("unknown action `{raw}`")))
    }
}

/// A parsed widget request, minus the widget key.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayRequest {
    GetConfig,
    RegisterVisitor {
        contact: VisitorContact,
    },
    SendMessage {
        message: String,
        contact: VisitorContact,
    },
    GetMessages {
        visitor_id: VisitorId,
        since: Option<MessageId>,
    },
    MarkAsRead {
        visitor_id: VisitorId,
        message_ids: Vec<MessageId>,
    },
    UpdateActivity {
        visitor_id: VisitorId,
        activity: Option<String>,
        url: Option<String>,
    },
}

impl RelayRequest {
    pub fn action(&self) -> Action {
        match self {
            Self::GetConfig => Action::GetConfig,
            Self::RegisterVisitor { .. } => Action::RegisterVisitor,
            Self::SendMessage { .. } => Action::SendMessage,
            Self::GetMessages { .. } => Action::GetMessages,
            Self::MarkAsRead { .. } => Action::MarkAsRead,
            Self::UpdateActivity { .. } => Action::UpdateActivity,
        }
    }

    /// Build a request from merged parameters. `client_address` comes from
    /// the transport, never from parameters.
    pub fn from_params(
        action: Action,
        params: &Params,
        client_address: Option<String>,
    ) -> Result<Self, LivedeskError> {
        let contact = || VisitorContact {
            client_visitor_id: param_str(params, "visitor_id").map(VisitorId),
            client_address: client_address.clone(),
            user_agent: param_str(params, "user_agent"),
            url: param_str(params, "url"),
            referrer: param_str(params, "referrer"),
        };
        Ok(match action {
            Action::GetConfig => Self::GetConfig,
            Action::RegisterVisitor => Self::RegisterVisitor { contact: contact() },
            Action::SendMessage => Self::SendMessage {
                // Emptiness is judged by the service after trimming.
                message: param_str(params, "message").unwrap_or_default(),
                contact: contact(),
            },
            Action::GetMessages => Self::GetMessages {
                visitor_id: required_visitor(params)?,
                since: param_message_id(params, "since")?.filter(|id| id.0 > 0),
            },
            Action::MarkAsRead => Self::MarkAsRead {
                visitor_id: required_visitor(params)?,
                message_ids: param_message_ids(params, "message_ids")?,
            },
            Action::UpdateActivity => Self::UpdateActivity {
                visitor_id: required_visitor(params)?,
                activity: param_str(params, "activity"),
                url: param_str(params, "url"),
            },
        })
    }
}

/// String value of a parameter; numbers are stringified, blanks are absent.
pub fn param_str(params: &Params, key: &str) -> Option<String> {
    match params.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_visitor(params: &Params) -> Result<VisitorId, LivedeskError> {
    param_str(params, "visitor_id")
        .map(|s| VisitorId(s.trim().to_string()))
        .ok_or_else(|| LivedeskError::Validation("visitor_id is required".to_string()))
}

fn parse_id(key: &str, value: &Value) -> Result<MessageId, LivedeskError> {
    let invalid = || LivedeskError::Validation(format!("{key} must contain message ids"));
    match value {
        Value::Number(n) => n.as_i64().map(MessageId).ok_or_else(invalid),
        Value::String(s) => s.trim().parse().map(MessageId).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn param_message_id(params: &Params, key: &str) -> Result<Option<MessageId>, LivedeskError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(value) => parse_id(key, value).map(Some),
    }
}

/// Accepts an array, a single id, or a comma-separated string. Must be non-empty.
fn param_message_ids(params: &Params, key: &str) -> Result<Vec<MessageId>, LivedeskError> {
    let ids = match params.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| parse_id(key, v))
            .collect::<Result<_, _>>()?,
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| parse_id(key, &Value::String(part.to_string())))
            .collect::<Result<_, _>>()?,
        Some(value) => vec![parse_id(key, value)?],
    };
    if ids.is_empty() {
        return Err(LivedeskError::Validation(format!("{key} is required")));
    }
    Ok(ids)
}

/// Widget appearance and presence, in the embed script's field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    pub theme: String,
    pub position: String,
    pub primary_color: String,
    pub auto_open: bool,
    pub greeting_message: String,
    pub offline_message: String,
    pub show_branding: bool,
    pub user_online: bool,
    pub site_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub config: WidgetConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub visitor_id: VisitorId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    pub message_id: MessageId,
    pub created_at: String,
    pub visitor_id: VisitorId,
    /// Offline auto-reply text, when one was stored.
    pub reply: Option<String>,
    pub reply_id: Option<MessageId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<ChatMessage>,
    pub agent_online: bool,
    /// Always false; kept for embed script compatibility.
    #[serde(default)]
    pub agent_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub updated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityResponse {
    /// False when the visitor id matched nothing.
    pub touched: bool,
}

/// Any successful widget response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RelayResponse {
    Config(ConfigResponse),
    Registered(RegisterResponse),
    Sent(SendResponse),
    Messages(MessagesResponse),
    MarkedRead(MarkReadResponse),
    Activity(ActivityResponse),
}

impl RelayResponse {
    /// JSON object with `success: true` prepended to the response fields.
    pub fn to_json(&self) -> Value {
        let mut body = serde_json::Map::new();
        body.insert("success".to_string(), Value::Bool(true));
        if let Ok(Value::Object(fields)) = serde_json::to_value(self) {
            body.extend(fields);
        }
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => panic!("params must be an object"),
        }
    }

    #[test]
    fn action_names_round_trip() {
        for action in [
            Action::GetConfig,
            Action::RegisterVisitor,
            Action::SendMessage,
            Action::GetMessages,
            Action::MarkAsRead,
            Action::UpdateActivity,
        ] {
            let name: &'static str = action.into();
            assert_eq!(Action::parse(Some(name)).unwrap(), action);
            assert_eq!(action.to_string(), name);
            assert_eq!(serde_json::to_value(action).unwrap(), json!(name));
        }
    }

    #[test]
    fn unknown_or_missing_action_is_validation() {
        assert!(matches!(
            Action::parse(Some("drop_tables")),
            Err(LivedeskError::Validation(_))
        ));
        assert!(matches!(Action::parse(None), Err(LivedeskError::Validation(_))));
        assert!(matches!(Action::parse(Some("  ")), Err(LivedeskError::Validation(_))));
    }

    #[test]
    fn send_message_collects_contact() {
        let p = params(json!({
            "message": "hi",
            "visitor_id": "v_abc",
            "url": "https://site/",
            "user_agent": "UA",
        }));
        let req = RelayRequest::from_params(Action::SendMessage, &p, Some("10.0.0.1".into())).unwrap();
        match req {
            RelayRequest::SendMessage { message, contact } => {
                assert_eq!(message, "hi");
                assert_eq!(contact.client_visitor_id, Some(VisitorId("v_abc".into())));
                assert_eq!(contact.client_address.as_deref(), Some("10.0.0.1"));
                assert_eq!(contact.url.as_deref(), Some("https://site/"));
                assert!(contact.referrer.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn get_messages_requires_visitor_and_parses_since() {
        let missing = RelayRequest::from_params(Action::GetMessages, &params(json!({})), None);
        assert!(matches!(missing, Err(LivedeskError::Validation(m)) if m.contains("visitor_id")));

        let req = RelayRequest::from_params(
            Action::GetMessages,
            &params(json!({"visitor_id": "v_1", "since": "12"})),
            None,
        )
        .unwrap();
        assert_eq!(
            req,
            RelayRequest::GetMessages {
                visitor_id: VisitorId("v_1".into()),
                since: Some(MessageId(12)),
            }
        );

        let zero = RelayRequest::from_params(
            Action::GetMessages,
            &params(json!({"visitor_id": "v_1", "since": 0})),
            None,
        )
        .unwrap();
        assert!(matches!(zero, RelayRequest::GetMessages { since: None, .. }));

        let bad = RelayRequest::from_params(
            Action::GetMessages,
            &params(json!({"visitor_id": "v_1", "since": "yesterday"})),
            None,
        );
        assert!(matches!(bad, Err(LivedeskError::Validation(_))));
    }

    #[test]
    fn message_ids_accept_array_scalar_and_csv() {
        let cases = [
            json!({"visitor_id": "v", "message_ids": [1, "2", 3]}),
            json!({"visitor_id": "v", "message_ids": "1, 2,3"}),
        ];
        for case in cases {
            let req = RelayRequest::from_params(Action::MarkAsRead, &params(case), None).unwrap();
            assert!(matches!(
                req,
                RelayRequest::MarkAsRead { ref message_ids, .. }
                    if message_ids == &[MessageId(1), MessageId(2), MessageId(3)]
            ));
        }

        let single = RelayRequest::from_params(
            Action::MarkAsRead,
            &params(json!({"visitor_id": "v", "message_ids": 9})),
            None,
        )
        .unwrap();
        assert!(matches!(
            single,
            RelayRequest::MarkAsRead { message_ids, .. } if message_ids == vec![MessageId(9)]
        ));

        for bad in [json!({"visitor_id": "v"}), json!({"visitor_id": "v", "message_ids": []})] {
            let err = RelayRequest::from_params(Action::MarkAsRead, &params(bad), None);
            assert!(matches!(err, Err(LivedeskError::Validation(m)) if m.contains("message_ids")));
        }
    }

    #[test]
    fn response_json_has_success_flag() {
        let body = RelayResponse::Registered(RegisterResponse {
            visitor_id: VisitorId("v_1".into()),
        })
        .to_json();
        assert_eq!(body, json!({"success": true, "visitor_id": "v_1"}));

        let sent = RelayResponse::Sent(SendResponse {
            message_id: MessageId(3),
            created_at: "2026-01-01T00:00:00.000Z".into(),
            visitor_id: VisitorId("v_1".into()),
            reply: None,
            reply_id: None,
        })
        .to_json();
        assert_eq!(sent["message_id"], 3);
        assert!(sent["reply"].is_null());
    }

    #[test]
    fn widget_config_uses_camel_case() {
        let config = WidgetConfig {
            theme: "light".into(),
            position: "bottom-right".into(),
            primary_color: "#4a6cf7".into(),
            auto_open: false,
            greeting_message: "hi".into(),
            offline_message: "away".into(),
            show_branding: true,
            user_online: false,
            site_url: "http://x".into(),
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["primaryColor"], "#4a6cf7");
        assert_eq!(json["userOnline"], false);
        assert_eq!(json["siteUrl"], "http://x");
    }
}
