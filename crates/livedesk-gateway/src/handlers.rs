// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.
//!
//! The widget endpoint accepts GET or POST with parameters in the query
//! string, a JSON body, or a form body. The agent endpoints are plain JSON.

use std::net::SocketAddr;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{ConnectInfo, Path, RawQuery, Request, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use livedesk_core::types::{HealthStatus, MessageId, Tenant, VisitorId};
use livedesk_core::{LivedeskError, PluginAdapter};
use livedesk_relay::protocol::param_str;
use livedesk_relay::{Action, Params, RelayRequest, WIDGET_KEY_PARAM};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Upper bound on a widget request body.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Query for GET /v1/agent/visitors/{visitor_id}/messages.
#[derive(Debug, Default, Deserialize)]
pub struct SinceQuery {
    #[serde(default)]
    pub since: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AgentMessageBody {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AgentReadBody {
    pub message_ids: Vec<i64>,
}

/// Client address: `X-Client-IP`, then the first `X-Forwarded-For` hop,
/// then the socket peer.
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    if let Some(ip) = header_value("x-client-ip") {
        return Some(ip.to_string());
    }
    if let Some(first) = header_value("x-forwarded-for")
        .and_then(|list| list.split(',').map(str::trim).find(|hop| !hop.is_empty()))
    {
        return Some(first.to_string());
    }
    peer.map(|addr| addr.ip().to_string())
}

/// Insert one `key=value` pair. `key[]` pairs accumulate into an array.
fn insert_pair(params: &mut Params, key: String, value: String) {
    if let Some(base) = key.strip_suffix("[]") {
        let entry = params
            .entry(base.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = entry {
            items.push(Value::String(value));
        } else {
            *entry = Value::Array(vec![Value::String(value)]);
        }
    } else {
        params.insert(key, Value::String(value));
    }
}

fn parse_form(raw: &str, params: &mut Params) -> Result<(), LivedeskError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw)
        .map_err(|e| LivedeskError::Validation(format!("malformed form data: {e}")))?;
    for (key, value) in pairs {
        insert_pair(params, key, value);
    }
    Ok(())
}

/// Merge query parameters with body parameters; the body wins.
pub fn merge_params(
    query: Option<&str>,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Params, LivedeskError> {
    let mut params = Params::new();
    if let Some(query) = query {
        parse_form(query, &mut params)?;
    }

    let body = std::str::from_utf8(body)
        .map_err(|_| LivedeskError::Validation("request body is not UTF-8".to_string()))?
        .trim();
    if body.is_empty() {
        return Ok(params);
    }

    let is_json = content_type.is_some_and(|ct| ct.contains("json"));
    let is_form = content_type.is_some_and(|ct| ct.contains("x-www-form-urlencoded"));
    if is_json || (!is_form && body.starts_with('{')) {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(fields)) => params.extend(fields),
            Ok(_) => {
                return Err(LivedeskError::Validation(
                    "request body must be a JSON object".to_string(),
                ));
            }
            Err(e) => {
                return Err(LivedeskError::Validation(format!("malformed JSON body: {e}")));
            }
        }
    } else {
        parse_form(body, &mut params)?;
    }
    Ok(params)
}

async fn widget_request(
    state: &GatewayState,
    request: Request,
) -> Result<Value, LivedeskError> {
    let (parts, body) = request.into_parts();
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| LivedeskError::Validation(format!("unreadable request body: {e}")))?;

    let params = merge_params(parts.uri.query(), content_type, &body)?;
    let action = Action::parse(param_str(&params, "action").as_deref())?;
    let widget_key = param_str(&params, WIDGET_KEY_PARAM).unwrap_or_default();
    let relay_request =
        RelayRequest::from_params(action, &params, client_address(&parts.headers, peer))?;

    let response = state.relay.dispatch(&widget_key, relay_request).await?;
    Ok(response.to_json())
}

/// GET|POST /widget/api (and /widget/api.php)
pub async fn widget_api(State(state): State<GatewayState>, request: Request) -> Response {
    match widget_request(&state, request).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

/// GET /health
///
/// Unauthenticated. Reports 503 when storage is not healthy.
pub async fn get_public_health(State(state): State<GatewayState>) -> Response {
    let (status_code, status) = match state.relay.store().health_check().await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "ok".to_string()),
        Ok(HealthStatus::Degraded(reason)) => (StatusCode::OK, format!("degraded: {reason}")),
        Ok(HealthStatus::Unhealthy(reason)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("unhealthy: {reason}"),
        ),
        Err(e) => {
            tracing::error!(error = %e, "storage health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy".to_string())
        }
    };
    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    };
    (status_code, Json(body)).into_response()
}

/// GET /metrics
///
/// Prometheus text exposition, or 404 when metrics are disabled.
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError(LivedeskError::Validation(format!("malformed JSON body: {e}"))))
}

/// POST /v1/agent/heartbeat
pub async fn agent_heartbeat(
    State(state): State<GatewayState>,
    Extension(tenant): Extension<Tenant>,
) -> Result<Json<Value>, ApiError> {
    let beat = state.relay.agent_heartbeat(&tenant).await?;
    Ok(Json(json!({ "success": true, "online": beat.online })))
}

/// GET /v1/agent/visitors
pub async fn agent_visitors(
    State(state): State<GatewayState>,
    Extension(tenant): Extension<Tenant>,
) -> Result<Json<Value>, ApiError> {
    let inbox = state.relay.agent_inbox(&tenant).await?;
    Ok(Json(json!({ "success": true, "visitors": inbox.visitors })))
}

/// GET /v1/agent/visitors/{visitor_id}/messages?since=
pub async fn agent_messages(
    State(state): State<GatewayState>,
    Extension(tenant): Extension<Tenant>,
    Path(visitor_id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, ApiError> {
    let query: SinceQuery = match query.as_deref() {
        Some(raw) => serde_urlencoded::from_str(raw).map_err(|e| {
            ApiError(LivedeskError::Validation(format!("invalid query: {e}")))
        })?,
        None => SinceQuery::default(),
    };
    let since = query.since.filter(|id| *id > 0).map(MessageId);
    let messages = state
        .relay
        .agent_messages(&tenant, &VisitorId(visitor_id), since)
        .await?;
    Ok(Json(json!({ "success": true, "messages": messages })))
}

/// POST /v1/agent/visitors/{visitor_id}/messages
pub async fn agent_send(
    State(state): State<GatewayState>,
    Extension(tenant): Extension<Tenant>,
    Path(visitor_id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: AgentMessageBody = json_body(&body)?;
    let message = state
        .relay
        .agent_send(&tenant, &VisitorId(visitor_id), &body.message)
        .await?;
    Ok(Json(json!({ "success": true, "message": message })))
}

/// POST /v1/agent/visitors/{visitor_id}/read
pub async fn agent_mark_read(
    State(state): State<GatewayState>,
    Extension(tenant): Extension<Tenant>,
    Path(visitor_id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: AgentReadBody = json_body(&body)?;
    let ids: Vec<MessageId> = body.message_ids.into_iter().map(MessageId).collect();
    let updated = state
        .relay
        .agent_mark_read(&tenant, &VisitorId(visitor_id), &ids)
        .await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_ip_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-client-ip", HeaderValue::from_static("10.0.0.1"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.2"));
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(client_address(&headers, Some(peer)).as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn first_forwarded_hop_then_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.2"),
        );
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(
            client_address(&headers, Some(peer)).as_deref(),
            Some("203.0.113.9")
        );
        assert_eq!(
            client_address(&HeaderMap::new(), Some(peer)).as_deref(),
            Some("127.0.0.1")
        );
        assert_eq!(client_address(&HeaderMap::new(), None), None);
    }

    #[test]
    fn body_overrides_query() {
        let params = merge_params(
            Some("action=get_messages&widget_id=k1&since=3"),
            Some("application/json"),
            br#"{"since": 7, "visitor_id": "v_1"}"#,
        )
        .unwrap();
        assert_eq!(params["action"], "get_messages");
        assert_eq!(params["since"], 7);
        assert_eq!(params["visitor_id"], "v_1");
    }

    #[test]
    fn form_bodies_and_bracket_arrays() {
        let params = merge_params(
            Some("action=mark_as_read"),
            Some("application/x-www-form-urlencoded"),
            b"widget_id=k1&visitor_id=v_1&message_ids%5B%5D=4&message_ids%5B%5D=5",
        )
        .unwrap();
        assert_eq!(params["widget_id"], "k1");
        assert_eq!(params["message_ids"], json!(["4", "5"]));
    }

    #[test]
    fn untyped_body_is_sniffed() {
        let json_params = merge_params(None, None, br#"{"action":"get_config"}"#).unwrap();
        assert_eq!(json_params["action"], "get_config");
        let form_params = merge_params(None, None, b"action=get_config").unwrap();
        assert_eq!(form_params["action"], "get_config");
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        let err = merge_params(None, Some("application/json"), b"{not json").unwrap_err();
        assert!(matches!(err, LivedeskError::Validation(_)));
        let err = merge_params(None, Some("application/json"), b"[1,2]").unwrap_err();
        assert!(matches!(err, LivedeskError::Validation(_)));
    }
}
