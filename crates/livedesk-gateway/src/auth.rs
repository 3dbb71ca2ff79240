// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer authentication for the agent API.
//!
//! The token is the tenant's agent key. A resolved [`Tenant`] is attached to
//! the request as an extension for the handlers.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use livedesk_core::LivedeskError;
use livedesk_core::types::Tenant;

use crate::error::ApiError;
use crate::server::GatewayState;

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolves the agent key to a tenant or rejects with 401.
pub async fn agent_auth(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return ApiError(LivedeskError::invalid_agent_key()).into_response();
    };
    let tenant: Tenant = match state.relay.authenticate_agent(token).await {
        Ok(tenant) => tenant,
        Err(e) => return ApiError(e).into_response(),
    };
    tracing::debug!(tenant_id = %tenant.id, "agent authenticated");
    request.extensions_mut().insert(tenant);
    next.run(request).await
}
