// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mappers between SQLite rows and the core domain types.
//!
//! The canonical types live in `livedesk-core::types`; column lists here
//! must match the `SELECT` order used by the query modules.

use std::str::FromStr;

use livedesk_core::types::{
    ChatMessage, MessageId, SenderRole, Tenant, TenantId, Visitor, VisitorId, WidgetPosition,
    WidgetSettings,
};
use rusqlite::Row;
use rusqlite::types::Type;

pub use livedesk_core::types::{NewMessage, NewTenant, VisitorSummary};

pub(crate) const TENANT_COLUMNS: &str = "id, name, widget_key, agent_key, last_activity, \
     subscription_status, subscription_expiry, created_at";

pub(crate) const VISITOR_COLUMNS: &str =
    "id, tenant_id, ip_address, user_agent, url, referrer, created_at, last_active";

pub(crate) const MESSAGE_COLUMNS: &str =
    "id, tenant_id, visitor_id, body, sender_role, is_read, created_at";

pub(crate) fn tenant_from_row(row: &Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        id: TenantId(row.get(0)?),
        name: row.get(1)?,
        widget_key: row.get(2)?,
        agent_key: row.get(3)?,
        last_activity: row.get(4)?,
        subscription_status: row.get(5)?,
        subscription_expiry: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub(crate) fn visitor_from_row(row: &Row<'_>) -> rusqlite::Result<Visitor> {
    Ok(Visitor {
        id: VisitorId(row.get(0)?),
        tenant_id: TenantId(row.get(1)?),
        ip_address: row.get(2)?,
        user_agent: row.get(3)?,
        url: row.get(4)?,
        referrer: row.get(5)?,
        created_at: row.get(6)?,
        last_active: row.get(7)?,
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let role: String = row.get(4)?;
    Ok(ChatMessage {
        id: MessageId(row.get(0)?),
        tenant_id: TenantId(row.get(1)?),
        visitor_id: VisitorId(row.get(2)?),
        body: row.get(3)?,
        sender_role: parse_column(4, &role)?,
        read: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Maps `theme_color, position, welcome_message, offline_message, auto_popup, show_branding`.
pub(crate) fn settings_from_row(row: &Row<'_>) -> rusqlite::Result<WidgetSettings> {
    let position: String = row.get(1)?;
    Ok(WidgetSettings {
        theme_color: row.get(0)?,
        position: parse_column(1, &position)?,
        welcome_message: row.get(2)?,
        offline_message: row.get(3)?,
        auto_popup: row.get(4)?,
        show_branding: row.get(5)?,
    })
}

/// Parse a strum-backed enum stored as TEXT.
fn parse_column<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = strum::ParseError>,
{
    T::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
