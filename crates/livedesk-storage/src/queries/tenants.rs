// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant directory and widget settings queries.

use livedesk_core::LivedeskError;
use livedesk_core::types::{NewTenant, Tenant, TenantId, WidgetSettings, now_timestamp};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{TENANT_COLUMNS, settings_from_row, tenant_from_row};

/// 16 random bytes, lowercase hex.
pub fn generate_widget_key() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// 32 random bytes, lowercase hex.
pub fn generate_agent_key() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

/// Provision a tenant with freshly generated widget and agent keys.
pub async fn create_tenant(db: &Database, new: &NewTenant) -> Result<Tenant, LivedeskError> {
    let new = new.clone();
    let widget_key = generate_widget_key();
    let agent_key = generate_agent_key();
    db.connection()
        .call(move |conn| {
            let created_at = now_timestamp();
            conn.execute(
                "INSERT INTO tenants (name, widget_key, agent_key, subscription_status,
                                      subscription_expiry, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    new.name,
                    widget_key,
                    agent_key,
                    new.subscription_status,
                    new.subscription_expiry,
                    created_at,
                ],
            )?;
            Ok(Tenant {
                id: TenantId(conn.last_insert_rowid()),
                name: new.name,
                widget_key,
                agent_key,
                last_activity: None,
                subscription_status: new.subscription_status,
                subscription_expiry: new.subscription_expiry,
                created_at,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

async fn get_tenant_where(
    db: &Database,
    column: &'static str,
    value: String,
) -> Result<Option<Tenant>, LivedeskError> {
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE {column} = ?1");
            conn.query_row(&sql, params![value], tenant_from_row)
                .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Look up a tenant by its widget key.
pub async fn get_by_widget_key(
    db: &Database,
    widget_key: &str,
) -> Result<Option<Tenant>, LivedeskError> {
    get_tenant_where(db, "widget_key", widget_key.to_string()).await
}

/// Look up a tenant by its agent API key.
pub async fn get_by_agent_key(
    db: &Database,
    agent_key: &str,
) -> Result<Option<Tenant>, LivedeskError> {
    get_tenant_where(db, "agent_key", agent_key.to_string()).await
}

/// Look up a tenant by id.
pub async fn get_tenant(db: &Database, id: TenantId) -> Result<Option<Tenant>, LivedeskError> {
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = ?1");
            conn.query_row(&sql, params![id.0], tenant_from_row)
                .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All tenants, oldest first.
pub async fn list_tenants(db: &Database) -> Result<Vec<Tenant>, LivedeskError> {
    db.connection()
        .call(|conn| {
            let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants ORDER BY id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], tenant_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Set the tenant's last agent activity to now.
pub async fn touch_last_activity(db: &Database, id: TenantId) -> Result<(), LivedeskError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE tenants SET last_activity = ?1 WHERE id = ?2",
                params![now_timestamp(), id.0],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Saved widget settings for a tenant, if any.
pub async fn get_settings(
    db: &Database,
    id: TenantId,
) -> Result<Option<WidgetSettings>, LivedeskError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT theme_color, position, welcome_message, offline_message,
                        auto_popup, show_branding
                 FROM widget_settings WHERE tenant_id = ?1",
                params![id.0],
                settings_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert or replace a tenant's widget settings.
pub async fn upsert_settings(
    db: &Database,
    id: TenantId,
    settings: &WidgetSettings,
) -> Result<(), LivedeskError> {
    let settings = settings.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO widget_settings (tenant_id, theme_color, position, welcome_message,
                                              offline_message, auto_popup, show_branding, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(tenant_id) DO UPDATE SET
                    theme_color = excluded.theme_color,
                    position = excluded.position,
                    welcome_message = excluded.welcome_message,
                    offline_message = excluded.offline_message,
                    auto_popup = excluded.auto_popup,
                    show_branding = excluded.show_branding,
                    updated_at = excluded.updated_at",
                params![
                    id.0,
                    settings.theme_color,
                    settings.position.to_string(),
                    settings.welcome_message,
                    settings.offline_message,
                    settings.auto_popup,
                    settings.show_branding,
                    now_timestamp(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
