// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Visitor registry queries.

use livedesk_core::LivedeskError;
use livedesk_core::types::{
    ResolutionStep, TenantId, Visitor, VisitorContact, VisitorId, VisitorResolution,
    VisitorSummary, now_timestamp,
};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{VISITOR_COLUMNS, visitor_from_row};

/// Resolve the visitor behind a contact: remembered id, then client address, then a new row.
///
/// Runs as one closure on the writer thread, so two concurrent first contacts
/// from one address cannot both miss and create.
pub async fn resolve_or_create(
    db: &Database,
    tenant: TenantId,
    contact: &VisitorContact,
) -> Result<VisitorResolution, LivedeskError> {
    let contact = contact.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let now = now_timestamp();

            let mut found: Option<(String, ResolutionStep)> = None;
            if let Some(id) = &contact.client_visitor_id {
                found = tx
                    .query_row(
                        "SELECT id FROM visitors WHERE tenant_id = ?1 AND id = ?2",
                        params![tenant.0, id.as_str()],
                        |row| row.get(0),
                    )
                    .optional()?
                    .map(|id| (id, ResolutionStep::ClientId));
            }
            if found.is_none()
                && let Some(address) = &contact.client_address
            {
                found = tx
                    .query_row(
                        "SELECT id FROM visitors WHERE tenant_id = ?1 AND ip_address = ?2
                         ORDER BY last_active DESC, rowid DESC LIMIT 1",
                        params![tenant.0, address],
                        |row| row.get(0),
                    )
                    .optional()?
                    .map(|id| (id, ResolutionStep::ClientAddress));
            }

            let resolution = match found {
                Some((id, step)) => {
                    tx.execute(
                        "UPDATE visitors SET last_active = ?1, url = COALESCE(?2, url)
                         WHERE tenant_id = ?3 AND id = ?4",
                        params![now, contact.url, tenant.0, id],
                    )?;
                    VisitorResolution {
                        visitor_id: VisitorId(id),
                        step,
                    }
                }
                None => {
                    let id = VisitorId::generate();
                    tx.execute(
                        "INSERT INTO visitors (id, tenant_id, ip_address, user_agent, url, referrer,
                                               created_at, last_active)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                        params![
                            id.as_str(),
                            tenant.0,
                            contact.client_address,
                            contact.user_agent,
                            contact.url,
                            contact.referrer,
                            now,
                        ],
                    )?;
                    VisitorResolution {
                        visitor_id: id,
                        step: ResolutionStep::Created,
                    }
                }
            };
            tx.commit()?;
            Ok(resolution)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Update `last_active` (and `url` when given). Returns whether a row matched.
pub async fn touch(
    db: &Database,
    tenant: TenantId,
    visitor: &VisitorId,
    url: Option<&str>,
) -> Result<bool, LivedeskError> {
    let visitor = visitor.clone();
    let url = url.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE visitors SET last_active = ?1, url = COALESCE(?2, url)
                 WHERE tenant_id = ?3 AND id = ?4",
                params![now_timestamp(), url, tenant.0, visitor.as_str()],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch one visitor.
pub async fn get_visitor(
    db: &Database,
    tenant: TenantId,
    visitor: &VisitorId,
) -> Result<Option<Visitor>, LivedeskError> {
    let visitor = visitor.clone();
    db.connection()
        .call(move |conn| {
            let sql =
                format!("SELECT {VISITOR_COLUMNS} FROM visitors WHERE tenant_id = ?1 AND id = ?2");
            conn.query_row(&sql, params![tenant.0, visitor.as_str()], visitor_from_row)
                .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Append a visitor activity history row.
pub async fn record_activity(
    db: &Database,
    tenant: TenantId,
    visitor: &VisitorId,
    activity: &str,
    url: Option<&str>,
) -> Result<(), LivedeskError> {
    let visitor = visitor.clone();
    let activity = activity.to_string();
    let url = url.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO visitor_activities (tenant_id, visitor_id, activity_type, url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![tenant.0, visitor.as_str(), activity, url, now_timestamp()],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of activity rows recorded for a visitor.
pub async fn activity_count(
    db: &Database,
    tenant: TenantId,
    visitor: &VisitorId,
) -> Result<i64, LivedeskError> {
    let visitor = visitor.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM visitor_activities WHERE tenant_id = ?1 AND visitor_id = ?2",
                params![tenant.0, visitor.as_str()],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Agent inbox: visitors by most recent activity, with message counters.
pub async fn list_visitors(
    db: &Database,
    tenant: TenantId,
) -> Result<Vec<VisitorSummary>, LivedeskError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT v.id, v.tenant_id, v.ip_address, v.user_agent, v.url, v.referrer,
                        v.created_at, v.last_active,
                        COUNT(m.id),
                        COALESCE(SUM(CASE WHEN m.sender_role = 'visitor' AND m.is_read = 0
                                          THEN 1 ELSE 0 END), 0),
                        MAX(m.created_at)
                 FROM visitors v
                 LEFT JOIN messages m ON m.tenant_id = v.tenant_id AND m.visitor_id = v.id
                 WHERE v.tenant_id = ?1
                 GROUP BY v.tenant_id, v.id
                 ORDER BY v.last_active DESC, v.rowid DESC",
            )?;
            let rows = stmt.query_map(params![tenant.0], |row| {
                Ok(VisitorSummary {
                    visitor: visitor_from_row(row)?,
                    total_messages: row.get(8)?,
                    unread_messages: row.get(9)?,
                    last_message_at: row.get(10)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
