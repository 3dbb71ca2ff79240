// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message log operations.

use livedesk_core::LivedeskError;
use livedesk_core::types::{
    ChatMessage, MessageId, NewMessage, SenderRole, TenantId, VisitorId, now_timestamp,
};
use rusqlite::params;

use crate::database::Database;
use crate::models::{MESSAGE_COLUMNS, message_from_row};

/// Insert messages in one transaction. Rows get consecutive ids in input order
/// and share one `created_at`, so `(created_at, id)` ordering keeps input order.
pub async fn insert_batch(
    db: &Database,
    tenant: TenantId,
    visitor: &VisitorId,
    messages: &[NewMessage],
) -> Result<Vec<ChatMessage>, LivedeskError> {
    let visitor = visitor.clone();
    let messages = messages.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let created_at = now_timestamp();
            let mut stored = Vec::with_capacity(messages.len());
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO messages (tenant_id, visitor_id, body, sender_role, is_read, created_at)
                     VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                )?;
                for msg in messages {
                    stmt.execute(params![
                        tenant.0,
                        visitor.as_str(),
                        msg.body,
                        msg.sender_role.as_str(),
                        created_at,
                    ])?;
                    stored.push(ChatMessage {
                        id: MessageId(tx.last_insert_rowid()),
                        tenant_id: tenant,
                        visitor_id: visitor.clone(),
                        body: msg.body,
                        sender_role: msg.sender_role,
                        read: false,
                        created_at: created_at.clone(),
                    });
                }
            }
            tx.commit()?;
            Ok(stored)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Messages of one conversation ascending by `(created_at, id)`, after `since` when given.
pub async fn list_since(
    db: &Database,
    tenant: TenantId,
    visitor: &VisitorId,
    since: Option<MessageId>,
) -> Result<Vec<ChatMessage>, LivedeskError> {
    let visitor = visitor.clone();
    let since = since.map_or(0, |id| id.0);
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE tenant_id = ?1 AND visitor_id = ?2 AND id > ?3
                 ORDER BY created_at ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![tenant.0, visitor.as_str(), since], message_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Flag the given messages read on behalf of `reader`.
///
/// Only unread messages sent by the reader's counterpart change; the count
/// of changed rows is returned, so a repeat call returns 0.
pub async fn mark_read(
    db: &Database,
    tenant: TenantId,
    visitor: &VisitorId,
    ids: &[MessageId],
    reader: SenderRole,
) -> Result<usize, LivedeskError> {
    let visitor = visitor.clone();
    let ids = ids.to_vec();
    let sender = reader.counterpart();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut changed = 0;
            {
                let mut stmt = tx.prepare(
                    "UPDATE messages SET is_read = 1
                     WHERE id = ?1 AND tenant_id = ?2 AND visitor_id = ?3
                       AND sender_role = ?4 AND is_read = 0",
                )?;
                for id in ids {
                    changed += stmt.execute(params![id.0, tenant.0, visitor.as_str(), sender.as_str()])?;
                }
            }
            tx.commit()?;
            Ok(changed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Unread messages waiting for `reader` in one conversation.
pub async fn unread_count(
    db: &Database,
    tenant: TenantId,
    visitor: &VisitorId,
    reader: SenderRole,
) -> Result<i64, LivedeskError> {
    let visitor = visitor.clone();
    let sender = reader.counterpart();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE tenant_id = ?1 AND visitor_id = ?2 AND sender_role = ?3 AND is_read = 0",
                params![tenant.0, visitor.as_str(), sender.as_str()],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}
