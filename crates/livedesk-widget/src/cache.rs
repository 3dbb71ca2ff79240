// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local message cache.
//!
//! Server messages are keyed by id: merging is idempotent and the order is
//! always `(created_at, id)` regardless of arrival order. Outgoing messages
//! live in the cache without an id until the server confirms them.

use std::path::{Path, PathBuf};

use livedesk_core::LivedeskError;
use livedesk_core::types::{ChatMessage, MessageId, SenderRole, VisitorId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Handle for a message the widget created locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub u64);

/// Delivery state of a cached message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// Sent by this widget, awaiting confirmation.
    Pending,
    /// Stored by the server.
    Sent,
    /// The send failed or timed out; the body is kept for retry.
    Failed,
}

/// One line of the local transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedMessage {
    pub id: Option<MessageId>,
    pub local_id: Option<LocalId>,
    pub body: String,
    pub sender_role: SenderRole,
    pub created_at: Option<String>,
    pub read: bool,
    pub state: DeliveryState,
}

impl From<ChatMessage> for CachedMessage {
    fn from(m: ChatMessage) -> Self {
        Self {
            id: Some(m.id),
            local_id: None,
            body: m.body,
            sender_role: m.sender_role,
            created_at: Some(m.created_at),
            read: m.read,
            state: DeliveryState::Sent,
        }
    }
}

/// The widget's transcript for one widget key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCache {
    messages: Vec<CachedMessage>,
    next_local_id: u64,
    /// Highest id returned by a poll. Ids learned from send responses do
    /// not move it, so unpolled messages below them are still fetched.
    #[serde(default)]
    poll_cursor: Option<MessageId>,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[CachedMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.messages.iter().any(|m| m.id == Some(id))
    }

    /// Highest confirmed server id in the transcript.
    pub fn latest_id(&self) -> Option<MessageId> {
        self.messages.iter().filter_map(|m| m.id).max()
    }

    /// The `since` value for the next poll.
    pub fn poll_cursor(&self) -> Option<MessageId> {
        self.poll_cursor
    }

    /// Merge a poll result and advance the cursor past every id it returned.
    pub fn merge_polled<I>(&mut self, polled: I) -> Vec<CachedMessage>
    where
        I: IntoIterator<Item = CachedMessage>,
    {
        let polled: Vec<CachedMessage> = polled.into_iter().collect();
        if let Some(max) = polled.iter().filter_map(|m| m.id).max() {
            self.poll_cursor = Some(self.poll_cursor.map_or(max, |c| c.max(max)));
        }
        self.merge(polled)
    }

    pub fn get_local(&self, local_id: LocalId) -> Option<&CachedMessage> {
        self.messages.iter().find(|m| m.local_id == Some(local_id))
    }

    /// Merge server messages. Returns the ones that were not cached yet.
    pub fn merge<I>(&mut self, incoming: I) -> Vec<CachedMessage>
    where
        I: IntoIterator<Item = CachedMessage>,
    {
        let mut added = Vec::new();
        for message in incoming {
            let Some(id) = message.id else {
                continue;
            };
            if self.contains(id) {
                continue;
            }
            self.messages.push(message.clone());
            added.push(message);
        }
        if !added.is_empty() {
            self.sort();
        }
        added
    }

    /// Append an outgoing visitor message before it is sent.
    pub fn push_pending(&mut self, body: &str) -> LocalId {
        let local_id = LocalId(self.next_local_id);
        self.next_local_id += 1;
        self.messages.push(CachedMessage {
            id: None,
            local_id: Some(local_id),
            body: body.to_string(),
            sender_role: SenderRole::Visitor,
            created_at: None,
            read: false,
            state: DeliveryState::Pending,
        });
        local_id
    }

    /// Record the server's id for a pending message. If a poll already
    /// delivered that id, the local copy is dropped.
    pub fn confirm(&mut self, local_id: LocalId, id: MessageId, created_at: &str) {
        if self.contains(id) {
            self.messages.retain(|m| m.local_id != Some(local_id));
            return;
        }
        if let Some(entry) = self
            .messages
            .iter_mut()
            .find(|m| m.local_id == Some(local_id))
        {
            entry.id = Some(id);
            entry.created_at = Some(created_at.to_string());
            entry.state = DeliveryState::Sent;
        }
        self.sort();
    }

    /// Mark a pending message failed. Returns false if it is not pending.
    pub fn fail(&mut self, local_id: LocalId) -> bool {
        self.set_state(local_id, DeliveryState::Pending, DeliveryState::Failed)
    }

    /// Move a failed message back to pending and return its body for resending.
    pub fn begin_retry(&mut self, local_id: LocalId) -> Result<String, LivedeskError> {
        if !self.set_state(local_id, DeliveryState::Failed, DeliveryState::Pending) {
            return Err(LivedeskError::NotFound {
                kind: "failed message",
                id: local_id.0.to_string(),
            });
        }
        self.get_local(local_id)
            .map(|m| m.body.clone())
            .ok_or_else(|| LivedeskError::Internal("retried message vanished".to_string()))
    }

    fn set_state(&mut self, local_id: LocalId, from: DeliveryState, to: DeliveryState) -> bool {
        match self
            .messages
            .iter_mut()
            .find(|m| m.local_id == Some(local_id) && m.state == from)
        {
            Some(entry) => {
                entry.state = to;
                true
            }
            None => false,
        }
    }

    /// Ids of agent messages not yet marked read.
    pub fn unread_agent_ids(&self) -> Vec<MessageId> {
        self.messages
            .iter()
            .filter(|m| m.sender_role == SenderRole::Agent && !m.read)
            .filter_map(|m| m.id)
            .collect()
    }

    pub fn mark_read(&mut self, ids: &[MessageId]) {
        for m in &mut self.messages {
            if m.id.is_some_and(|id| ids.contains(&id)) {
                m.read = true;
            }
        }
    }

    /// Messages left pending by a previous run cannot complete; make them retryable.
    fn fail_stale_pending(&mut self) {
        for m in &mut self.messages {
            if m.state == DeliveryState::Pending {
                m.state = DeliveryState::Failed;
            }
        }
    }

    /// Confirmed messages by `(created_at, id)`; unconfirmed ones after, in creation order.
    fn sort(&mut self) {
        self.messages.sort_by(|a, b| match (a.id, b.id) {
            (Some(x), Some(y)) => (&a.created_at, x).cmp(&(&b.created_at, y)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.local_id.cmp(&b.local_id),
        });
    }
}

/// Files backing the cache: `livedesk_messages_<key>.json` and
/// `livedesk_visitor_<key>` in the cache directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    messages_path: PathBuf,
    visitor_path: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl AsRef<Path>, widget_key: &str) -> Self {
        let dir = dir.as_ref();
        let key = sanitize_key(widget_key);
        Self {
            messages_path: dir.join(format!("livedesk_messages_{key}.json")),
            visitor_path: dir.join(format!("livedesk_visitor_{key}")),
        }
    }

    pub fn messages_path(&self) -> &Path {
        &self.messages_path
    }

    /// Load the cache. A missing or unreadable file yields an empty cache.
    pub async fn load_messages(&self) -> MessageCache {
        let raw = match tokio::fs::read(&self.messages_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return MessageCache::new(),
            Err(e) => {
                warn!(path = %self.messages_path.display(), error = %e, "cannot read message cache");
                return MessageCache::new();
            }
        };
        match serde_json::from_slice::<MessageCache>(&raw) {
            Ok(mut cache) => {
                cache.fail_stale_pending();
                debug!(count = cache.len(), "message cache loaded");
                cache
            }
            Err(e) => {
                warn!(path = %self.messages_path.display(), error = %e, "discarding corrupt message cache");
                MessageCache::new()
            }
        }
    }

    pub async fn save_messages(&self, cache: &MessageCache) -> Result<(), LivedeskError> {
        let json = serde_json::to_vec(cache).map_err(|e| LivedeskError::Internal(e.to_string()))?;
        self.write(&self.messages_path, &json).await
    }

    pub async fn load_visitor(&self) -> Option<VisitorId> {
        let raw = tokio::fs::read_to_string(&self.visitor_path).await.ok()?;
        let token = raw.trim();
        (!token.is_empty()).then(|| VisitorId(token.to_string()))
    }

    pub async fn save_visitor(&self, visitor: &VisitorId) -> Result<(), LivedeskError> {
        self.write(&self.visitor_path, visitor.as_str().as_bytes()).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), LivedeskError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(LivedeskError::storage)?;
        }
        tokio::fs::write(path, contents)
            .await
            .map_err(LivedeskError::storage)
    }
}

fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn server(id: i64, created_at: &str, role: SenderRole) -> CachedMessage {
        CachedMessage {
            id: Some(MessageId(id)),
            local_id: None,
            body: format!("m{id}"),
            sender_role: role,
            created_at: Some(created_at.to_string()),
            read: false,
            state: DeliveryState::Sent,
        }
    }

    fn ids(cache: &MessageCache) -> Vec<Option<i64>> {
        cache.messages().iter().map(|m| m.id.map(|id| id.0)).collect()
    }

    #[test]
    fn merge_dedups_and_orders() {
        let mut cache = MessageCache::new();
        let ts = "2026-05-01T10:00:00.000Z";
        let added = cache.merge([server(2, ts, SenderRole::Agent), server(1, ts, SenderRole::Visitor)]);
        assert_eq!(added.len(), 2);
        assert_eq!(ids(&cache), vec![Some(1), Some(2)]);

        let again = cache.merge([server(2, ts, SenderRole::Agent)]);
        assert!(again.is_empty());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.latest_id(), Some(MessageId(2)));
    }

    #[test]
    fn pending_sorts_after_confirmed_until_confirmed() {
        let mut cache = MessageCache::new();
        let local = cache.push_pending("hello");
        cache.merge([server(1, "2026-05-01T10:00:00.000Z", SenderRole::Agent)]);
        assert_eq!(ids(&cache), vec![Some(1), None]);

        cache.confirm(local, MessageId(2), "2026-05-01T10:00:05.000Z");
        assert_eq!(ids(&cache), vec![Some(1), Some(2)]);
        assert_eq!(cache.get_local(local).unwrap().state, DeliveryState::Sent);
    }

    #[test]
    fn confirm_after_poll_delivery_drops_local_copy() {
        let mut cache = MessageCache::new();
        let local = cache.push_pending("m7");
        cache.merge([server(7, "2026-05-01T10:00:00.000Z", SenderRole::Visitor)]);
        cache.confirm(local, MessageId(7), "2026-05-01T10:00:00.000Z");
        assert_eq!(cache.len(), 1);
        assert!(cache.get_local(local).is_none());
    }

    #[test]
    fn only_polled_ids_move_the_cursor() {
        let mut cache = MessageCache::new();
        let local = cache.push_pending("hello");
        cache.confirm(local, MessageId(5), "2026-05-01T10:00:05.000Z");
        cache.merge([server(6, "2026-05-01T10:00:05.000Z", SenderRole::Agent)]);
        assert_eq!(cache.latest_id(), Some(MessageId(6)));
        assert_eq!(cache.poll_cursor(), None);

        let added = cache.merge_polled([
            server(4, "2026-05-01T10:00:04.000Z", SenderRole::Agent),
            server(5, "2026-05-01T10:00:05.000Z", SenderRole::Visitor),
        ]);
        assert_eq!(added.len(), 1);
        assert_eq!(cache.poll_cursor(), Some(MessageId(5)));

        // An empty poll leaves the cursor where it was.
        cache.merge_polled(Vec::new());
        assert_eq!(cache.poll_cursor(), Some(MessageId(5)));
    }

    #[test]
    fn failed_messages_can_be_retried_once_failed() {
        let mut cache = MessageCache::new();
        let local = cache.push_pending("retry me");
        assert!(cache.begin_retry(local).is_err());
        assert!(cache.fail(local));
        assert_eq!(cache.get_local(local).unwrap().state, DeliveryState::Failed);
        assert_eq!(cache.begin_retry(local).unwrap(), "retry me");
        assert_eq!(cache.get_local(local).unwrap().state, DeliveryState::Pending);
        assert!(cache.begin_retry(LocalId(99)).is_err());
    }

    #[test]
    fn unread_tracking() {
        let mut cache = MessageCache::new();
        let ts = "2026-05-01T10:00:00.000Z";
        cache.merge([
            server(1, ts, SenderRole::Visitor),
            server(2, ts, SenderRole::Agent),
            server(3, ts, SenderRole::Agent),
        ]);
        assert_eq!(cache.unread_agent_ids(), vec![MessageId(2), MessageId(3)]);
        cache.mark_read(&[MessageId(2)]);
        assert_eq!(cache.unread_agent_ids(), vec![MessageId(3)]);
    }

    #[tokio::test]
    async fn store_round_trips_and_fails_stale_pending() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("nested"), "wk/1");
        assert!(store.messages_path().ends_with("livedesk_messages_wk_1.json"));
        assert!(store.load_messages().await.is_empty());
        assert!(store.load_visitor().await.is_none());

        let mut cache = MessageCache::new();
        cache.merge_polled([server(1, "2026-05-01T10:00:00.000Z", SenderRole::Agent)]);
        let local = cache.push_pending("in flight");
        store.save_messages(&cache).await.unwrap();
        store.save_visitor(&VisitorId("v_1".into())).await.unwrap();

        let loaded = store.load_messages().await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get_local(local).unwrap().state, DeliveryState::Failed);
        assert_eq!(loaded.poll_cursor(), Some(MessageId(1)));
        assert_eq!(store.load_visitor().await, Some(VisitorId("v_1".into())));
    }

    #[tokio::test]
    async fn corrupt_cache_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path(), "k1");
        tokio::fs::write(store.messages_path(), b"{oops").await.unwrap();
        assert!(store.load_messages().await.is_empty());
    }

    fn arb_message() -> impl Strategy<Value = CachedMessage> {
        // Several ids share a timestamp, so the id tie-break is exercised.
        (1i64..40, any::<bool>()).prop_map(|(id, agent)| {
            let role = if agent { SenderRole::Agent } else { SenderRole::Visitor };
            server(id, &format!("2026-05-01T10:00:{:02}.000Z", id / 4), role)
        })
    }

    proptest! {
        #[test]
        fn merge_is_commutative(batch in prop::collection::vec(arb_message(), 0..30)) {
            let mut forward = MessageCache::new();
            forward.merge(batch.clone());
            let mut reversed = MessageCache::new();
            reversed.merge(batch.iter().rev().cloned());
            prop_assert_eq!(ids(&forward), ids(&reversed));
        }

        #[test]
        fn merge_is_idempotent(batch in prop::collection::vec(arb_message(), 0..30)) {
            let mut cache = MessageCache::new();
            cache.merge(batch.clone());
            let snapshot = ids(&cache);
            let added = cache.merge(batch);
            prop_assert!(added.is_empty());
            prop_assert_eq!(ids(&cache), snapshot);
        }

        #[test]
        fn merged_ids_are_unique_and_sorted(
            first in prop::collection::vec(arb_message(), 0..20),
            second in prop::collection::vec(arb_message(), 0..20),
        ) {
            let mut cache = MessageCache::new();
            cache.merge(first);
            cache.merge(second);
            let keys: Vec<_> = cache
                .messages()
                .iter()
                .map(|m| (m.created_at.clone(), m.id))
                .collect();
            prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
