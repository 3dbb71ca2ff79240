// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The widget poller: visitor identity, optimistic sends, unread badge, and
//! the fixed-interval polling loop.
//!
//! Network failures never escape as errors from the loop. They are logged,
//! shown as an inline notice, and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use livedesk_config::model::WidgetConfig as ClientConfig;
use livedesk_core::LivedeskError;
use livedesk_core::types::{SenderRole, VisitorId};
use livedesk_relay::WidgetConfig;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{CacheStore, CachedMessage, DeliveryState, LocalId, MessageCache};
use crate::transport::{PageContext, RelayTransport};

/// Prefix of visitor tokens minted locally before the server assigns one.
pub const LOCAL_TOKEN_PREFIX: &str = "visitor_";

const NOTICE_OFFLINE: &str = "Connection problem. Retrying...";
const NOTICE_SEND_FAILED: &str = "Message not sent. Retry?";
const NOTICE_SEND_TIMEOUT: &str = "Message may not have been delivered. Retry?";

fn local_token() -> VisitorId {
    VisitorId(format!("{LOCAL_TOKEN_PREFIX}{}", uuid::Uuid::new_v4().simple()))
}

/// One widget instance.
pub struct Poller {
    transport: Arc<dyn RelayTransport>,
    store: Option<CacheStore>,
    cache: MessageCache,
    visitor: VisitorId,
    page: PageContext,
    poll_interval: Duration,
    hidden_backoff: u32,
    panel_open: bool,
    hidden: bool,
    unread: usize,
    agent_online: bool,
    notice: Option<String>,
}

impl Poller {
    /// In-memory poller with a fresh local visitor token.
    pub fn new(transport: Arc<dyn RelayTransport>, config: &ClientConfig, page: PageContext) -> Self {
        Self {
            transport,
            store: None,
            cache: MessageCache::new(),
            visitor: local_token(),
            page,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            hidden_backoff: config.hidden_backoff.max(1),
            panel_open: false,
            hidden: false,
            unread: 0,
            agent_online: false,
            notice: None,
        }
    }

    /// Poller backed by persisted cache files. A missing token is minted and saved.
    pub async fn with_store(
        transport: Arc<dyn RelayTransport>,
        config: &ClientConfig,
        page: PageContext,
        store: CacheStore,
    ) -> Self {
        let mut poller = Self::new(transport, config, page);
        poller.cache = store.load_messages().await;
        match store.load_visitor().await {
            Some(visitor) => poller.visitor = visitor,
            None => {
                if let Err(e) = store.save_visitor(&poller.visitor).await {
                    warn!(error = %e, "failed to persist visitor token");
                }
            }
        }
        poller.store = Some(store);
        poller
    }

    pub fn visitor(&self) -> &VisitorId {
        &self.visitor
    }

    /// Whether the visitor token was assigned by the server.
    pub fn is_registered(&self) -> bool {
        !self.visitor.as_str().starts_with(LOCAL_TOKEN_PREFIX)
    }

    pub fn messages(&self) -> &[CachedMessage] {
        self.cache.messages()
    }

    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    /// Agent messages received while the panel was closed.
    pub fn unread(&self) -> usize {
        self.unread
    }

    pub fn agent_online(&self) -> bool {
        self.agent_online
    }

    /// Inline notice for the last failure, cleared by the next success.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open
    }

    /// Delay before the next tick.
    pub fn interval(&self) -> Duration {
        if self.hidden {
            self.poll_interval * self.hidden_backoff
        } else {
            self.poll_interval
        }
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    /// Fetch the widget config; also refreshes the online flag.
    pub async fn load_config(&mut self) -> Result<WidgetConfig, LivedeskError> {
        let config = self.transport.get_config().await?;
        self.agent_online = config.user_online;
        Ok(config)
    }

    /// Exchange the local token for a server visitor id.
    pub async fn register(&mut self) -> Result<VisitorId, LivedeskError> {
        let visitor = self
            .transport
            .register_visitor(Some(&self.visitor), &self.page)
            .await?;
        self.adopt_visitor(visitor.clone()).await;
        Ok(visitor)
    }

    async fn adopt_visitor(&mut self, visitor: VisitorId) {
        if visitor == self.visitor {
            return;
        }
        debug!(visitor_id = %visitor, "adopting server visitor id");
        self.visitor = visitor;
        if let Some(store) = &self.store {
            if let Err(e) = store.save_visitor(&self.visitor).await {
                warn!(error = %e, "failed to persist visitor token");
            }
        }
    }

    /// Poll once. Returns the messages that were new to the cache.
    pub async fn tick(&mut self) -> Vec<CachedMessage> {
        if !self.is_registered() {
            return Vec::new();
        }
        let since = self.cache.poll_cursor();
        let response = match self.transport.get_messages(&self.visitor, since).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "poll failed; retrying next tick");
                self.notice = Some(NOTICE_OFFLINE.to_string());
                return Vec::new();
            }
        };
        self.agent_online = response.agent_online;
        self.notice = None;
        let added = self
            .cache
            .merge_polled(response.messages.into_iter().map(CachedMessage::from));
        if !added.is_empty() {
            self.count_unread(&added);
            self.persist().await;
        }
        added
    }

    fn count_unread(&mut self, added: &[CachedMessage]) {
        if self.panel_open {
            return;
        }
        self.unread += added
            .iter()
            .filter(|m| m.sender_role == SenderRole::Agent && !m.read)
            .count();
    }

    /// Send a message. It is cached immediately; delivery failures leave it
    /// [`DeliveryState::Failed`] for [`Poller::retry`]. Only an empty body is an error.
    pub async fn send(&mut self, body: &str) -> Result<LocalId, LivedeskError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(LivedeskError::Validation("message is required".to_string()));
        }
        let local_id = self.cache.push_pending(body);
        self.persist().await;
        self.deliver(local_id, body.to_string()).await;
        Ok(local_id)
    }

    /// Resend a failed message.
    pub async fn retry(&mut self, local_id: LocalId) -> Result<DeliveryState, LivedeskError> {
        let body = self.cache.begin_retry(local_id)?;
        self.deliver(local_id, body).await;
        Ok(self
            .cache
            .get_local(local_id)
            .map(|m| m.state)
            .unwrap_or(DeliveryState::Sent))
    }

    async fn deliver(&mut self, local_id: LocalId, body: String) {
        let result = self
            .transport
            .send_message(Some(&self.visitor), &body, &self.page)
            .await;
        match result {
            Ok(sent) => {
                self.cache.confirm(local_id, sent.message_id, &sent.created_at);
                if let (Some(reply), Some(reply_id)) = (sent.reply, sent.reply_id) {
                    let added = self.cache.merge([CachedMessage {
                        id: Some(reply_id),
                        local_id: None,
                        body: reply,
                        sender_role: SenderRole::Agent,
                        created_at: Some(sent.created_at.clone()),
                        read: false,
                        state: DeliveryState::Sent,
                    }]);
                    self.count_unread(&added);
                }
                self.notice = None;
                self.adopt_visitor(sent.visitor_id).await;
            }
            Err(e) => {
                warn!(error = %e, local_id = local_id.0, "send failed");
                self.cache.fail(local_id);
                self.notice = Some(
                    if matches!(e, LivedeskError::Timeout { .. }) {
                        NOTICE_SEND_TIMEOUT
                    } else {
                        NOTICE_SEND_FAILED
                    }
                    .to_string(),
                );
            }
        }
        self.persist().await;
    }

    /// Open the chat panel: clears the badge and marks agent messages read.
    pub async fn open_panel(&mut self) {
        self.panel_open = true;
        self.unread = 0;
        if !self.is_registered() {
            return;
        }
        let ids = self.cache.unread_agent_ids();
        if ids.is_empty() {
            return;
        }
        match self.transport.mark_as_read(&self.visitor, &ids).await {
            Ok(updated) => {
                debug!(updated, "agent messages marked read");
                self.cache.mark_read(&ids);
                self.persist().await;
            }
            Err(e) => warn!(error = %e, "mark_as_read failed"),
        }
    }

    pub fn close_panel(&mut self) {
        self.panel_open = false;
    }

    /// Best-effort activity ping.
    pub async fn heartbeat(&self, activity: &str) {
        if !self.is_registered() {
            return;
        }
        match self
            .transport
            .update_activity(&self.visitor, activity, self.page.url.as_deref())
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!(visitor_id = %self.visitor, "heartbeat for unknown visitor"),
            Err(e) => warn!(error = %e, "heartbeat failed"),
        }
    }

    async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save_messages(&self.cache).await {
            warn!(error = %e, "failed to persist message cache");
        }
    }
}

/// Poll on the poller's interval until `cancel` fires, forwarding new messages.
///
/// Stops early if the receiver is dropped. A request in flight when the
/// token fires completes first.
pub async fn poll_loop(
    poller: Arc<Mutex<Poller>>,
    cancel: CancellationToken,
    updates: mpsc::Sender<Vec<CachedMessage>>,
) {
    loop {
        let interval = poller.lock().await.interval();
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("poll loop cancelled");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
        let added = poller.lock().await.tick().await;
        if !added.is_empty() && updates.send(added).await.is_err() {
            debug!("update receiver dropped; stopping poll loop");
            break;
        }
    }
}
