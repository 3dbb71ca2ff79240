// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay behaviour against a real SQLite store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use livedesk_config::model::{RelayConfig, StorageConfig};
use livedesk_core::types::{
    AdapterType, HealthStatus, MessageId, MetricEvent, NewTenant, SenderRole, Tenant,
    VisitorContact, VisitorId, WidgetPosition, WidgetSettings,
};
use livedesk_core::{
    LivedeskError, ObservabilityAdapter, PluginAdapter, StorageAdapter, TenantDirectory,
};
use livedesk_relay::{Action, RelayRequest, RelayResponse, RelayService};
use livedesk_storage::SqliteStorage;
use serde_json::json;
use tempfile::TempDir;

struct Fixture {
    relay: RelayService,
    storage: Arc<SqliteStorage>,
    tenant: Tenant,
    events: Arc<Mutex<Vec<MetricEvent>>>,
    _dir: TempDir,
}

#[derive(Default)]
struct RecordingObserver {
    events: Arc<Mutex<Vec<MetricEvent>>>,
}

#[async_trait]
impl PluginAdapter for RecordingObserver {
    fn name(&self) -> &str {
        "recording"
    }
    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }
    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }
    async fn health_check(&self) -> Result<HealthStatus, LivedeskError> {
        Ok(HealthStatus::Healthy)
    }
    async fn shutdown(&self) -> Result<(), LivedeskError> {
        Ok(())
    }
}

#[async_trait]
impl ObservabilityAdapter for RecordingObserver {
    async fn record(&self, event: MetricEvent) -> Result<(), LivedeskError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(SqliteStorage::new(StorageConfig {
        database_path: dir.path().join("relay.db").to_string_lossy().into_owned(),
        wal_mode: true,
    }));
    storage.initialize().await.unwrap();
    let tenant = storage
        .create_tenant(&NewTenant {
            name: "k1".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let observer = RecordingObserver::default();
    let events = observer.events.clone();
    let relay = RelayService::new(storage.clone(), RelayConfig::default(), "https://relay.test")
        .with_observer(Arc::new(observer));
    Fixture {
        relay,
        storage,
        tenant,
        events,
        _dir: dir,
    }
}

fn contact(visitor: Option<&VisitorId>) -> VisitorContact {
    VisitorContact {
        client_visitor_id: visitor.cloned(),
        client_address: Some("203.0.113.7".into()),
        user_agent: Some("test-agent".into()),
        url: Some("https://shop.test/".into()),
        referrer: None,
    }
}

#[tokio::test]
async fn offline_send_then_get_returns_message_and_auto_reply() {
    let f = fixture().await;
    let key = f.tenant.widget_key.as_str();

    let sent = f.relay.send_message(key, "hello", &contact(None)).await.unwrap();
    assert!(!sent.created_at.is_empty());
    let reply = sent.reply.clone().expect("offline tenant gets an auto-reply");
    assert_eq!(reply, RelayConfig::default().default_auto_reply);
    assert_eq!(sent.reply_id, Some(MessageId(sent.message_id.0 + 1)));

    let got = f
        .relay
        .get_messages(key, &sent.visitor_id, None)
        .await
        .unwrap();
    assert!(!got.agent_online);
    assert_eq!(got.messages.len(), 2);
    assert_eq!(got.messages[0].body, "hello");
    assert_eq!(got.messages[0].sender_role, SenderRole::Visitor);
    assert_eq!(got.messages[1].body, reply);
    assert_eq!(got.messages[1].sender_role, SenderRole::Agent);
}

#[tokio::test]
async fn online_tenant_gets_no_auto_reply() {
    let f = fixture().await;
    f.storage.record_heartbeat(f.tenant.id).await.unwrap();

    let sent = f
        .relay
        .send_message(&f.tenant.widget_key, "anyone there?", &contact(None))
        .await
        .unwrap();
    assert!(sent.reply.is_none());
    assert!(sent.reply_id.is_none());

    let got = f
        .relay
        .get_messages(&f.tenant.widget_key, &sent.visitor_id, None)
        .await
        .unwrap();
    assert!(got.agent_online);
    assert_eq!(got.messages.len(), 1);
}

#[tokio::test]
async fn tenant_offline_message_is_used_as_auto_reply() {
    let f = fixture().await;
    f.storage
        .upsert_settings(
            f.tenant.id,
            &WidgetSettings {
                offline_message: Some("Back at 9am".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let sent = f
        .relay
        .send_message(&f.tenant.widget_key, "hi", &contact(None))
        .await
        .unwrap();
    assert_eq!(sent.reply.as_deref(), Some("Back at 9am"));
}

#[tokio::test]
async fn bodies_are_trimmed_and_bounded() {
    let f = fixture().await;
    let key = f.tenant.widget_key.as_str();

    let blank = f.relay.send_message(key, "   \n", &contact(None)).await;
    assert!(matches!(blank, Err(LivedeskError::Validation(_))));

    let long = "x".repeat(RelayConfig::default().max_message_len + 1);
    let too_long = f.relay.send_message(key, &long, &contact(None)).await;
    assert!(matches!(too_long, Err(LivedeskError::Validation(_))));

    let sent = f.relay.send_message(key, "  padded  ", &contact(None)).await.unwrap();
    let got = f.relay.get_messages(key, &sent.visitor_id, None).await.unwrap();
    assert_eq!(got.messages[0].body, "padded");
}

#[tokio::test]
async fn since_cursor_never_overlaps() {
    let f = fixture().await;
    f.storage.record_heartbeat(f.tenant.id).await.unwrap();
    let key = f.tenant.widget_key.as_str();

    let first = f.relay.send_message(key, "one", &contact(None)).await.unwrap();
    let visitor = first.visitor_id.clone();
    f.relay.send_message(key, "two", &contact(Some(&visitor))).await.unwrap();

    let page1 = f.relay.get_messages(key, &visitor, None).await.unwrap();
    let latest = page1.messages.last().unwrap().id;

    f.relay.send_message(key, "three", &contact(Some(&visitor))).await.unwrap();
    let page2 = f.relay.get_messages(key, &visitor, Some(latest)).await.unwrap();

    assert_eq!(page2.messages.len(), 1);
    assert_eq!(page2.messages[0].body, "three");
    assert!(page1.messages.iter().all(|m| m.id < page2.messages[0].id));
}

#[tokio::test]
async fn concurrent_sends_are_all_stored_in_total_order() {
    let f = fixture().await;
    f.storage.record_heartbeat(f.tenant.id).await.unwrap();
    let relay = Arc::new(f.relay);
    let key = f.tenant.widget_key.clone();
    let visitor = relay
        .register_visitor(&key, &contact(None))
        .await
        .unwrap()
        .visitor_id;

    let mut handles = Vec::new();
    for i in 0..20 {
        let relay = relay.clone();
        let key = key.clone();
        let visitor = visitor.clone();
        handles.push(tokio::spawn(async move {
            relay
                .send_message(&key, &format!("msg {i}"), &contact(Some(&visitor)))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let got = relay.get_messages(&key, &visitor, None).await.unwrap();
    assert_eq!(got.messages.len(), 20);
    assert!(got.messages.windows(2).all(|w| w[0].id < w[1].id));
}

#[tokio::test]
async fn register_is_deterministic_for_a_known_client_id() {
    let f = fixture().await;
    let key = f.tenant.widget_key.as_str();
    let first = f.relay.register_visitor(key, &contact(None)).await.unwrap();

    let mut elsewhere = contact(Some(&first.visitor_id));
    elsewhere.client_address = Some("198.51.100.1".into());
    let again = f.relay.register_visitor(key, &elsewhere).await.unwrap();
    assert_eq!(first.visitor_id, again.visitor_id);

    let created = f
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, MetricEvent::VisitorCreated))
        .count();
    assert_eq!(created, 1);
}

#[tokio::test]
async fn mark_as_read_is_idempotent_and_role_scoped() {
    let f = fixture().await;
    let key = f.tenant.widget_key.as_str();
    let sent = f.relay.send_message(key, "hello", &contact(None)).await.unwrap();
    let reply_id = sent.reply_id.unwrap();
    let ids = [sent.message_id, reply_id];

    // Only the agent's auto-reply is readable by the visitor.
    let first = f.relay.mark_as_read(key, &sent.visitor_id, &ids).await.unwrap();
    assert_eq!(first.updated, 1);
    let second = f.relay.mark_as_read(key, &sent.visitor_id, &ids).await.unwrap();
    assert_eq!(second.updated, 0);

    let got = f.relay.get_messages(key, &sent.visitor_id, None).await.unwrap();
    assert!(!got.messages[0].read);
    assert!(got.messages[1].read);

    let empty = f.relay.mark_as_read(key, &sent.visitor_id, &[]).await;
    assert!(matches!(empty, Err(LivedeskError::Validation(_))));
}

#[tokio::test]
async fn update_activity_touches_known_visitors_only() {
    let f = fixture().await;
    let key = f.tenant.widget_key.as_str();
    let visitor = f
        .relay
        .register_visitor(key, &contact(None))
        .await
        .unwrap()
        .visitor_id;

    let hit = f
        .relay
        .update_activity(key, &visitor, Some("scroll"), Some("https://shop.test/cart"))
        .await
        .unwrap();
    assert!(hit.touched);
    assert_eq!(f.storage.activity_count(f.tenant.id, &visitor).await.unwrap(), 1);

    let ghost = VisitorId("v_ghost".into());
    let miss = f.relay.update_activity(key, &ghost, None, None).await.unwrap();
    assert!(!miss.touched);
    assert_eq!(f.storage.activity_count(f.tenant.id, &ghost).await.unwrap(), 0);

    let bogus = f.relay.update_activity("bogus", &visitor, None, None).await;
    assert!(matches!(bogus, Err(LivedeskError::Unauthorized(_))));
    assert_eq!(f.storage.activity_count(f.tenant.id, &visitor).await.unwrap(), 1);
}

#[tokio::test]
async fn get_messages_for_unknown_visitor_is_not_found() {
    let f = fixture().await;
    let result = f
        .relay
        .get_messages(&f.tenant.widget_key, &VisitorId("v_nobody".into()), None)
        .await;
    assert!(matches!(result, Err(LivedeskError::NotFound { kind: "visitor", .. })));
}

#[tokio::test]
async fn bogus_key_fails_every_action() {
    let f = fixture().await;
    let params = json!({
        "visitor_id": "v_x",
        "message": "hi",
        "message_ids": [1],
    });
    let params = params.as_object().unwrap();
    for action in [
        Action::GetConfig,
        Action::RegisterVisitor,
        Action::SendMessage,
        Action::GetMessages,
        Action::MarkAsRead,
        Action::UpdateActivity,
    ] {
        let request = RelayRequest::from_params(action, params, None).unwrap();
        let result = f.relay.dispatch("bogus", request).await;
        assert!(
            matches!(result, Err(LivedeskError::Unauthorized(_))),
            "{action} accepted a bogus key"
        );
    }
}

#[tokio::test]
async fn dispatch_records_request_outcomes() {
    let f = fixture().await;
    let ok = f
        .relay
        .dispatch(&f.tenant.widget_key, RelayRequest::GetConfig)
        .await
        .unwrap();
    let body = ok.to_json();
    assert_eq!(body["success"], true);
    assert_eq!(body["config"]["siteUrl"], "https://relay.test");
    assert!(matches!(ok, RelayResponse::Config(_)));

    let _ = f.relay.dispatch("bogus", RelayRequest::GetConfig).await;

    let events = f.events.lock().unwrap();
    let outcomes: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            MetricEvent::Request {
                action, outcome, ..
            } => Some((*action, outcome.to_string())),
            _ => None,
        })
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("get_config", "ok".to_string()),
            ("get_config", "unauthorized".to_string()),
        ]
    );
}

#[tokio::test]
async fn config_reflects_active_subscription_settings() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(SqliteStorage::new(StorageConfig {
        database_path: dir.path().join("cfg.db").to_string_lossy().into_owned(),
        wal_mode: true,
    }));
    storage.initialize().await.unwrap();
    let tenant = storage
        .create_tenant(&NewTenant {
            name: "paid".into(),
            subscription_status: Some("active".into()),
            subscription_expiry: Some("2999-01-01T00:00:00.000Z".into()),
        })
        .await
        .unwrap();
    storage
        .upsert_settings(
            tenant.id,
            &WidgetSettings {
                theme_color: Some("#112233".into()),
                position: WidgetPosition::BottomLeft,
                welcome_message: Some("Hi from paid".into()),
                offline_message: None,
                auto_popup: true,
                show_branding: false,
            },
        )
        .await
        .unwrap();

    let relay = RelayService::new(storage, RelayConfig::default(), "https://relay.test");
    let config = relay.get_config(&tenant.widget_key).await.unwrap().config;
    assert_eq!(config.position, "bottom-left");
    assert_eq!(config.primary_color, "#112233");
    assert_eq!(config.greeting_message, "Hi from paid");
    assert_eq!(config.offline_message, RelayConfig::default().default_offline_message);
    assert!(config.auto_open);
    assert!(!config.show_branding);
    assert!(!config.user_online);
}

#[tokio::test]
async fn agent_heartbeat_flips_online_and_replies_reach_the_visitor() {
    let f = fixture().await;
    let key = f.tenant.widget_key.as_str();

    let agent = f.relay.authenticate_agent(&f.tenant.agent_key).await.unwrap();
    assert_eq!(agent.id, f.tenant.id);
    assert!(!f.relay.get_config(key).await.unwrap().config.user_online);

    let beat = f.relay.agent_heartbeat(&agent).await.unwrap();
    assert!(beat.online);
    assert!(f.relay.get_config(key).await.unwrap().config.user_online);

    let sent = f.relay.send_message(key, "help", &contact(None)).await.unwrap();
    assert!(sent.reply.is_none());

    let inbox = f.relay.agent_inbox(&agent).await.unwrap();
    assert_eq!(inbox.visitors.len(), 1);
    assert_eq!(inbox.visitors[0].unread_messages, 1);

    let reply = f
        .relay
        .agent_send(&agent, &sent.visitor_id, "On it")
        .await
        .unwrap();
    assert_eq!(reply.sender_role, SenderRole::Agent);

    let seen = f
        .relay
        .get_messages(key, &sent.visitor_id, Some(sent.message_id))
        .await
        .unwrap();
    assert_eq!(seen.messages.len(), 1);
    assert_eq!(seen.messages[0].body, "On it");
}

#[tokio::test]
async fn agent_cannot_mark_its_own_messages_read() {
    let f = fixture().await;
    let agent = f.relay.authenticate_agent(&f.tenant.agent_key).await.unwrap();
    let sent = f
        .relay
        .send_message(&f.tenant.widget_key, "hello", &contact(None))
        .await
        .unwrap();
    let reply = f
        .relay
        .agent_send(&agent, &sent.visitor_id, "hi there")
        .await
        .unwrap();

    let own = f
        .relay
        .agent_mark_read(&agent, &sent.visitor_id, &[reply.id])
        .await
        .unwrap();
    assert_eq!(own, 0);
    let theirs = f
        .relay
        .agent_mark_read(&agent, &sent.visitor_id, &[sent.message_id])
        .await
        .unwrap();
    assert_eq!(theirs, 1);
}

#[tokio::test]
async fn agent_endpoints_reject_unknown_keys_and_visitors() {
    let f = fixture().await;
    assert!(matches!(
        f.relay.authenticate_agent("nope").await,
        Err(LivedeskError::Unauthorized(_))
    ));
    assert!(matches!(
        f.relay.authenticate_agent(&f.tenant.widget_key).await,
        Err(LivedeskError::Unauthorized(_))
    ));

    let agent = f.relay.authenticate_agent(&f.tenant.agent_key).await.unwrap();
    let missing = f
        .relay
        .agent_send(&agent, &VisitorId("v_missing".into()), "hello")
        .await;
    assert!(matches!(missing, Err(LivedeskError::NotFound { .. })));
}
