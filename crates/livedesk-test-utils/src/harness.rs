// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end relay testing.
//!
//! `TestHarness` assembles SQLite storage in a temp directory, seeded
//! tenants, a [`RelayService`] with a recording observer, and the gateway
//! router. Requests can be driven in-process or over a real socket.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use livedesk_config::model::{RelayConfig, ServerConfig, StorageConfig};
use livedesk_core::types::{NewTenant, Tenant, WidgetSettings};
use livedesk_core::{LivedeskError, PluginAdapter, StorageAdapter, TenantDirectory};
use livedesk_gateway::{Gateway, GatewayState, HealthState, build_router};
use livedesk_relay::RelayService;
use livedesk_storage::SqliteStorage;
use serde_json::Value;
use tower::ServiceExt;

use crate::recording::RecordingObserver;

struct TenantSeed {
    tenant: NewTenant,
    settings: Option<WidgetSettings>,
    online: bool,
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    tenants: Vec<TenantSeed>,
    relay: RelayConfig,
    public_url: String,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            tenants: Vec::new(),
            relay: RelayConfig::default(),
            public_url: "http://127.0.0.1:3000".to_string(),
        }
    }

    /// Seed a tenant with no subscription and no agent activity.
    pub fn with_tenant(self, name: &str) -> Self {
        self.with_tenant_seed(
            NewTenant {
                name: name.to_string(),
                ..Default::default()
            },
            None,
            false,
        )
    }

    /// Seed a tenant whose agent has just sent a heartbeat.
    pub fn with_online_tenant(self, name: &str) -> Self {
        self.with_tenant_seed(
            NewTenant {
                name: name.to_string(),
                ..Default::default()
            },
            None,
            true,
        )
    }

    /// Seed a tenant with an active subscription and saved widget settings.
    pub fn with_subscribed_tenant(self, name: &str, settings: WidgetSettings) -> Self {
        self.with_tenant_seed(
            NewTenant {
                name: name.to_string(),
                subscription_status: Some("active".to_string()),
                subscription_expiry: Some("2999-12-31T00:00:00.000Z".to_string()),
            },
            Some(settings),
            false,
        )
    }

    fn with_tenant_seed(
        mut self,
        tenant: NewTenant,
        settings: Option<WidgetSettings>,
        online: bool,
    ) -> Self {
        self.tenants.push(TenantSeed {
            tenant,
            settings,
            online,
        });
        self
    }

    /// Override relay tunables (online window, message limit, default texts).
    pub fn with_relay_config(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }

    /// Build the harness, creating storage and seeding tenants.
    pub async fn build(self) -> Result<TestHarness, LivedeskError> {
        let temp_dir = tempfile::TempDir::new().map_err(LivedeskError::storage)?;
        let db_path = temp_dir.path().join("test.db");

        let storage = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            wal_mode: true,
        }));
        storage.initialize().await?;

        let mut tenants = Vec::with_capacity(self.tenants.len());
        for seed in self.tenants {
            let tenant = storage.create_tenant(&seed.tenant).await?;
            if let Some(settings) = &seed.settings {
                storage.upsert_settings(tenant.id, settings).await?;
            }
            if seed.online {
                storage.record_heartbeat(tenant.id).await?;
            }
            tenants.push(tenant);
        }

        let observer = RecordingObserver::new();
        let relay = Arc::new(
            RelayService::new(storage.clone(), self.relay, self.public_url)
                .with_observer(Arc::new(observer.clone())),
        );

        Ok(TestHarness {
            storage,
            relay,
            observer,
            tenants,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete relay stack over a temporary database.
pub struct TestHarness {
    pub storage: Arc<SqliteStorage>,
    pub relay: Arc<RelayService>,
    pub observer: RecordingObserver,
    tenants: Vec<Tenant>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A seeded tenant by name.
    ///
    /// # Panics
    /// If no tenant with that name was seeded.
    pub fn tenant(&self, name: &str) -> &Tenant {
        self.tenants
            .iter()
            .find(|t| t.name == name)
            .unwrap_or_else(|| panic!("no seeded tenant named {name}"))
    }

    /// The gateway router over this harness's relay, without metrics.
    pub fn router(&self) -> Router {
        build_router(GatewayState {
            relay: self.relay.clone(),
            health: HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render: None,
            },
        })
    }

    /// POST a JSON body to `/widget/api` in-process.
    pub async fn widget_call(&self, body: Value) -> (StatusCode, Value) {
        let request = Request::post("/widget/api")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap_or_else(|e| panic!("invalid test request: {e}"));
        let response = self
            .router()
            .oneshot(request)
            .await
            .unwrap_or_else(|e| panic!("router failed: {e}"));
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_else(|e| panic!("unreadable body: {e}"));
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// Start the gateway on an ephemeral localhost port.
    pub async fn spawn_server(&self) -> Result<RunningServer, LivedeskError> {
        let gateway = Gateway::new(
            ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                ..ServerConfig::default()
            },
            self.relay.clone(),
            None,
        );
        let addr = gateway.start().await?;
        Ok(RunningServer { gateway, addr })
    }
}

/// A gateway listening on a real socket.
pub struct RunningServer {
    gateway: Gateway,
    addr: SocketAddr,
}

impl RunningServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn stop(self) -> Result<(), LivedeskError> {
        self.gateway.shutdown().await
    }
}
