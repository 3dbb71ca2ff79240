// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use livedesk_config::model::StorageConfig;
use livedesk_core::types::{
    ChatMessage, MessageId, NewMessage, NewTenant, SenderRole, Tenant, TenantId, Visitor,
    VisitorContact, VisitorId, VisitorResolution, VisitorSummary, WidgetSettings,
};
use livedesk_core::{
    AdapterType, HealthStatus, LivedeskError, MessageStore, PluginAdapter, StorageAdapter,
    TenantDirectory, VisitorRegistry,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, LivedeskError> {
        self.db.get().ok_or_else(|| LivedeskError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    // --- Provisioning (CLI only; not part of the relay traits) ---

    /// Create a tenant with fresh widget and agent keys.
    pub async fn create_tenant(&self, new: &NewTenant) -> Result<Tenant, LivedeskError> {
        let tenant = queries::tenants::create_tenant(self.db()?, new).await?;
        debug!(tenant_id = %tenant.id, name = %tenant.name, "tenant created");
        Ok(tenant)
    }

    pub async fn list_tenants(&self) -> Result<Vec<Tenant>, LivedeskError> {
        queries::tenants::list_tenants(self.db()?).await
    }

    pub async fn get_tenant(&self, id: TenantId) -> Result<Option<Tenant>, LivedeskError> {
        queries::tenants::get_tenant(self.db()?, id).await
    }

    /// Save widget settings; fails with `NotFound` for an unknown tenant.
    pub async fn upsert_settings(
        &self,
        id: TenantId,
        settings: &WidgetSettings,
    ) -> Result<(), LivedeskError> {
        if self.get_tenant(id).await?.is_none() {
            return Err(LivedeskError::NotFound {
                kind: "tenant",
                id: id.to_string(),
            });
        }
        queries::tenants::upsert_settings(self.db()?, id, settings).await
    }

    /// Count of activity rows recorded for a visitor.
    pub async fn activity_count(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
    ) -> Result<i64, LivedeskError> {
        queries::visitors::activity_count(self.db()?, tenant, visitor).await
    }

    async fn checkpoint(&self, db: &Database) -> Result<(), LivedeskError> {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, LivedeskError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LivedeskError> {
        if let Some(db) = self.db.get() {
            self.checkpoint(db).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), LivedeskError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| LivedeskError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), LivedeskError> {
        let db = self.db()?;
        self.checkpoint(db).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl TenantDirectory for SqliteStorage {
    async fn resolve_tenant(&self, widget_key: &str) -> Result<Option<Tenant>, LivedeskError> {
        queries::tenants::get_by_widget_key(self.db()?, widget_key).await
    }

    async fn resolve_agent(&self, agent_key: &str) -> Result<Option<Tenant>, LivedeskError> {
        queries::tenants::get_by_agent_key(self.db()?, agent_key).await
    }

    async fn widget_settings(
        &self,
        tenant: TenantId,
    ) -> Result<Option<WidgetSettings>, LivedeskError> {
        queries::tenants::get_settings(self.db()?, tenant).await
    }

    async fn record_heartbeat(&self, tenant: TenantId) -> Result<(), LivedeskError> {
        queries::tenants::touch_last_activity(self.db()?, tenant).await
    }
}

#[async_trait]
impl VisitorRegistry for SqliteStorage {
    async fn resolve_or_create_visitor(
        &self,
        tenant: TenantId,
        contact: &VisitorContact,
    ) -> Result<VisitorResolution, LivedeskError> {
        let resolution = queries::visitors::resolve_or_create(self.db()?, tenant, contact).await?;
        debug!(
            tenant_id = %tenant,
            visitor_id = %resolution.visitor_id,
            step = %resolution.step,
            "visitor resolved"
        );
        Ok(resolution)
    }

    async fn touch_activity(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
        url: Option<&str>,
    ) -> Result<bool, LivedeskError> {
        queries::visitors::touch(self.db()?, tenant, visitor, url).await
    }

    async fn get_visitor(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
    ) -> Result<Option<Visitor>, LivedeskError> {
        queries::visitors::get_visitor(self.db()?, tenant, visitor).await
    }

    async fn record_activity(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
        activity: &str,
        url: Option<&str>,
    ) -> Result<(), LivedeskError> {
        queries::visitors::record_activity(self.db()?, tenant, visitor, activity, url).await
    }

    async fn list_visitors(&self, tenant: TenantId) -> Result<Vec<VisitorSummary>, LivedeskError> {
        queries::visitors::list_visitors(self.db()?, tenant).await
    }
}

#[async_trait]
impl MessageStore for SqliteStorage {
    async fn append(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
        body: &str,
        role: SenderRole,
    ) -> Result<ChatMessage, LivedeskError> {
        let stored = self
            .append_batch(tenant, visitor, &[NewMessage::new(body, role)])
            .await?;
        stored
            .into_iter()
            .next()
            .ok_or_else(|| LivedeskError::Internal("insert returned no row".to_string()))
    }

    async fn append_batch(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
        messages: &[NewMessage],
    ) -> Result<Vec<ChatMessage>, LivedeskError> {
        queries::messages::insert_batch(self.db()?, tenant, visitor, messages).await
    }

    async fn list_since(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
        since: Option<MessageId>,
    ) -> Result<Vec<ChatMessage>, LivedeskError> {
        queries::messages::list_since(self.db()?, tenant, visitor, since).await
    }

    async fn mark_read(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
        ids: &[MessageId],
        reader: SenderRole,
    ) -> Result<usize, LivedeskError> {
        queries::messages::mark_read(self.db()?, tenant, visitor, ids, reader).await
    }

    async fn unread_count(
        &self,
        tenant: TenantId,
        visitor: &VisitorId,
        reader: SenderRole,
    ) -> Result<i64, LivedeskError> {
        queries::messages::unread_count(self.db()?, tenant, visitor, reader).await
    }
}
