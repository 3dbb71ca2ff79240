// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `livedesk tenant` provisioning commands.

use clap::{Args, Subcommand};
use livedesk_config::model::LivedeskConfig;
use livedesk_core::types::format_timestamp;
use livedesk_core::{
    LivedeskError, NewTenant, StorageAdapter, Tenant, TenantDirectory, TenantId, WidgetPosition,
    WidgetSettings,
};
use livedesk_storage::SqliteStorage;

#[derive(Subcommand, Debug)]
pub enum TenantCommand {
    /// Create a tenant and print its widget and agent keys.
    Add {
        name: String,
        /// Mark the subscription active for this many days.
        #[arg(long)]
        subscription_days: Option<u32>,
    },
    /// List tenants.
    List,
    /// Update widget settings for a tenant.
    Settings(SettingsArgs),
}

#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// Tenant id as printed by `tenant add`.
    pub id: i64,
    #[arg(long)]
    pub theme_color: Option<String>,
    /// bottom_right, bottom_left, top_right or top_left.
    #[arg(long)]
    pub position: Option<WidgetPosition>,
    #[arg(long)]
    pub welcome_message: Option<String>,
    #[arg(long)]
    pub offline_message: Option<String>,
    #[arg(long)]
    pub auto_popup: Option<bool>,
    #[arg(long)]
    pub show_branding: Option<bool>,
}

impl SettingsArgs {
    /// Overlays the flags that were given on `base`.
    pub fn apply(&self, mut base: WidgetSettings) -> WidgetSettings {
        if let Some(color) = &self.theme_color {
            base.theme_color = Some(color.clone());
        }
        if let Some(position) = self.position {
            base.position = position;
        }
        if let Some(message) = &self.welcome_message {
            base.welcome_message = Some(message.clone());
        }
        if let Some(message) = &self.offline_message {
            base.offline_message = Some(message.clone());
        }
        if let Some(auto_popup) = self.auto_popup {
            base.auto_popup = auto_popup;
        }
        if let Some(show_branding) = self.show_branding {
            base.show_branding = show_branding;
        }
        base
    }
}

/// Builds the provisioning input for `tenant add`.
pub fn new_tenant(name: &str, subscription_days: Option<u32>) -> Result<NewTenant, LivedeskError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LivedeskError::Validation("tenant name is required".to_string()));
    }
    let (subscription_status, subscription_expiry) = match subscription_days {
        Some(days) => (
            Some("active".to_string()),
            Some(format_timestamp(
                chrono::Utc::now() + chrono::Duration::days(i64::from(days)),
            )),
        ),
        None => (None, None),
    };
    Ok(NewTenant {
        name: name.to_string(),
        subscription_status,
        subscription_expiry,
    })
}

pub async fn run_tenant(config: &LivedeskConfig, action: TenantCommand) -> Result<(), LivedeskError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let result = execute(&storage, action).await;
    storage.close().await?;
    result
}

async fn execute(storage: &SqliteStorage, action: TenantCommand) -> Result<(), LivedeskError> {
    match action {
        TenantCommand::Add {
            name,
            subscription_days,
        } => {
            let tenant = storage
                .create_tenant(&new_tenant(&name, subscription_days)?)
                .await?;
            print_tenant(&tenant);
        }
        TenantCommand::List => {
            let tenants = storage.list_tenants().await?;
            if tenants.is_empty() {
                println!("no tenants; create one with `livedesk tenant add <name>`");
            }
            for tenant in &tenants {
                print_tenant(tenant);
            }
        }
        TenantCommand::Settings(args) => {
            let id = TenantId(args.id);
            let current = storage.widget_settings(id).await?.unwrap_or_default();
            let updated = args.apply(current);
            storage.upsert_settings(id, &updated).await?;
            println!("settings updated for tenant {id}");
        }
    }
    Ok(())
}

fn print_tenant(tenant: &Tenant) {
    println!("tenant {} ({})", tenant.id, tenant.name);
    println!("  widget key:   {}", tenant.widget_key);
    println!("  agent key:    {}", tenant.agent_key);
    match (&tenant.subscription_status, &tenant.subscription_expiry) {
        (Some(status), Some(expiry)) => println!("  subscription: {status} until {expiry}"),
        (Some(status), None) => println!("  subscription: {status}"),
        _ => println!("  subscription: none"),
    }
}
