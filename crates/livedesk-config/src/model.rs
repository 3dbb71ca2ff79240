// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the livedesk relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level livedesk configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LivedeskConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Relay behavior: online window, body limits, default copy.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Client poller settings used by `livedesk chat`.
    #[serde(default)]
    pub widget: WidgetConfig,

    /// Prometheus metrics settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL of the site, echoed to widgets as `siteUrl`.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_public_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("livedesk").join("livedesk.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("livedesk.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Relay behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// An agent counts as online while its last heartbeat is younger than this.
    #[serde(default = "default_online_window_secs")]
    pub online_window_secs: u64,

    /// Longest accepted message body, in characters, after trimming.
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,

    /// Greeting shown by widgets of tenants without custom settings.
    #[serde(default = "default_greeting")]
    pub default_greeting: String,

    /// Offline banner shown by widgets of tenants without custom settings.
    #[serde(default = "default_offline_message")]
    pub default_offline_message: String,

    /// Reply stored on behalf of an offline agent when the tenant has no
    /// offline message of its own.
    #[serde(default = "default_auto_reply")]
    pub default_auto_reply: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            online_window_secs: default_online_window_secs(),
            max_message_len: default_max_message_len(),
            default_greeting: default_greeting(),
            default_offline_message: default_offline_message(),
            default_auto_reply: default_auto_reply(),
        }
    }
}

fn default_online_window_secs() -> u64 {
    300
}

fn default_max_message_len() -> usize {
    4000
}

fn default_greeting() -> String {
    "Hi there! How can we help you today?".to_string()
}

fn default_offline_message() -> String {
    "We're currently offline. Leave a message and we'll get back to you soon.".to_string()
}

fn default_auto_reply() -> String {
    "Thanks for your message! We're currently offline, but we'll get back to you as soon as possible."
        .to_string()
}

/// Client poller configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WidgetConfig {
    /// Poll interval while the panel is visible, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Poll interval multiplier while the page is hidden. 1 disables backoff.
    #[serde(default = "default_hidden_backoff")]
    pub hidden_backoff: u32,

    /// Per-request timeout, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Directory holding the message cache and visitor token.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            hidden_backoff: default_hidden_backoff(),
            request_timeout_secs: default_request_timeout_secs(),
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_hidden_backoff() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_cache_dir() -> String {
    dirs::cache_dir()
        .map(|p| p.join("livedesk").join("widget"))
        .unwrap_or_else(|| std::path::PathBuf::from(".livedesk-widget"))
        .to_string_lossy()
        .into_owned()
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}
