// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./livedesk.toml` > `~/.config/livedesk/livedesk.toml` > `/etc/livedesk/livedesk.toml`
//! with environment variable overrides via `LIVEDESK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::LivedeskConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/livedesk/livedesk.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "livedesk.toml";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/livedesk/livedesk.toml` (system-wide)
/// 3. `~/.config/livedesk/livedesk.toml` (user XDG config)
/// 4. `./livedesk.toml` (local directory)
/// 5. `LIVEDESK_*` environment variables
pub fn load_config() -> Result<LivedeskConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<LivedeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LivedeskConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LivedeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LivedeskConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LivedeskConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// `~/.config/livedesk/livedesk.toml`, if the platform has a config dir.
pub fn user_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|d| d.join("livedesk").join(LOCAL_CONFIG_FILE))
}

/// Map a lowercased, prefix-stripped env var name to its dotted config key.
///
/// Only the first underscore after a known section name is a separator:
/// `relay_online_window_secs` maps to `relay.online_window_secs`.
pub fn map_env_key(key: &str) -> String {
    const SECTIONS: [&str; 5] = ["server", "storage", "relay", "widget", "metrics"];
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")`: field names contain
/// underscores (`LIVEDESK_WIDGET_POLL_INTERVAL_MS` is `widget.poll_interval_ms`).
fn env_provider() -> Env {
    Env::prefixed("LIVEDESK_").map(|key| map_env_key(key.as_str()).into())
}
