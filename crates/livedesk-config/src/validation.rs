// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde cannot express: bind addresses, URLs,
//! non-zero intervals, and non-empty default copy.

use crate::diagnostic::ConfigError;
use crate::model::LivedeskConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &LivedeskConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    let public_url = config.server.public_url.trim();
    if !(public_url.starts_with("http://") || public_url.starts_with("https://")) {
        fail(format!(
            "server.public_url `{public_url}` must start with http:// or https://"
        ));
    }

    if !LOG_LEVELS.contains(&config.server.log_level.as_str()) {
        fail(format!(
            "server.log_level `{}` must be one of: {}",
            config.server.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    for (key, value) in [
        ("storage.database_path", &config.storage.database_path),
        ("relay.default_greeting", &config.relay.default_greeting),
        (
            "relay.default_offline_message",
            &config.relay.default_offline_message,
        ),
        ("relay.default_auto_reply", &config.relay.default_auto_reply),
        ("widget.cache_dir", &config.widget.cache_dir),
    ] {
        if value.trim().is_empty() {
            errors.push(ConfigError::EmptyValue { key });
        }
    }

    for (key, value, min) in [
        ("relay.online_window_secs", config.relay.online_window_secs, 1),
        ("relay.max_message_len", config.relay.max_message_len as u64, 1),
        ("widget.poll_interval_ms", config.widget.poll_interval_ms, 100),
        ("widget.hidden_backoff", u64::from(config.widget.hidden_backoff), 1),
        (
            "widget.request_timeout_secs",
            config.widget.request_timeout_secs,
            1,
        ),
    ] {
        if value < min {
            errors.push(ConfigError::OutOfRange { key, value, min });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &LivedeskConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn default_config_validates() {
        let config = LivedeskConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = LivedeskConfig::default();
        config.storage.database_path = "".to_string();
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("database_path")));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = LivedeskConfig::default();
        config.server.host = "not a host!".to_string();
        config.relay.online_window_secs = 0;
        config.widget.hidden_backoff = 0;
        config.relay.default_auto_reply = "   ".to_string();
        let msgs = messages(&config);
        assert_eq!(msgs.len(), 4, "got: {msgs:?}");
        assert!(msgs.iter().any(|m| m.contains("server.host")));
        assert!(msgs.iter().any(|m| m.contains("online_window_secs")));
        assert!(msgs.iter().any(|m| m.contains("hidden_backoff")));
        assert!(msgs.iter().any(|m| m.contains("default_auto_reply")));
    }

    #[test]
    fn public_url_needs_scheme() {
        let mut config = LivedeskConfig::default();
        config.server.public_url = "example.com".to_string();
        let msgs = messages(&config);
        assert!(msgs[0].contains("public_url"));
    }

    #[test]
    fn unknown_log_level_rejected() {
        let mut config = LivedeskConfig::default();
        config.server.log_level = "verbose".to_string();
        let msgs = messages(&config);
        assert!(msgs[0].contains("log_level"));
    }

    #[test]
    fn tiny_poll_interval_rejected() {
        let mut config = LivedeskConfig::default();
        config.widget.poll_interval_ms = 10;
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            errors.as_slice(),
            [ConfigError::OutOfRange {
                key: "widget.poll_interval_ms",
                value: 10,
                min: 100
            }]
        ));
    }

    #[test]
    fn blank_copy_is_an_empty_value() {
        let mut config = LivedeskConfig::default();
        config.relay.default_greeting = " \n".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            errors.as_slice(),
            [ConfigError::EmptyValue {
                key: "relay.default_greeting"
            }]
        ));
    }

    #[test]
    fn valid_custom_config_passes() {
        let mut config = LivedeskConfig::default();
        config.server.host = "0.0.0.0".to_string();
        config.server.public_url = "https://chat.example.com".to_string();
        config.storage.database_path = "/tmp/test.db".to_string();
        config.relay.online_window_secs = 60;
        assert!(validate_config(&config).is_ok());
    }
}
