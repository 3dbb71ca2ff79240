// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the livedesk configuration system.

use figment::Jail;
use livedesk_config::diagnostic::ConfigError;
use livedesk_config::{load_and_validate_path, load_and_validate_str, load_config, load_config_from_str};
use serial_test::serial;

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_livedesk_config() {
    let toml = r#"
[server]
host = "0.0.0.0"
port = 8080
public_url = "https://chat.example.com"
log_level = "debug"

[storage]
database_path = "/tmp/livedesk.db"
wal_mode = false

[relay]
online_window_secs = 120
max_message_len = 500
default_auto_reply = "Back soon."

[widget]
poll_interval_ms = 2000
hidden_backoff = 1
request_timeout_secs = 5
cache_dir = "/tmp/widget"

[metrics]
enabled = false
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.public_url, "https://chat.example.com");
    assert_eq!(config.server.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/livedesk.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.relay.online_window_secs, 120);
    assert_eq!(config.relay.max_message_len, 500);
    assert_eq!(config.relay.default_auto_reply, "Back soon.");
    assert_eq!(config.widget.poll_interval_ms, 2000);
    assert_eq!(config.widget.hidden_backoff, 1);
    assert_eq!(config.widget.request_timeout_secs, 5);
    assert_eq!(config.widget.cache_dir, "/tmp/widget");
    assert!(!config.metrics.enabled);
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.log_level, "info");
    assert!(config.storage.wal_mode);
    assert_eq!(config.relay.online_window_secs, 300);
    assert_eq!(config.relay.max_message_len, 4000);
    assert_eq!(
        config.relay.default_greeting,
        "Hi there! How can we help you today?"
    );
    assert_eq!(config.widget.poll_interval_ms, 5000);
    assert_eq!(config.widget.hidden_backoff, 3);
    assert_eq!(config.widget.request_timeout_secs, 15);
    assert!(config.metrics.enabled);
}

/// Unknown field in [server] produces an error mentioning the key.
#[test]
fn unknown_field_in_server_produces_error() {
    let err = load_config_from_str("[server]\nprot = 80\n").expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("prot"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Unexpected top-level section is rejected by deny_unknown_fields.
#[test]
fn deny_unknown_fields_at_top_level() {
    let err = load_config_from_str("[logging]\nlevel = \"debug\"\n")
        .expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("logging"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Unknown key becomes an UnknownKey diagnostic with suggestion and valid keys.
#[test]
fn diagnostic_unknown_key_has_suggestion() {
    let errors = load_and_validate_str("[server]\nprot = 80\n").expect_err("should produce errors");

    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "prot"
                && suggestion.as_deref() == Some("port")
                && valid_keys.contains("public_url")
        })
    });
    assert!(found, "expected UnknownKey for 'prot', got: {errors:?}");
}

/// Invalid type (string where number expected) produces an InvalidType diagnostic.
#[test]
fn diagnostic_invalid_type() {
    let errors = load_and_validate_str("[relay]\nmax_message_len = \"lots\"\n")
        .expect_err("should reject invalid type");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("max_message_len"))),
        "got: {errors:?}"
    );
}

/// Semantic validation runs after a successful parse.
#[test]
fn validation_errors_after_parse() {
    let errors = load_and_validate_str("[widget]\nhidden_backoff = 0\n")
        .expect_err("zero backoff should fail");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::OutOfRange {
            key: "widget.hidden_backoff",
            value: 0,
            min: 1
        }
    )));
}

/// ConfigError renders through miette with help text.
#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "prot".to_string(),
        section: Some("server".to_string()),
        suggestion: Some("port".to_string()),
        moved_to: None,
        valid_keys: "host, port, public_url, log_level".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some(), "should have diagnostic code");
    let help = error.help().map(|h| h.to_string()).unwrap_or_default();
    assert!(help.contains("did you mean `port`"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("server.prot"));
}

/// A key placed in the wrong section points at the section that owns it.
#[test]
fn diagnostic_key_in_wrong_section_names_owner() {
    let errors = load_and_validate_str("[relay]\npoll_interval_ms = 500\n")
        .expect_err("misplaced key should fail");
    let error = errors
        .iter()
        .find(|e| matches!(e, ConfigError::UnknownKey { .. }))
        .expect("UnknownKey diagnostic");
    match error {
        ConfigError::UnknownKey {
            key,
            section,
            suggestion,
            moved_to,
            ..
        } => {
            assert_eq!(key, "poll_interval_ms");
            assert_eq!(section.as_deref(), Some("relay"));
            assert_eq!(suggestion, &None);
            assert_eq!(moved_to.as_deref(), Some("widget.poll_interval_ms"));
        }
        other => panic!("unexpected {other:?}"),
    }

    use miette::Diagnostic;
    let help = error.help().map(|h| h.to_string()).unwrap_or_default();
    assert!(help.contains("[widget] section"), "got: {help}");
}

/// A misspelled section name is matched against the known sections.
#[test]
fn diagnostic_unknown_section_suggests_section() {
    let errors = load_and_validate_str("[widgets]\ncache_dir = \"/tmp\"\n")
        .expect_err("unknown section should fail");
    assert!(
        errors.iter().any(|e| matches!(
            e,
            ConfigError::UnknownKey { key, section: None, suggestion, .. }
                if key == "widgets" && suggestion.as_deref() == Some("widget")
        )),
        "got: {errors:?}"
    );
}

/// Local `livedesk.toml` is picked up and env vars override it.
#[test]
#[serial]
fn env_overrides_local_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "livedesk.toml",
            "[server]\nport = 4000\n\n[widget]\npoll_interval_ms = 1000\n",
        )?;
        jail.set_env("LIVEDESK_SERVER_PORT", "8081");
        jail.set_env("LIVEDESK_RELAY_ONLINE_WINDOW_SECS", "60");

        let config = load_config()?;
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.widget.poll_interval_ms, 1000);
        assert_eq!(config.relay.online_window_secs, 60);
        Ok(())
    });
}

/// Env var keys containing underscores map to a single field.
#[test]
#[serial]
fn env_underscore_fields_map_correctly() {
    Jail::expect_with(|jail| {
        jail.set_env("LIVEDESK_WIDGET_REQUEST_TIMEOUT_SECS", "3");
        jail.set_env("LIVEDESK_STORAGE_DATABASE_PATH", "/tmp/env.db");

        let config = load_config()?;
        assert_eq!(config.widget.request_timeout_secs, 3);
        assert_eq!(config.storage.database_path, "/tmp/env.db");
        Ok(())
    });
}

/// An explicit path is loaded and validated; bad files get source-aware diagnostics.
#[test]
#[serial]
fn explicit_path_loads_and_validates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = dir.path().join("good.toml");
    std::fs::write(&good, "[metrics]\nenabled = false\n").expect("write");
    let config = load_and_validate_path(&good).expect("should load");
    assert!(!config.metrics.enabled);

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[relay]\nmax_mesage_len = 10\n").expect("write");
    let errors = load_and_validate_path(&bad).expect_err("should fail");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::UnknownKey { suggestion, .. } if suggestion.as_deref() == Some("max_message_len")
    )));
}

/// Missing config files are silently skipped.
#[test]
#[serial]
fn missing_config_files_silently_skipped() {
    Jail::expect_with(|_jail| {
        let config = load_config()?;
        assert_eq!(config.server.port, 3000);
        Ok(())
    });
}
