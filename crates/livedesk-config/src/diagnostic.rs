// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config error diagnostics for `livedesk.toml`.
//!
//! Figment errors and validation failures are turned into miette
//! diagnostics. Unknown keys get a typo suggestion from their own section,
//! or a pointer to the section that actually owns the key.

#![allow(unused_assignments)] // miette's Diagnostic derive trips this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a candidate must beat to be offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Keys accepted in each section of `livedesk.toml`.
pub const SECTION_KEYS: &[(&str, &[&str])] = &[
    ("server", &["host", "port", "public_url", "log_level"]),
    ("storage", &["database_path", "wal_mode"]),
    (
        "relay",
        &[
            "online_window_secs",
            "max_message_len",
            "default_greeting",
            "default_offline_message",
            "default_auto_reply",
        ],
    ),
    (
        "widget",
        &[
            "poll_interval_ms",
            "hidden_backoff",
            "request_timeout_secs",
            "cache_dir",
        ],
    ),
    ("metrics", &["enabled"]),
];

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key or section that livedesk does not recognize.
    #[error("unknown configuration key `{}`", qualified(.section.as_deref(), .key))]
    #[diagnostic(
        code(livedesk::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), moved_to.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Section the key appeared in; `None` for top-level keys.
        section: Option<String>,
        /// Close match from the same section.
        suggestion: Option<String>,
        /// `section.key` when the key exists, but in a different section.
        moved_to: Option<String>,
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value has the wrong type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(livedesk::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A numeric setting below its floor.
    #[error("`{key}` must be at least {min}, got {value}")]
    #[diagnostic(
        code(livedesk::config::out_of_range),
        help("set `{key}` to {min} or more")
    )]
    OutOfRange {
        key: &'static str,
        value: u64,
        min: u64,
    },

    /// A string setting that is blank after trimming.
    #[error("`{key}` must not be empty")]
    #[diagnostic(code(livedesk::config::empty_value))]
    EmptyValue { key: &'static str },

    /// Any other semantic validation failure.
    #[error("validation error: {message}")]
    #[diagnostic(code(livedesk::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(livedesk::config::other))]
    Other(String),
}

fn qualified(section: Option<&str>, key: &str) -> String {
    match section {
        Some(section) => format!("{section}.{key}"),
        None => key.to_string(),
    }
}

fn unknown_key_help(suggestion: Option<&str>, moved_to: Option<&str>, valid_keys: &str) -> String {
    match (suggestion, moved_to) {
        (Some(s), _) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        (None, Some(target)) => {
            let section = target.split('.').next().unwrap_or(target);
            format!("`{target}` lives in the [{section}] section. Valid keys here: {valid_keys}")
        }
        (None, None) => format!("valid keys: {valid_keys}"),
    }
}

/// Valid keys for a section path: section names at the top level, the
/// section's fields inside one.
pub fn keys_for(section: Option<&str>) -> Vec<&'static str> {
    match section {
        None => SECTION_KEYS.iter().map(|(name, _)| *name).collect(),
        Some(section) => SECTION_KEYS
            .iter()
            .find(|(name, _)| *name == section)
            .map(|(_, keys)| keys.to_vec())
            .unwrap_or_default(),
    }
}

/// The `section.key` owning `key`, searching every section except `current`.
pub fn owning_section(key: &str, current: Option<&str>) -> Option<String> {
    SECTION_KEYS
        .iter()
        .filter(|(name, _)| Some(*name) != current)
        .find(|(_, keys)| keys.contains(&key))
        .map(|(name, _)| format!("{name}.{key}"))
}

/// Convert a `figment::Error` into livedesk diagnostics.
///
/// `toml_sources` pairs file paths with their contents so spans can point
/// into the file that produced the error.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let section = path.first().cloned();
                    let valid = if expected.is_empty() {
                        keys_for(section.as_deref())
                    } else {
                        expected.to_vec()
                    };
                    let suggestion = suggest_key(field, &valid);
                    let moved_to = if suggestion.is_none() {
                        owning_section(field, section.as_deref())
                    } else {
                        None
                    };
                    let (span, src) = find_source_span(&error, &path, field, toml_sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        section,
                        suggestion,
                        moved_to,
                        valid_keys: valid.join(", "),
                        span,
                        src,
                    }
                }
                Kind::InvalidType(actual, expected) => {
                    let (span, src) = match path.split_last() {
                        Some((field, section)) => {
                            find_source_span(&error, section, field, toml_sources)
                        }
                        None => (None, None),
                    };
                    ConfigError::InvalidType {
                        key: path.join("."),
                        detail: format!("found {actual}, expected {expected}"),
                        expected: expected.to_string(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn find_source_span(
    error: &figment::error::Error,
    section: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let origin = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    // Inline strings carry no file metadata; fall back to the only source.
    let source = match origin {
        Some(origin) => toml_sources.iter().find(|(p, _)| *p == origin),
        None if toml_sources.len() == 1 => toml_sources.first(),
        None => None,
    };

    let Some((path, content)) = source else {
        return (None, None);
    };
    match find_key_offset(content, section, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(path, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` inside the `[section]` table, or at top level
/// when `section` is empty. Only the named table is searched.
pub fn find_key_offset(content: &str, section: &[String], field: &str) -> Option<usize> {
    let header = section.first().map(|s| format!("[{s}]"));
    let mut in_table = header.is_none();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            in_table = header
                .as_deref()
                .is_some_and(|h| trimmed.trim_end().starts_with(h));
        } else if in_table
            && let Some(after) = trimmed.strip_prefix(field)
            && after.trim_start().starts_with('=')
        {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }

    None
}

/// Best Jaro-Winkler match above the suggestion threshold.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|&key| (key, strsim::jaro_winkler(unknown, key)))
        .filter(|(_, score)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(key, _)| key.to_string())
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LivedeskConfig;

    #[test]
    fn section_keys_match_config_model() {
        let value = toml::Value::try_from(LivedeskConfig::default()).unwrap();
        let table = value.as_table().unwrap();
        let mut sections: Vec<&str> = table.keys().map(String::as_str).collect();
        sections.sort_unstable();
        let mut known = keys_for(None);
        known.sort_unstable();
        assert_eq!(sections, known);

        for (name, keys) in SECTION_KEYS {
            let mut fields: Vec<&str> = table[*name]
                .as_table()
                .unwrap()
                .keys()
                .map(String::as_str)
                .collect();
            fields.sort_unstable();
            let mut expected = keys.to_vec();
            expected.sort_unstable();
            assert_eq!(fields, expected, "section [{name}]");
        }
    }

    #[test]
    fn suggests_within_section() {
        assert_eq!(
            suggest_key("prot", &keys_for(Some("server"))),
            Some("port".to_string())
        );
        assert_eq!(
            suggest_key("poll_intervl_ms", &keys_for(Some("widget"))),
            Some("poll_interval_ms".to_string())
        );
        assert_eq!(suggest_key("zzzzzz", &keys_for(Some("server"))), None);
    }

    #[test]
    fn suggests_section_names_at_top_level() {
        assert_eq!(
            suggest_key("widgets", &keys_for(None)),
            Some("widget".to_string())
        );
    }

    #[test]
    fn owning_section_skips_current() {
        assert_eq!(
            owning_section("poll_interval_ms", Some("relay")),
            Some("widget.poll_interval_ms".to_string())
        );
        assert_eq!(owning_section("poll_interval_ms", Some("widget")), None);
        assert_eq!(owning_section("nonsense", None), None);
    }

    #[test]
    fn moved_key_help_names_owning_section() {
        let help = unknown_key_help(None, Some("widget.cache_dir"), "online_window_secs");
        assert!(help.contains("[widget] section"), "got: {help}");
    }

    #[test]
    fn find_key_offset_in_section() {
        let content = "[storage]\nwal_mode = true\n\n[server]\nprot = 80\n";
        let path = vec!["server".to_string()];
        let o = find_key_offset(content, &path, "prot").expect("key should be found");
        assert_eq!(&content[o..o + 4], "prot");
    }

    #[test]
    fn find_key_offset_stays_inside_table() {
        let content = "[server]\nport = 80\n\n[relay]\nmax_message_len = 5\n";
        let server = vec!["server".to_string()];
        assert_eq!(find_key_offset(content, &server, "max_message_len"), None);
        let metrics = vec!["metrics".to_string()];
        assert_eq!(find_key_offset(content, &metrics, "port"), None);
        let relay = vec!["relay".to_string()];
        assert!(find_key_offset(content, &relay, "max_message_len").is_some());
    }
}
