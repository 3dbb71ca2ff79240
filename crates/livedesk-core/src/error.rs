// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the livedesk relay.

use thiserror::Error;

/// The primary error type used across all livedesk adapter traits and relay operations.
#[derive(Debug, Error)]
pub enum LivedeskError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database unavailable, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The presented credential (widget key or agent key) did not resolve to a tenant.
    ///
    /// The message is fixed per credential kind so callers cannot probe keys.
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    /// Request input failed validation (empty body, missing visitor id, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced entity does not exist for the resolved tenant.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Client-side transport failures (connection refused, bad status, undecodable body).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Uniform message for unknown widget keys.
pub const INVALID_WIDGET_KEY: &str = "invalid widget key";

/// Uniform message for unknown agent API keys.
pub const INVALID_AGENT_KEY: &str = "invalid agent key";

impl LivedeskError {
    /// Shorthand for an unknown widget key.
    pub fn invalid_widget_key() -> Self {
        Self::Unauthorized(INVALID_WIDGET_KEY)
    }

    /// Shorthand for an unknown agent API key.
    pub fn invalid_agent_key() -> Self {
        Self::Unauthorized(INVALID_AGENT_KEY)
    }

    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Stable machine-readable code used in wire responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Timeout { .. } => "timeout",
            Self::Transport { .. } => "transport",
            Self::Config(_) => "config",
            Self::Storage { .. } | Self::Internal(_) => "internal",
        }
    }

    /// Whether the failure is the caller's fault and safe to describe verbatim.
    ///
    /// Storage and internal failures are not: their detail stays in the logs.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized(_) | Self::Validation(_) | Self::NotFound { .. }
        )
    }

    /// Whether a retry of the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Transport { .. } | Self::Timeout { .. }
        )
    }
}
