// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay protocol handler for livedesk.
//!
//! Turns widget and agent requests into tenant directory, visitor registry,
//! and message store calls. Transport-agnostic: the gateway feeds it parsed
//! parameters and the widget client decodes its responses.

pub mod agent;
pub mod protocol;
pub mod service;

pub use agent::{HeartbeatResponse, InboxResponse};
pub use protocol::{
    Action, ActivityResponse, ConfigResponse, MarkReadResponse, MessagesResponse, Params,
    RegisterResponse, RelayRequest, RelayResponse, SendResponse, WIDGET_KEY_PARAM, WidgetConfig,
};
pub use service::{RelayService, auto_reply_text, build_widget_config, outcome_of};
