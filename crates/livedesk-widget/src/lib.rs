// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Widget-side client for the livedesk relay.
//!
//! A [`Poller`] keeps the local transcript in a [`MessageCache`], talks to
//! the relay through a [`RelayTransport`], and polls on a fixed interval.

pub mod cache;
pub mod poller;
pub mod transport;

pub use cache::{CacheStore, CachedMessage, DeliveryState, LocalId, MessageCache};
pub use poller::{LOCAL_TOKEN_PREFIX, Poller, poll_loop};
pub use transport::{HttpTransport, PageContext, RelayTransport, WIDGET_API_PATH};
