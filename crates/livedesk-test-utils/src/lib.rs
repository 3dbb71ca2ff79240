// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for livedesk integration tests.
//!
//! Provides a seeded relay stack over a temporary SQLite database, so tests
//! run fast and deterministically without external services.
//!
//! # Components
//!
//! - [`TestHarness`] - storage, relay, and gateway wired together
//! - [`RecordingObserver`] - metrics adapter that captures events

pub mod harness;
pub mod recording;

pub use harness::{RunningServer, TestHarness, TestHarnessBuilder};
pub use recording::RecordingObserver;
