// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the tenant, visitor, and message tables.

pub mod messages;
pub mod tenants;
pub mod visitors;
