// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Switchboard Core
//!
//! Gateway RPC client for the switchboard control plane: WebSocket transport,
//! correlated request/response calls, a keyed connection pool and the agent
//! provisioning workflow.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Long-lived gateway connections shared by short-lived operations

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
