// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Value types, error taxonomy, collaborator contracts and configuration for
//! the gateway client.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Technology-agnostic gateway client model

pub mod gateway;
pub mod errors;
pub mod rpc;
pub mod provisioning;
pub mod repository;
pub mod client_config;
