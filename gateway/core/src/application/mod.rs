// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod gateway_service;
pub mod provisioning;

pub use gateway_service::GatewayService;
pub use provisioning::{AgentProvisioner, PROVISIONING_STEPS};
