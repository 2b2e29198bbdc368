// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the switchboard CLI

pub mod config;
pub mod gateway;

pub use self::config::ConfigCommand;
pub use self::gateway::GatewayCommand;
