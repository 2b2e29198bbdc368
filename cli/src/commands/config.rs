// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use switchboard_core::domain::client_config::{GatewayClientConfig, CONFIG_PATH_ENV};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = GatewayClientConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./switchboard.yaml");
        println!("  4. ~/.switchboard/config.yaml");
        println!("  5. /etc/switchboard/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Pool:".bold());
    println!("  TTL: {:?}", config.pool.ttl);
    println!("  Max per key: {}", config.pool.max_per_key);
    println!();

    println!("{}", "Timeouts:".bold());
    println!("  Connect: {:?}", config.timeouts.connect);
    println!("  Call: {:?}", config.timeouts.call);
    println!("  Ping: {:?}", config.timeouts.ping);
    println!("  Provisioning step: {:?}", config.timeouts.provisioning_step);
    println!();

    println!("{}", "Client:".bold());
    println!("  ID: {} ({})", config.client.id, config.client.version);
    println!("  Platform: {}", config.client.platform);
    println!("  Mode: {}", config.client.mode);
    println!("  Role: {}", config.client.role);
    println!("  Scopes: {}", config.client.scopes.join(", "));
    println!("  Device: {}", config.client.device_id);
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = GatewayClientConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}
