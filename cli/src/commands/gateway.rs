// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway operation commands
//!
//! Commands: ping, sessions, history, send, provision
//!
//! Every command targets the one gateway described by the `--url`/`--token`
//! flags. The descriptor is registered in an in-memory directory so the
//! operations run through the same pooled path the library exposes.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use switchboard_core::application::GatewayService;
use switchboard_core::domain::client_config::GatewayClientConfig;
use switchboard_core::domain::gateway::{ConnectionDescriptor, GatewayId};
use switchboard_core::domain::provisioning::{AgentId, AgentRef, ProvisioningContext, WorkspaceId};
use switchboard_core::infrastructure::gateway::{ConnectionPool, WebSocketConnector};
use switchboard_core::infrastructure::repositories::{
    InMemoryGatewayDirectory, InMemoryGatewayHealthRepository,
};

#[derive(Args, Debug, Clone)]
pub struct GatewayArgs {
    /// Gateway WebSocket address (ws://, wss:// or host:port)
    #[arg(long, env = "SWITCHBOARD_GATEWAY_URL")]
    url: String,

    /// Gateway auth token
    #[arg(long, env = "SWITCHBOARD_GATEWAY_TOKEN", default_value = "", hide_env_values = true)]
    token: String,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure_tls: bool,

    /// Omit the device block from the handshake
    #[arg(long)]
    disable_device_pairing: bool,

    /// Gateway id used for session keys (default: random)
    #[arg(long, value_name = "UUID")]
    gateway_id: Option<String>,
}

impl GatewayArgs {
    fn descriptor(&self) -> ConnectionDescriptor {
        ConnectionDescriptor::new(&self.url, &self.token)
            .with_insecure_tls(self.insecure_tls)
            .with_device_pairing_disabled(self.disable_device_pairing)
    }

    fn gateway_id(&self) -> Result<GatewayId> {
        match &self.gateway_id {
            Some(raw) => GatewayId::from_string(raw).with_context(|| format!("Invalid gateway id: {}", raw)),
            None => Ok(GatewayId::new()),
        }
    }
}

#[derive(Subcommand)]
pub enum GatewayCommand {
    /// Check reachability and latency
    Ping {
        #[command(flatten)]
        gateway: GatewayArgs,
    },

    /// List sessions on the gateway
    Sessions {
        #[command(flatten)]
        gateway: GatewayArgs,
    },

    /// Fetch chat history for a session
    History {
        #[command(flatten)]
        gateway: GatewayArgs,

        /// Session key
        #[arg(long)]
        session: String,

        /// Maximum number of messages
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Send a chat message to a session
    Send {
        #[command(flatten)]
        gateway: GatewayArgs,

        /// Session key
        #[arg(long)]
        session: String,

        /// Message text
        #[arg(long)]
        message: String,
    },

    /// Register an agent session on the gateway
    Provision {
        #[command(flatten)]
        gateway: GatewayArgs,

        /// Agent UUID
        #[arg(long)]
        agent_id: String,

        /// Agent display name
        #[arg(long)]
        agent_name: String,

        /// Workspace UUID
        #[arg(long)]
        workspace_id: String,

        /// Base URL the gateway calls back into
        #[arg(long)]
        base_url: String,

        /// Token the gateway presents on callbacks
        #[arg(long, env = "SWITCHBOARD_CALLBACK_TOKEN", hide_env_values = true)]
        callback_token: String,

        /// Peer agent as ID=NAME (repeatable)
        #[arg(long = "peer", value_name = "ID=NAME")]
        peers: Vec<String>,
    },
}

type Service = GatewayService<WebSocketConnector>;

pub async fn handle_command(command: GatewayCommand, config_override: Option<PathBuf>) -> Result<()> {
    let config = GatewayClientConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    match command {
        GatewayCommand::Ping { gateway } => ping(&config, &gateway).await,
        GatewayCommand::Sessions { gateway } => {
            let (service, gateway_id) = build_service(&config, &gateway)?;
            let result = service.list_sessions(gateway_id).await;
            service.shutdown();
            print_json(&result.context("Failed to list sessions")?)
        }
        GatewayCommand::History {
            gateway,
            session,
            limit,
        } => {
            let (service, gateway_id) = build_service(&config, &gateway)?;
            let result = service.fetch_history(gateway_id, &session, limit).await;
            service.shutdown();
            print_json(&result.context("Failed to fetch history")?)
        }
        GatewayCommand::Send {
            gateway,
            session,
            message,
        } => {
            let (service, gateway_id) = build_service(&config, &gateway)?;
            let result = service.send_message(gateway_id, &session, &message).await;
            service.shutdown();
            let payload = result.context("Failed to send message")?;
            println!("{}", "✓ Message sent".green());
            print_json(&payload)
        }
        GatewayCommand::Provision {
            gateway,
            agent_id,
            agent_name,
            workspace_id,
            base_url,
            callback_token,
            peers,
        } => {
            let (service, gateway_id) = build_service(&config, &gateway)?;
            let ctx = ProvisioningContext {
                agent: AgentRef::new(
                    AgentId::from_string(&agent_id).with_context(|| format!("Invalid agent id: {}", agent_id))?,
                    agent_name,
                ),
                workspace_id: WorkspaceId::from_string(&workspace_id)
                    .with_context(|| format!("Invalid workspace id: {}", workspace_id))?,
                gateway_id,
                peers: peers.iter().map(|p| parse_peer(p)).collect::<Result<_>>()?,
                base_url,
                auth_token: callback_token,
            };

            let result = service.provision_agent(&ctx).await;
            service.shutdown();
            let session_key = result.context("Provisioning failed")?;
            println!("{}", "✓ Agent provisioned".green());
            println!("  Session: {}", session_key.bold());
            Ok(())
        }
    }
}

async fn ping(config: &GatewayClientConfig, gateway: &GatewayArgs) -> Result<()> {
    let (service, _) = build_service(config, gateway)?;
    let result = service.validate_connection(&gateway.descriptor()).await;

    if result.success {
        println!(
            "{} {} ({}ms)",
            "✓".green(),
            gateway.url,
            result.latency_ms.unwrap_or_default()
        );
        Ok(())
    } else {
        println!("{} {}", "✗".red(), gateway.url);
        Err(anyhow!(
            "Gateway unreachable: {}",
            result.error.unwrap_or_else(|| "unknown error".to_string())
        ))
    }
}

fn build_service(config: &GatewayClientConfig, gateway: &GatewayArgs) -> Result<(Service, GatewayId)> {
    let gateway_id = gateway.gateway_id()?;
    let directory = InMemoryGatewayDirectory::new();
    directory.insert(gateway_id, gateway.descriptor());
    debug!(gateway_id = %gateway_id, url = %gateway.url, "Registered gateway for command");

    let connector = WebSocketConnector::new(config.client.clone(), config.timeouts.connect);
    let pool = Arc::new(ConnectionPool::new(connector, &config.pool));
    let service = GatewayService::new(
        pool,
        Arc::new(directory),
        Arc::new(InMemoryGatewayHealthRepository::new()),
        config.timeouts.clone(),
    );
    Ok((service, gateway_id))
}

fn parse_peer(raw: &str) -> Result<AgentRef> {
    let (id, name) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Peer must be ID=NAME, got '{}'", raw))?;
    let id = AgentId::from_string(id.trim()).with_context(|| format!("Invalid peer id: {}", id))?;
    Ok(AgentRef::new(id, name.trim()))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
