// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gateway Client Configuration
//
// Defines the configuration schema for the gateway client, including:
// - Connection pool TTL and per-key capacity
// - Connect, call, ping and provisioning-step timeouts
// - Client identity presented in the gateway handshake

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "SWITCHBOARD_CONFIG_PATH";

/// Top-level gateway client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayClientConfig {
    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub client: ClientIdentity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// How long a released connection stays eligible for reuse
    #[serde(with = "humantime_serde", default = "default_pool_ttl")]
    pub ttl: Duration,

    /// Upper bound on pooled connections sharing one cache key
    #[serde(default = "default_max_per_key")]
    pub max_per_key: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            ttl: default_pool_ttl(),
            max_per_key: default_max_per_key(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Socket open plus handshake
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect: Duration,

    /// Default per-call deadline
    #[serde(with = "humantime_serde", default = "default_call_timeout")]
    pub call: Duration,

    /// Whole probe: connect, round trip, teardown
    #[serde(with = "humantime_serde", default = "default_ping_timeout")]
    pub ping: Duration,

    /// Deadline for each provisioning step
    #[serde(with = "humantime_serde", default = "default_call_timeout")]
    pub provisioning_step: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: default_connect_timeout(),
            call: default_call_timeout(),
            ping: default_ping_timeout(),
            provisioning_step: default_call_timeout(),
        }
    }
}

/// Client identity sent in the `connect` handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientIdentity {
    #[serde(default = "default_client_id")]
    pub id: String,

    #[serde(default = "default_client_version")]
    pub version: String,

    #[serde(default = "default_platform")]
    pub platform: String,

    #[serde(default = "default_mode")]
    pub mode: String,

    #[serde(default = "default_role")]
    pub role: String,

    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Stable device identifier used when device pairing is enabled
    #[serde(default = "default_device_id")]
    pub device_id: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            id: default_client_id(),
            version: default_client_version(),
            platform: default_platform(),
            mode: default_mode(),
            role: default_role(),
            scopes: default_scopes(),
            device_id: default_device_id(),
        }
    }
}

fn default_pool_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_max_per_key() -> usize {
    4
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_ping_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_client_id() -> String {
    "switchboard".to_string()
}

fn default_client_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_platform() -> String {
    std::env::consts::OS.to_string()
}

fn default_mode() -> String {
    "backend".to_string()
}

fn default_role() -> String {
    "operator".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["operator.read".to_string(), "operator.write".to_string()]
}

fn default_device_id() -> String {
    "switchboard-backend".to_string()
}

impl GatewayClientConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. SWITCHBOARD_CONFIG_PATH environment variable
    /// 2. ./switchboard.yaml (working directory)
    /// 3. ~/.switchboard/config.yaml (user home)
    /// 4. /etc/switchboard/config.yaml (Unix only)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./switchboard.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".switchboard").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/switchboard/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Some(ttl) = env_duration("SWITCHBOARD_POOL_TTL") {
            tracing::info!(ttl = ?ttl, "Environment override: SWITCHBOARD_POOL_TTL");
            self.pool.ttl = ttl;
        }

        if let Ok(val) = std::env::var("SWITCHBOARD_POOL_MAX_PER_KEY") {
            match val.parse::<usize>() {
                Ok(max) => {
                    tracing::info!("Environment override: SWITCHBOARD_POOL_MAX_PER_KEY={}", max);
                    self.pool.max_per_key = max;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for SWITCHBOARD_POOL_MAX_PER_KEY: '{}'. Expected an integer. Ignoring.",
                    val
                ),
            }
        }

        if let Some(timeout) = env_duration("SWITCHBOARD_CALL_TIMEOUT") {
            tracing::info!(timeout = ?timeout, "Environment override: SWITCHBOARD_CALL_TIMEOUT");
            self.timeouts.call = timeout;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pool.ttl.is_zero() {
            anyhow::bail!("pool.ttl must be greater than zero");
        }
        if self.pool.max_per_key == 0 {
            anyhow::bail!("pool.max_per_key must be at least 1");
        }
        for (name, value) in [
            ("timeouts.connect", self.timeouts.connect),
            ("timeouts.call", self.timeouts.call),
            ("timeouts.ping", self.timeouts.ping),
            ("timeouts.provisioning_step", self.timeouts.provisioning_step),
        ] {
            if value.is_zero() {
                anyhow::bail!("{} must be greater than zero", name);
            }
        }
        if self.client.id.trim().is_empty() {
            anyhow::bail!("client.id must not be empty");
        }
        Ok(())
    }
}

fn env_duration(var: &str) -> Option<Duration> {
    let val = std::env::var(var).ok()?;
    match humantime_serde::re::humantime::parse_duration(&val) {
        Ok(duration) => Some(duration),
        Err(_) => {
            tracing::warn!(
                "Invalid value for {}: '{}'. Expected a duration like 30s or 5m. Ignoring.",
                var,
                val
            );
            None
        }
    }
}
