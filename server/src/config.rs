use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::state::Heartbeat;

/// Command-line flags. Every setting is optional here so that only flags the
/// user actually passed override the TOML file and environment.
#[derive(Parser, Serialize, Clone, Debug, Default)]
#[command(name = "pulse-relay", version, about = "Real-time presence and messaging relay")]
pub struct Cli {
    /// Port to listen on [default: 3000]
    #[arg(long, env = "PULSE_PORT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(long, env = "PULSE_BIND_ADDRESS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long, default_value = "./pulse.toml")]
    #[serde(skip)]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "PULSE_JSON_LOGS")]
    #[serde(skip_serializing_if = "is_false")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip_serializing_if = "is_false")]
    pub generate_config: bool,

    /// Data directory holding the profile lookup database [default: ./data]
    #[arg(long, env = "PULSE_DATA_DIR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Upper bound on notification enrichment lookups, in milliseconds [default: 2000]
    #[arg(long, env = "PULSE_ENRICHMENT_TIMEOUT_MS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment_timeout_ms: Option<u64>,

    /// Seconds between server pings on each connection [default: 30]
    #[arg(long, env = "PULSE_PING_INTERVAL_SECS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping_interval_secs: Option<u64>,

    /// Seconds to wait for a pong before closing the connection [default: 10]
    #[arg(long, env = "PULSE_PONG_TIMEOUT_SECS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pong_timeout_secs: Option<u64>,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

/// Resolved runtime configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub json_logs: bool,
    #[serde(default)]
    pub generate_config: bool,
    pub data_dir: String,
    pub enrichment_timeout_ms: u64,
    pub ping_interval_secs: u64,
    pub pong_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            enrichment_timeout_ms: 2000,
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (PULSE_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        Self::layered(Cli::parse())
    }

    fn layered(cli: Cli) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("PULSE_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }

    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_millis(self.enrichment_timeout_ms)
    }

    pub fn heartbeat(&self) -> Heartbeat {
        Heartbeat {
            ping_interval: Duration::from_secs(self.ping_interval_secs.max(1)),
            pong_timeout: Duration::from_secs(self.pong_timeout_secs.max(1)),
        }
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Pulse Relay Configuration
# Place this file at ./pulse.toml or specify with --config <path>
# All settings can be overridden via environment variables (PULSE_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 3000)
# port = 3000

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the profile lookup database
# data_dir = "./data"

# ---- Relay ----

# Notification enrichment lookups slower than this are dropped (milliseconds)
# enrichment_timeout_ms = 2000

# ---- Heartbeat ----
# A connection that misses a pong is closed and its presence released.

# ping_interval_secs = 30
# pong_timeout_secs = 10
"#
    .to_string()
}
