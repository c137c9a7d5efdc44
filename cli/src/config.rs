//! Client configuration with TOML file support.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stakeview_coordinator::RefreshPolicy;
use stakeview_types::Address;
use stakeview_utils::LogFormat;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Configuration for the stakeview client.
///
/// Loaded from a TOML file via [`ClientConfig::from_toml_file`]; every field
/// has a default so a partial (or empty) file is valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// JSON-RPC endpoint of the chain node.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Expected chain id. A node reporting a different one is warned about.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    #[serde(default = "default_contract")]
    pub staking_contract: Address,

    #[serde(default = "default_contract")]
    pub token_contract: Address,

    /// Block the staking contract was deployed in; history starts here.
    #[serde(default = "default_deployment_block")]
    pub deployment_block: u64,

    /// Largest block span per log query, for nodes that cap `eth_getLogs`.
    #[serde(default)]
    pub max_block_range: Option<u64>,

    /// Account the node signs for. Without one the client is read-only.
    #[serde(default)]
    pub account: Option<Address>,

    /// Application identifier. Only logged.
    #[serde(default)]
    pub project_id: Option<String>,

    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,

    /// Receipt polling interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,

    /// Attempts per view refresh after a write, first try included.
    #[serde(default = "default_refresh_attempts")]
    pub refresh_attempts: u32,

    /// Delay before the first refresh retry in milliseconds. Doubles per retry.
    #[serde(default = "default_refresh_backoff_ms")]
    pub refresh_backoff_ms: u64,

    #[serde(default)]
    pub log_format: LogFormat,

    /// "trace", "debug", "info", "warn" or "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

/// Sepolia.
fn default_chain_id() -> u64 {
    11_155_111
}

fn default_contract() -> Address {
    Address::ZERO
}

fn default_deployment_block() -> u64 {
    9_163_648
}

fn default_explorer_url() -> String {
    "https://sepolia.etherscan.io".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_confirmation_timeout_secs() -> u64 {
    180
}

fn default_refresh_attempts() -> u32 {
    3
}

fn default_refresh_backoff_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ClientConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    /// Backoff is capped at eight times the initial delay.
    pub fn refresh_policy(&self) -> RefreshPolicy {
        let initial = Duration::from_millis(self.refresh_backoff_ms);
        RefreshPolicy {
            attempts: self.refresh_attempts.max(1),
            initial_backoff: initial,
            max_backoff: initial.saturating_mul(8),
        }
    }

    /// Whether the contract addresses were left at their zero default.
    pub fn contracts_configured(&self) -> bool {
        self.staking_contract != Address::ZERO && self.token_contract != Address::ZERO
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            staking_contract: default_contract(),
            token_contract: default_contract(),
            deployment_block: default_deployment_block(),
            max_block_range: None,
            account: None,
            project_id: None,
            explorer_url: default_explorer_url(),
            poll_interval_ms: default_poll_interval_ms(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            refresh_attempts: default_refresh_attempts(),
            refresh_backoff_ms: default_refresh_backoff_ms(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
        }
    }
}
