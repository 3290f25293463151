use std::{io, path::Path, time::Duration};

use eyre::WrapErr;
use mcstatus_model::{HostPort, DEFAULT_PORT, DEFAULT_PROTOCOL_VERSION};
use serde::Deserialize;
use tracing::debug;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "MCSTATUS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "./mcstatus.toml";

#[derive(Deserialize, Debug, Clone, Default)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Settings for each status exchange
    pub query: QueryConfig,
    /// Freshness and history settings for the status service
    pub cache: CacheConfig,
    /// Servers to query when none are given on the command line
    pub servers: Vec<HostPort>,
}

#[derive(Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// Deadline for one whole exchange, in milliseconds
    pub timeout_ms: u64,
    /// Protocol version announced in the handshake
    pub protocol_version: i32,
    /// Port used when a target does not name one
    pub default_port: u16,
    /// Targets below this port are refused
    pub min_port: u16,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            timeout_ms: 5000,
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            default_port: DEFAULT_PORT,
            min_port: 1024,
        }
    }
}

impl QueryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(schemars::JsonSchema))]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// How long a successful status is served from cache, in seconds
    pub status_ttl_secs: u64,
    /// How long a user's query history is kept, in seconds
    pub history_ttl_secs: u64,
    /// Most suggestions returned for one lookup
    pub history_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            status_ttl_secs: 60,
            history_ttl_secs: 7 * 24 * 60 * 60,
            history_limit: 25,
        }
    }
}

impl CacheConfig {
    pub fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.status_ttl_secs)
    }

    pub fn history_ttl(&self) -> Duration {
        Duration::from_secs(self.history_ttl_secs)
    }
}

pub fn parse(source: &str) -> eyre::Result<Config> {
    toml::from_str(source).wrap_err("config is not valid")
}

/// Load the config, falling back to the defaults when the file does not exist
#[tracing::instrument]
pub async fn load(path: &Path) -> eyre::Result<Config> {
    match tokio::fs::read_to_string(path).await {
        Ok(source) => {
            parse(&source).wrap_err_with(|| format!("failed to load {}", path.display()))
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!("no config file, using defaults");
            Ok(Config::default())
        }
        Err(error) => {
            Err(error).wrap_err_with(|| format!("failed to read {}", path.display()))
        }
    }
}
