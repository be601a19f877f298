//! Configuration for the SQL execution engine, loaded from TOML.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Per-chain configuration, keyed by chain id.
    pub chains: HashMap<u64, ChainConfig>,
    pub executor: ExecutorConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    /// 0 disables the row-count limit (spec I6).
    #[serde(default)]
    pub max_table_row_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Path to the SQLite database file.
    pub database_path: String,
    /// How long `new_block_scope` waits for the write permit before
    /// failing with a timeout-shaped infra error.
    #[serde(default = "default_acquire_timeout_ms")]
    pub write_permit_acquire_timeout_ms: u64,
    /// Size of the read-only connection pool backing `SystemService`.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

fn default_acquire_timeout_ms() -> u64 {
    30_000
}

fn default_read_pool_size() -> usize {
    num_cpus_fallback()
}

fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chains: HashMap::new(),
            executor: ExecutorConfig {
                database_path: "tablesql.db".to_string(),
                write_permit_acquire_timeout_ms: default_acquire_timeout_ms(),
                read_pool_size: default_read_pool_size(),
            },
            api: ApiConfig {
                bind_addr: "127.0.0.1:8080".to_string(),
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("duplicate chain id in config: {0}")]
    DuplicateChainId(u64),
    #[error("io error reading config: {0}")]
    Io(String),
    #[error("could not parse config: {0}")]
    Parse(String),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, chain) in &self.chains {
            if *key != chain.chain_id {
                return Err(ConfigError::DuplicateChainId(*key));
            }
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
