//! Node configuration.
//!
//! Loaded in layers, later overriding earlier:
//!
//! 1. Compiled defaults ([`NodeConfig::default`])
//! 2. Optional TOML file
//! 3. `KEEL_*` environment variables (`KEEL_CHAIN_ID=7`, `KEEL_DATA_DIR=/srv/keel`)
//!
//! ```toml
//! data_dir = "/var/lib/keel"
//! chain_id = 1
//! block_reward = 5
//! total_supply = 10000000000
//! genesis_address = "6b0c...e1"
//! log_level = "info"
//! log_format = "text"
//! ```

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use keel_core::constants::{DEFAULT_BLOCK_REWARD, DEFAULT_CHAIN_ID, DEFAULT_TOTAL_SUPPLY};
use keel_core::genesis::default_genesis_owner;
use keel_core::types::Hash256;

/// Configuration for a node instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    pub chain_id: u32,
    /// Coinbase value of every minted block after genesis.
    pub block_reward: u64,
    /// Value paid by the genesis coinbase.
    pub total_supply: u64,
    /// Hex pubkey hash receiving the genesis supply. Falls back to
    /// [`default_genesis_owner`] when unset.
    pub genesis_address: Option<String>,
    /// Log level filter string (e.g. "info", "keel_node_lib=debug").
    pub log_level: String,
    /// "text" or "json".
    pub log_format: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keel");

        Self {
            data_dir,
            chain_id: DEFAULT_CHAIN_ID,
            block_reward: DEFAULT_BLOCK_REWARD,
            total_supply: DEFAULT_TOTAL_SUPPLY,
            genesis_address: None,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load defaults, then `path` if given and present, then `KEEL_*` env vars.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be parsed or a value has the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder
            .add_source(
                Environment::with_prefix("KEEL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Path to the RocksDB chain data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("chaindata")
    }

    /// Default archive file written by `store_blocks`.
    pub fn archive_path(&self) -> PathBuf {
        self.data_dir.join("blocks.dat")
    }

    /// Address credited by genesis.
    pub fn genesis_owner(&self) -> Result<Hash256, hex::FromHexError> {
        match &self.genesis_address {
            Some(hex_str) => Hash256::from_hex(hex_str),
            None => Ok(default_genesis_owner()),
        }
    }
}
