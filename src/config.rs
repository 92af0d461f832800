//! Node configuration
//!
//! Stored as pretty JSON at `<data_dir>/config.json`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::algorithm::AihashConfig;

/// Config file name inside the data directory
pub const CONFIG_FILE: &str = "config.json";

/// Cache database directory inside the data directory
pub const CACHE_DB_DIR: &str = "caches";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File I/O error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    InvalidFormat(#[from] serde_json::Error),

    #[error("Invalid algorithm parameters: {0}")]
    InvalidParams(#[from] crate::algorithm::AihashError),
}

/// Which parameter preset the node runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn params(self) -> AihashConfig {
        match self {
            Network::Mainnet => AihashConfig::mainnet(),
            Network::Testnet => AihashConfig::testnet(),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Worker threads; `None` means one per CPU core
    pub threads: Option<usize>,
    /// Leading zero bits required of a digest
    pub difficulty: u32,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            threads: None,
            difficulty: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub network: Network,
    pub data_dir: PathBuf,
    pub aihash: AihashConfig,
    #[serde(default)]
    pub mining: MiningConfig,
}

impl NodeConfig {
    /// Fresh config for `network` rooted at `data_dir`
    pub fn new(network: Network, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            network,
            data_dir: data_dir.into(),
            aihash: network.params(),
            mining: MiningConfig::default(),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.data_dir.join(CACHE_DB_DIR)
    }

    /// Load `<data_dir>/config.json`
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(data_dir.join(CONFIG_FILE))?;
        let config: NodeConfig = serde_json::from_str(&content)?;
        config.aihash.validate()?;
        Ok(config)
    }

    /// Write the config, creating the data directory if needed
    pub fn save(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.data_dir)?;
        let content = serde_json::to_string_pretty(self)?;
        fs::write(self.config_path(), content)?;
        Ok(())
    }

    /// Load the config if present, otherwise fall back to the `network` preset
    pub fn load_or_default(data_dir: &Path, network: Network) -> Result<Self, ConfigError> {
        if data_dir.join(CONFIG_FILE).exists() {
            Self::load(data_dir)
        } else {
            Ok(Self::new(network, data_dir))
        }
    }
}

/// Get the default data directory for `network`
#[cfg(feature = "cli")]
pub fn default_data_dir(network: Network) -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let root = home.join(".aihash");
    match network {
        Network::Mainnet => root,
        Network::Testnet => root.join("testnet"),
    }
}
