//! Configuration for activity-index

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("activity-index")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory holding hosted partitions and the index database
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Domain used for user URLs when an identity carries no `@host` part
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Load partitions that are not hosted here through the external loader
    #[serde(default = "default_true")]
    pub allow_external_load: bool,

    /// Directory of replicated partitions (`<identity>.sled`) for external loads
    #[serde(default)]
    pub external_partitions_dir: Option<PathBuf>,

    /// sled page cache size per database
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity_bytes: u64,

    /// Known network origins (`hyper://<key>/`) and the identity owning each
    #[serde(default)]
    pub origins: BTreeMap<String, String>,
}

fn default_domain() -> String {
    "localhost".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cache_capacity() -> u64 {
    64 * 1024 * 1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            domain: default_domain(),
            allow_external_load: true,
            external_partitions_dir: None,
            cache_capacity_bytes: default_cache_capacity(),
            origins: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| IndexError::Config(e.to_string()))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| IndexError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Directory of hosted (locally owned) partitions
    pub fn partitions_dir(&self) -> PathBuf {
        self.storage_dir.join("partitions")
    }

    /// Path of the server partition holding the secondary indexes
    pub fn index_db_path(&self) -> PathBuf {
        self.storage_dir.join("index.sled")
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }
}
