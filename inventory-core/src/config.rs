//! Configuration for the stores

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/store"),
            rocksdb: RocksDbConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Balance-write conflict retry limit. Optimistic transactions on a hot
    /// buyer account retry up to this many times before surfacing contention.
    pub max_txn_retries: u32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
            max_txn_retries: 32,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("VENDKIT_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data_dir, PathBuf::from("./data/store"));
        assert_eq!(config.rocksdb.max_txn_retries, 32);
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            data_dir = "/tmp/vendkit"

            [rocksdb]
            write_buffer_size_mb = 16
            max_write_buffer_number = 2
            max_background_jobs = 2
            max_txn_retries = 8
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/vendkit"));
        assert_eq!(config.rocksdb.write_buffer_size_mb, 16);
        assert_eq!(config.rocksdb.max_txn_retries, 8);
    }
}
