//! Configuration for the donation ledger

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the RocksDB database
    pub data_dir: PathBuf,
    /// Recompute totals from the records on open and fail if they
    /// disagree with the stored aggregate
    pub verify_on_open: bool,
    /// RocksDB tuning
    pub rocksdb: RocksDbConfig,
    /// Durability settings
    pub durability: DurabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/donations"),
            verify_on_open: true,
            rocksdb: RocksDbConfig::default(),
            durability: DurabilityConfig::default(),
        }
    }
}

/// RocksDB tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Memtable size in megabytes
    pub write_buffer_size_mb: usize,
    /// Number of memtables to keep in memory
    pub max_write_buffer_number: i32,
    /// Background compaction and flush threads
    pub max_background_jobs: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
        }
    }
}

/// Durability settings for the write path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurabilityConfig {
    /// Fsync every write batch before reporting it applied. Turning
    /// this off trades crash safety for throughput.
    pub sync_writes: bool,
}

impl Default for DurabilityConfig {
    fn default() -> Self {
        Self { sync_writes: true }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("TALLY_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(sync) = std::env::var("TALLY_SYNC_WRITES") {
            config.durability.sync_writes = sync != "false" && sync != "0";
        }

        config
    }
}
