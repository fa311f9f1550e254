//! Configuration for AutoDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{AutoDbError, Result};

/// Main configuration for an AutoDB instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all table files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── 506f696e74.adbt   (one file per stored type, hex of type id)
    ///     └── ...
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync table files
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Record Configuration
    // -------------------------------------------------------------------------
    /// Largest encoded record accepted on write or on load (in bytes)
    pub max_record_size: usize,
}

/// Table file sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every frame (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced frames (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Per-table settings, derived from [`Config`]
#[derive(Debug, Clone, Copy)]
pub struct TableOptions {
    pub sync_strategy: SyncStrategy,
    pub max_record_size: usize,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            sync_strategy: SyncStrategy::EveryWrite,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
        }
    }
}

/// 16 MB
pub const DEFAULT_MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./autodb_data"),
            sync_strategy: SyncStrategy::EveryWrite,
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Settings handed to every table opened under this config
    pub fn table_options(&self) -> TableOptions {
        TableOptions {
            sync_strategy: self.sync_strategy,
            max_record_size: self.max_record_size,
        }
    }

    /// Reject settings that would make every write or load fail
    pub fn validate(&self) -> Result<()> {
        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(AutoDbError::Config(
                "sync_strategy EveryNEntries requires count > 0".to_string(),
            ));
        }
        if self.max_record_size == 0 || self.max_record_size > u32::MAX as usize {
            return Err(AutoDbError::Config(format!(
                "max_record_size must be in 1..={}, got {}",
                u32::MAX,
                self.max_record_size
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all table files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the maximum encoded record size (in bytes)
    pub fn max_record_size(mut self, size: usize) -> Self {
        self.config.max_record_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

