//! Configuration for fatvol
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, VolumeError};

/// Smallest block size accepted: must hold several directory entries.
pub const MIN_BLOCK_SIZE: u32 = 512;

/// Largest block size accepted.
pub const MAX_BLOCK_SIZE: u32 = 1024 * 1024;

/// Main configuration for a volume
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Image Configuration
    // -------------------------------------------------------------------------
    /// Host file holding the whole volume image
    pub image_path: PathBuf,

    /// Durability of each persist
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Geometry (only used by `Engine::create`; `open` reads it from the header)
    // -------------------------------------------------------------------------
    /// Target volume size in bytes
    pub total_space: u64,

    /// Block size in bytes
    pub block_size: u32,

    /// How many blocks the directory region gets
    pub directory_sizing: DirectorySizing,
}

/// Image sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Flush to the OS after every persist, leave writeback to it
    Buffered,

    /// fsync after every persist
    Fsync,
}

/// Directory region sizing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectorySizing {
    /// One directory slot for every block left after the header and table
    PerRemainingBlock,

    /// Room for at least this many directory entries
    Entries(u32),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_path: PathBuf::from("./fatvol.img"),
            sync_strategy: SyncStrategy::Fsync,
            total_space: 1024 * 1024, // 1 MB
            block_size: 4096,
            directory_sizing: DirectorySizing::PerRemainingBlock,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject geometry parameters the layout planner cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            return Err(VolumeError::Configuration(format!(
                "block size {} outside [{}, {}]",
                self.block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
            )));
        }
        if let DirectorySizing::Entries(0) = self.directory_sizing {
            return Err(VolumeError::Configuration(
                "directory must hold at least one entry".to_string(),
            ));
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
    /// Set the image file path
    pub fn image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.image_path = path.into();
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the target volume size (in bytes)
    pub fn total_space(mut self, bytes: u64) -> Self {
        self.config.total_space = bytes;
        self
    }

    /// Set the block size (in bytes)
    pub fn block_size(mut self, bytes: u32) -> Self {
        self.config.block_size = bytes;
        self
    }

    /// Set the directory sizing policy
    pub fn directory_sizing(mut self, sizing: DirectorySizing) -> Self {
        self.config.directory_sizing = sizing;
        self
    }

    /// Provision the directory for `count` entries
    pub fn max_files(self, count: u32) -> Self {
        self.directory_sizing(DirectorySizing::Entries(count))
    }

    pub fn build(self) -> Config {
        self.config
    }
}
