//! Configuration for caskstore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{CaskError, Result};

/// Default maximum size of a data segment before rollover (10000 KiB)
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = 10_000 * 1024;

/// Flags accepted by [`crate::store::open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOption {
    /// Allow mutation; the handle owns the active segment
    ReadWrite,

    /// fsync the active segment after every put/delete
    SyncOnPut,
}

/// Main configuration for a store handle
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── epoch_<g>_<s>        (data segments)
    ///     ├── hint_epoch_<g>_<s>   (hint files, written by merge)
    ///     ├── MERGED               (last committed merge generation)
    ///     └── LOCK                 (held by the read-write handle)
    pub data_dir: PathBuf,

    /// Segment size (bytes) that triggers a rollover to a new segment
    pub max_segment_size: u64,

    // -------------------------------------------------------------------------
    // Access Configuration
    // -------------------------------------------------------------------------
    /// Whether this handle may mutate the store
    pub read_write: bool,

    /// fsync after every write (safest, slowest)
    pub sync_on_put: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./caskstore_data"),
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            read_write: false,
            sync_on_put: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Build a config from a directory and a set of open flags
    pub fn from_options(data_dir: impl Into<PathBuf>, options: &[OpenOption]) -> Self {
        let mut config = Config {
            data_dir: data_dir.into(),
            ..Config::default()
        };
        for option in options {
            match option {
                OpenOption::ReadWrite => config.read_write = true,
                OpenOption::SyncOnPut => config.sync_on_put = true,
            }
        }
        config
    }

    /// Check option ranges
    ///
    /// Value offsets are stored as 4-byte signed ints, so a segment may
    /// never grow past `i32::MAX` bytes.
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_size == 0 {
            return Err(CaskError::Config(
                "max_segment_size must be greater than zero".to_string(),
            ));
        }
        if self.max_segment_size > i32::MAX as u64 {
            return Err(CaskError::Config(format!(
                "max_segment_size {} exceeds the {} byte addressable limit",
                self.max_segment_size,
                i32::MAX
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
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the segment rollover threshold (in bytes)
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.config.max_segment_size = size;
        self
    }

    /// Open the store read-write
    pub fn read_write(mut self, enabled: bool) -> Self {
        self.config.read_write = enabled;
        self
    }

    /// Sync after every put/delete
    pub fn sync_on_put(mut self, enabled: bool) -> Self {
        self.config.sync_on_put = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
