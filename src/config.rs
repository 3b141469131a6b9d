//! Configuration for StrataKV
//!
//! Centralized configuration with sensible defaults. Every tunable the
//! storage core reads lives here so tests can shrink thresholds freely.

use crate::error::{Result, StrataError};

/// Hard cap on skip list height
pub const MAX_LEVEL: usize = 16;

/// Main configuration for the storage core
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Footprint (key + value bytes) of the current table that triggers a freeze
    pub memtable_size_limit: usize,

    /// Frozen tables kept after `MemTable::flush`; the oldest beyond this are evicted
    pub max_frozen_tables: usize,

    // -------------------------------------------------------------------------
    // Skip List Configuration
    // -------------------------------------------------------------------------
    /// Maximum node height (1..=16)
    pub skiplist_max_level: usize,

    /// Probability of promoting a node one more level
    pub skiplist_probability: f64,

    /// Seed for level selection; `None` draws from OS entropy
    pub rng_seed: Option<u64>,

    // -------------------------------------------------------------------------
    // Block Configuration
    // -------------------------------------------------------------------------
    /// Encoded block capacity in bytes
    pub block_size: usize,

    /// Append (and reserve room for) a CRC32 trailer when encoding blocks
    pub block_checksum: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memtable_size_limit: 4 * 1024 * 1024, // 4 MB
            max_frozen_tables: 8,
            skiplist_max_level: MAX_LEVEL,
            skiplist_probability: 0.25,
            rng_seed: None,
            block_size: 4 * 1024, // 4 KB
            block_checksum: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values the storage core cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.memtable_size_limit == 0 {
            return Err(StrataError::Config(
                "memtable_size_limit must be greater than zero".to_string(),
            ));
        }

        if self.skiplist_max_level == 0 || self.skiplist_max_level > MAX_LEVEL {
            return Err(StrataError::Config(format!(
                "skiplist_max_level must be within 1..={}, got {}",
                MAX_LEVEL, self.skiplist_max_level
            )));
        }

        if !(self.skiplist_probability > 0.0 && self.skiplist_probability < 1.0) {
            return Err(StrataError::Config(format!(
                "skiplist_probability must be within (0, 1), got {}",
                self.skiplist_probability
            )));
        }

        // Empty block: 2-byte count, plus the optional 4-byte trailer
        let minimum = if self.block_checksum { 6 } else { 2 };
        if self.block_size <= minimum {
            return Err(StrataError::Config(format!(
                "block_size must exceed {} bytes, got {}",
                minimum, self.block_size
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
    /// Set the per-table freeze threshold (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set how many frozen tables survive a flush
    pub fn max_frozen_tables(mut self, count: usize) -> Self {
        self.config.max_frozen_tables = count;
        self
    }

    /// Set the maximum skip list height
    pub fn skiplist_max_level(mut self, level: usize) -> Self {
        self.config.skiplist_max_level = level;
        self
    }

    /// Set the level promotion probability
    pub fn skiplist_probability(mut self, p: f64) -> Self {
        self.config.skiplist_probability = p;
        self
    }

    /// Seed level selection for reproducible layouts
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.config.rng_seed = Some(seed);
        self
    }

    /// Set the block capacity (in bytes)
    pub fn block_size(mut self, size: usize) -> Self {
        self.config.block_size = size;
        self
    }

    /// Enable or disable the block checksum trailer
    pub fn block_checksum(mut self, enabled: bool) -> Self {
        self.config.block_checksum = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
