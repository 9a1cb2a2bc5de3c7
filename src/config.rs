//! Configuration for rbdmeta
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for an rbdmeta engine
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for file-backed objects
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── {oid}.obj        (framed object state)
    ///     └── {oid}.lock       (transaction lock file)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Snapshot Table Configuration
    // -------------------------------------------------------------------------
    /// Page size when enumerating snapshot records
    pub max_keys_read: usize,

    // -------------------------------------------------------------------------
    // Legacy Header Configuration
    // -------------------------------------------------------------------------
    /// Upper bound on reads while waiting for a legacy header to stabilize
    pub max_header_reads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./rbdmeta_data"),
            max_keys_read: 64,
            max_header_reads: 16,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Raise limits to their usable minimums: a page must hold at least one
    /// key, and a legacy read needs one sizing read plus one full read
    pub fn clamped(mut self) -> Self {
        self.max_keys_read = self.max_keys_read.max(1);
        self.max_header_reads = self.max_header_reads.max(2);
        self
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for file-backed objects)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the enumeration page size (at least 1)
    pub fn max_keys_read(mut self, count: usize) -> Self {
        self.config.max_keys_read = count;
        self
    }

    /// Set the legacy header read bound (at least 2)
    pub fn max_header_reads(mut self, count: usize) -> Self {
        self.config.max_header_reads = count;
        self
    }

    pub fn build(self) -> Config {
        self.config.clamped()
    }
}
