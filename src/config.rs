//! Configuration options for the lsmkv storage core.

use crate::btree::{HEADER_LEN, PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default generation rotation threshold (256 MiB).
pub const DEFAULT_MEMTABLE_SIZE_THRESHOLD: usize = 256 * 1024 * 1024;

/// Configuration options for a [`Memtable`](crate::Memtable) and the flush driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Byte size (key + value bytes of live entries) at which the active
    /// generation is frozen and a new one started.
    /// Default: 256MB
    pub memtable_size_threshold: usize,

    /// Seed for tower height sampling. Generation `n` uses `seed + n`.
    /// `None` seeds every generation from OS entropy.
    /// Default: None
    pub tower_seed: Option<u64>,

    /// Upper bound on a leaf page's `size` when the flush driver packs pairs.
    /// Default: 4096 (a full page)
    pub leaf_fill_limit: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            memtable_size_threshold: DEFAULT_MEMTABLE_SIZE_THRESHOLD,
            tower_seed: None,
            leaf_fill_limit: PAGE_SIZE,
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the generation rotation threshold.
    pub fn memtable_size_threshold(mut self, size: usize) -> Self {
        self.memtable_size_threshold = size;
        self
    }

    /// Sets the tower height seed.
    pub fn tower_seed(mut self, seed: u64) -> Self {
        self.tower_seed = Some(seed);
        self
    }

    /// Sets the leaf fill limit used by the flush driver.
    pub fn leaf_fill_limit(mut self, limit: usize) -> Self {
        self.leaf_fill_limit = limit;
        self
    }

    /// Parses options from a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        let options: Options = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Reads options from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.memtable_size_threshold == 0 {
            return Err(crate::Error::invalid_argument("memtable_size_threshold must be > 0"));
        }
        if self.leaf_fill_limit <= HEADER_LEN || self.leaf_fill_limit > PAGE_SIZE {
            return Err(crate::Error::invalid_argument(format!(
                "leaf_fill_limit must be in ({}, {}]",
                HEADER_LEN, PAGE_SIZE
            )));
        }
        Ok(())
    }
}
