//! State cache configuration.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CACHE_MAX_ENTRIES;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry cap for the in-memory cache. Default: 100_000.
    pub max_entries: Option<u64>,
}

impl CacheConfig {
    pub fn effective_max_entries(&self) -> u64 {
        self.max_entries.unwrap_or(DEFAULT_CACHE_MAX_ENTRIES)
    }
}
