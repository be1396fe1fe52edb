//! Side-effect dispatcher configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DISPATCH_QUEUE_CAPACITY, DEFAULT_DISPATCH_RECORD_LIMIT, DEFAULT_DISPATCH_WORKERS,
};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DispatchConfig {
    /// Bounded depth of each command queue. Default: 1024.
    pub queue_capacity: Option<usize>,
    /// Worker threads. Default: 2.
    pub workers: Option<usize>,
    /// Retry a failed device call once. Default: true.
    pub retry_once: Option<bool>,
    /// Detection records kept in memory; the oldest go first. Default: 100000.
    pub record_limit: Option<usize>,
}

impl DispatchConfig {
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(DEFAULT_DISPATCH_QUEUE_CAPACITY)
    }

    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or(DEFAULT_DISPATCH_WORKERS)
    }

    pub fn effective_retry_once(&self) -> bool {
        self.retry_once.unwrap_or(true)
    }

    pub fn effective_record_limit(&self) -> usize {
        self.record_limit.unwrap_or(DEFAULT_DISPATCH_RECORD_LIMIT)
    }
}
