use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::CacheError;

/// A value held by the state cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CacheValue {
    Counter(i64),
    Text(String),
    Structured(serde_json::Value),
}

impl CacheValue {
    pub fn as_counter(&self) -> Option<i64> {
        match self {
            Self::Counter(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Structured(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Volatile shared state with per-key TTL.
///
/// Every single-key operation is atomic. Nothing is promised across keys.
/// `ttl == None` keeps the entry until it is deleted or evicted.
pub trait StateCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheValue>, CacheError>;

    fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Add `delta` to a counter, creating it at 0 when absent. Returns the
    /// new value. A present non-counter value is a `TypeMismatch`.
    fn incr_by(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64, CacheError>;

    fn decr_by(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64, CacheError> {
        self.incr_by(key, delta.saturating_neg(), ttl)
    }

    /// Replace the value at `key` with `new` only if it currently equals
    /// `expected` (`None` meaning absent). Returns whether the swap happened.
    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&CacheValue>,
        new: CacheValue,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError>;

    /// Returns whether a value was removed.
    fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every key starting with `prefix`; returns how many went.
    fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;
}
