//! RecentPassEntry: the cache value schema for anti-passback windows.

use serde::{Deserialize, Serialize};

use super::{AreaId, DeviceId};
use crate::errors::CacheError;
use crate::traits::CacheValue;

/// Bump when the stored shape changes. Readers reject newer versions.
pub const RECENT_PASS_SCHEMA_VERSION: u16 = 1;

/// One recorded pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStamp {
    pub at_ms: i64,
    pub device_id: DeviceId,
    pub area_id: AreaId,
}

/// Pass history for one anti-passback scope.
///
/// Created on the first pass in a window, refreshed on each subsequent
/// pass, and discarded by the cache TTL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentPassEntry {
    pub schema_version: u16,
    pub scope_key: String,
    pub last_pass_timestamp: i64,
    pub pass_count_in_window: u32,
    /// Newest first.
    pub passes: Vec<PassStamp>,
}

impl RecentPassEntry {
    pub fn new(scope_key: impl Into<String>) -> Self {
        Self {
            schema_version: RECENT_PASS_SCHEMA_VERSION,
            scope_key: scope_key.into(),
            last_pass_timestamp: 0,
            pass_count_in_window: 0,
            passes: Vec::new(),
        }
    }

    /// Passes at or after `now_ms - window_ms`.
    pub fn count_in_window(&self, now_ms: i64, window_ms: u64) -> u32 {
        let window_start = window_start(now_ms, window_ms);
        let count = self.passes.iter().filter(|p| p.at_ms >= window_start).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    pub fn latest(&self) -> Option<&PassStamp> {
        self.passes.first()
    }

    /// Record a pass, keep at most `history_limit` stamps, and recompute
    /// the in-window count.
    pub fn record_pass(&mut self, stamp: PassStamp, history_limit: usize, window_ms: u64) {
        self.passes.insert(0, stamp);
        self.passes.truncate(history_limit.max(1));
        self.last_pass_timestamp = stamp.at_ms;
        self.pass_count_in_window = self.count_in_window(stamp.at_ms, window_ms);
    }

    pub fn to_cache_value(&self, key: &str) -> Result<CacheValue, CacheError> {
        serde_json::to_value(self)
            .map(CacheValue::Structured)
            .map_err(|e| CacheError::Serialization {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    pub fn from_cache_value(key: &str, value: &CacheValue) -> Result<Self, CacheError> {
        let CacheValue::Structured(json) = value else {
            return Err(CacheError::TypeMismatch {
                key: key.to_string(),
                expected: "structured recent-pass entry",
            });
        };
        let entry: RecentPassEntry =
            serde_json::from_value(json.clone()).map_err(|e| CacheError::Serialization {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        if entry.schema_version > RECENT_PASS_SCHEMA_VERSION {
            return Err(CacheError::SchemaMismatch {
                key: key.to_string(),
                found: entry.schema_version,
                supported: RECENT_PASS_SCHEMA_VERSION,
            });
        }
        Ok(entry)
    }
}

fn window_start(now_ms: i64, window_ms: u64) -> i64 {
    now_ms.saturating_sub(i64::try_from(window_ms).unwrap_or(i64::MAX))
}
