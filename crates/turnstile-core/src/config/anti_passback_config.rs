//! Anti-passback evaluator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_ANTI_PASSBACK_CACHE_TTL_SECS, DEFAULT_CAS_RETRIES, DEFAULT_PASS_HISTORY_LIMIT,
};

/// How long a pass history lives in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TtlPolicy {
    /// Always `cache_ttl_secs`, regardless of the config's window.
    #[default]
    Fixed,
    /// The config's `time_window_ms`, rounded up to whole minutes.
    Window,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AntiPassbackSettings {
    /// Default: 1800 (30 minutes).
    pub cache_ttl_secs: Option<u64>,
    pub ttl_policy: Option<TtlPolicy>,
    /// Pass stamps kept per scope. Default: 10.
    pub history_limit: Option<usize>,
    pub cas_retries: Option<u32>,
}

impl AntiPassbackSettings {
    pub fn effective_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs.unwrap_or(DEFAULT_ANTI_PASSBACK_CACHE_TTL_SECS))
    }

    pub fn effective_ttl_policy(&self) -> TtlPolicy {
        self.ttl_policy.unwrap_or_default()
    }

    pub fn effective_history_limit(&self) -> usize {
        self.history_limit.unwrap_or(DEFAULT_PASS_HISTORY_LIMIT)
    }

    pub fn effective_cas_retries(&self) -> u32 {
        self.cas_retries.unwrap_or(DEFAULT_CAS_RETRIES)
    }

    /// Cache TTL for an entry governed by a `window_ms` pass window.
    pub fn ttl_for_window(&self, window_ms: u64) -> Duration {
        match self.effective_ttl_policy() {
            TtlPolicy::Fixed => self.effective_cache_ttl(),
            TtlPolicy::Window => {
                let minutes = window_ms.div_ceil(60_000).max(1);
                Duration::from_secs(minutes * 60)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_policy_rounds_up_to_minutes() {
        let s = AntiPassbackSettings {
            ttl_policy: Some(TtlPolicy::Window),
            ..Default::default()
        };
        assert_eq!(s.ttl_for_window(90_000), Duration::from_secs(120));
        assert_eq!(s.ttl_for_window(1), Duration::from_secs(60));
    }

    #[test]
    fn fixed_policy_ignores_window() {
        let s = AntiPassbackSettings::default();
        assert_eq!(s.ttl_for_window(5_000), Duration::from_secs(1800));
    }
}
