//! In-memory state cache using moka.
//!
//! Per-entry TTL through moka's `Expiry`, atomic read-modify-write through
//! `and_compute_with`. Suitable for tests and single-node deployments.

use std::time::{Duration, Instant};

use moka::ops::compute::Op;
use moka::sync::Cache;
use moka::Expiry;
use tracing::trace;

use turnstile_core::config::CacheConfig;
use turnstile_core::errors::CacheError;
use turnstile_core::traits::{CacheValue, StateCache};

use crate::stats::{CacheStats, Counters};

#[derive(Debug, Clone)]
struct Slot {
    value: CacheValue,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: CacheValue, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            value,
            expires_at: ttl.map(|t| now + t),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |t| now < t)
    }

    fn remaining(&self, now: Instant) -> Option<Duration> {
        self.expires_at.map(|t| t.saturating_duration_since(now))
    }
}

/// Expiry driven by the absolute deadline stored in each slot, so an
/// update without a TTL keeps the deadline it already had.
struct SlotExpiry;

impl Expiry<String, Slot> for SlotExpiry {
    fn expire_after_create(&self, _key: &String, slot: &Slot, created_at: Instant) -> Option<Duration> {
        slot.remaining(created_at)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        slot: &Slot,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        slot.remaining(updated_at)
    }
}

/// `StateCache` backed by a bounded moka cache.
pub struct MemoryStateCache {
    cache: Cache<String, Slot>,
    counters: Counters,
}

impl MemoryStateCache {
    /// Create a cache holding at most `max_entries` keys.
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(SlotExpiry)
            .build();
        Self {
            cache,
            counters: Counters::default(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.effective_max_entries())
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks();
        self.counters.snapshot(self.cache.entry_count())
    }

    pub fn reset_stats(&self) {
        self.counters.reset();
    }

    /// Number of live entries.
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }
}

impl Default for MemoryStateCache {
    fn default() -> Self {
        Self::new(turnstile_core::constants::DEFAULT_CACHE_MAX_ENTRIES)
    }
}

impl StateCache for MemoryStateCache {
    fn get(&self, key: &str) -> Result<Option<CacheValue>, CacheError> {
        let now = Instant::now();
        let value = self
            .cache
            .get(key)
            .filter(|slot| slot.is_live(now))
            .map(|slot| slot.value);
        self.counters.record(value.is_some());
        Ok(value)
    }

    fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.cache
            .insert(key.to_string(), Slot::new(value, ttl, Instant::now()));
        Ok(())
    }

    fn incr_by(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64, CacheError> {
        let mut outcome = Ok(0);
        self.cache.entry_by_ref(key).and_compute_with(|entry| {
            let now = Instant::now();
            let current = entry.map(|e| e.into_value()).filter(|s| s.is_live(now));
            let (base, expires_at) = match current {
                None => (0, None),
                Some(slot) => match slot.value.as_counter() {
                    Some(n) => (n, slot.expires_at),
                    None => {
                        outcome = Err(CacheError::TypeMismatch {
                            key: key.to_string(),
                            expected: "counter",
                        });
                        return Op::Nop;
                    }
                },
            };
            let next = base.saturating_add(delta);
            outcome = Ok(next);
            Op::Put(Slot {
                value: CacheValue::Counter(next),
                expires_at: ttl.map(|t| now + t).or(expires_at),
            })
        });
        if let Ok(n) = outcome {
            trace!(cache_key = key, delta, value = n, "incr");
        }
        outcome
    }

    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&CacheValue>,
        new: CacheValue,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        let mut swapped = false;
        self.cache.entry_by_ref(key).and_compute_with(|entry| {
            let now = Instant::now();
            let current = entry.map(|e| e.into_value()).filter(|s| s.is_live(now));
            if current.as_ref().map(|s| &s.value) != expected {
                return Op::Nop;
            }
            swapped = true;
            Op::Put(Slot::new(new, ttl, now))
        });
        trace!(cache_key = key, swapped, "compare_and_set");
        Ok(swapped)
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        Ok(self.cache.remove(key).is_some_and(|slot| slot.is_live(now)))
    }

    fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        self.cache.run_pending_tasks();
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.as_ref().clone())
            .collect();
        let removed = keys
            .iter()
            .filter(|k| self.cache.remove(k.as_str()).is_some())
            .count();
        trace!(prefix, removed, "delete_prefix");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let cache = MemoryStateCache::new(100);
        cache.set("a", CacheValue::Text("x".into()), None).unwrap();
        assert_eq!(cache.get("a").unwrap(), Some(CacheValue::Text("x".into())));
        assert_eq!(cache.get("missing").unwrap(), None);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn incr_creates_and_accumulates() {
        let cache = MemoryStateCache::new(100);
        assert_eq!(cache.incr_by("n", 5, None).unwrap(), 5);
        assert_eq!(cache.decr_by("n", 2, None).unwrap(), 3);
        assert_eq!(cache.get("n").unwrap(), Some(CacheValue::Counter(3)));
    }

    #[test]
    fn incr_on_structured_is_type_mismatch() {
        let cache = MemoryStateCache::new(100);
        cache
            .set("s", CacheValue::Structured(serde_json::json!({"a": 1})), None)
            .unwrap();
        assert!(matches!(
            cache.incr_by("s", 1, None),
            Err(CacheError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn cas_requires_expected_value() {
        let cache = MemoryStateCache::new(100);
        assert!(cache.compare_and_set("k", None, CacheValue::Counter(1), None).unwrap());
        assert!(!cache.compare_and_set("k", None, CacheValue::Counter(2), None).unwrap());
        assert!(cache
            .compare_and_set("k", Some(&CacheValue::Counter(1)), CacheValue::Counter(2), None)
            .unwrap());
        assert_eq!(cache.get("k").unwrap(), Some(CacheValue::Counter(2)));
    }

    #[test]
    fn delete_prefix_only_touches_matching_keys() {
        let cache = MemoryStateCache::new(100);
        for key in ["area:1:count", "area:1:blocked", "area:10:count"] {
            cache.set(key, CacheValue::Counter(1), None).unwrap();
        }
        assert_eq!(cache.delete_prefix("area:1:").unwrap(), 2);
        assert_eq!(cache.get("area:10:count").unwrap(), Some(CacheValue::Counter(1)));
        assert!(!cache.delete("area:1:count").unwrap());
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = MemoryStateCache::new(100);
        cache
            .set("t", CacheValue::Counter(1), Some(Duration::from_millis(30)))
            .unwrap();
        assert!(cache.get("t").unwrap().is_some());
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(cache.get("t").unwrap(), None);
    }

    #[test]
    fn incr_without_ttl_keeps_existing_deadline() {
        let cache = MemoryStateCache::new(100);
        cache.incr_by("c", 1, Some(Duration::from_millis(30))).unwrap();
        cache.incr_by("c", 1, None).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(cache.get("c").unwrap(), None);
    }
}
