//! Concurrent writers against one key must never lose an update.

use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use turnstile_cache::MemoryStateCache;
use turnstile_core::traits::{CacheValue, StateCache};

const THREADS: usize = 8;
const OPS: usize = 500;

#[test]
fn concurrent_incr_is_exact() {
    let cache = Arc::new(MemoryStateCache::new(1_000));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..OPS {
                    cache.incr_by("area:1:count", 1, None).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(
        cache.get("area:1:count").unwrap(),
        Some(CacheValue::Counter((THREADS * OPS) as i64))
    );
}

#[test]
fn concurrent_cas_loops_are_exact() {
    let cache = Arc::new(MemoryStateCache::new(1_000));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..OPS {
                    loop {
                        let current = cache.get("k").unwrap();
                        let n = current.as_ref().and_then(CacheValue::as_counter).unwrap_or(0);
                        if cache
                            .compare_and_set("k", current.as_ref(), CacheValue::Counter(n + 1), None)
                            .unwrap()
                        {
                            break;
                        }
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(cache.get("k").unwrap(), Some(CacheValue::Counter((THREADS * OPS) as i64)));
}

proptest! {
    /// Any sequence of increments and decrements ends at their sum.
    #[test]
    fn incr_sequence_sums(deltas in proptest::collection::vec(-100i64..100, 1..50)) {
        let cache = MemoryStateCache::new(100);
        for d in &deltas {
            cache.incr_by("k", *d, None).unwrap();
        }
        let expected: i64 = deltas.iter().sum();
        prop_assert_eq!(cache.get("k").unwrap(), Some(CacheValue::Counter(expected)));
    }
}
