//! Bounded compare-and-set loops over a single cache key.

use std::time::Duration;

use turnstile_core::errors::CacheError;
use turnstile_core::traits::{CacheValue, StateCache};

/// What one attempt decided after looking at the current value.
pub(crate) enum Step<T> {
    /// Swap in the value, then return `T`.
    Write(CacheValue, T),
    /// Leave the key alone and return `T`.
    Done(T),
}

/// Read `key`, let `decide` look at it, and swap in its answer. Re-reads and
/// re-decides whenever another writer got there first, at most `attempts`
/// times.
pub(crate) fn update<T>(
    cache: &dyn StateCache,
    key: &str,
    ttl: Option<Duration>,
    attempts: u32,
    mut decide: impl FnMut(Option<&CacheValue>) -> Step<T>,
) -> Result<T, CacheError> {
    for _ in 0..attempts.max(1) {
        let current = cache.get(key)?;
        match decide(current.as_ref()) {
            Step::Done(out) => return Ok(out),
            Step::Write(next, out) => {
                if cache.compare_and_set(key, current.as_ref(), next, ttl)? {
                    return Ok(out);
                }
                tracing::trace!(cache_key = key, "compare-and-set lost, retrying");
            }
        }
    }
    Err(CacheError::Contended {
        key: key.to_string(),
        attempts: attempts.max(1),
    })
}
