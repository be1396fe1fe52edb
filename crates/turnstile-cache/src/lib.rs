//! # turnstile-cache
//!
//! `StateCache` implementations. The in-memory backend is a `moka` cache
//! with per-entry expiry; every single-key operation runs inside moka's
//! per-key compute so concurrent writers never lose an update.

pub mod memory;
pub mod stats;

pub use memory::MemoryStateCache;
pub use stats::CacheStats;
