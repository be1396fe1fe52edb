//! # turnstile-rules
//!
//! Rule snapshots loaded from TOML and an in-memory `RuleStore` that swaps
//! whole snapshots atomically.

pub mod snapshot;
pub mod store;

pub use snapshot::{RuleSnapshot, ScopedRules};
pub use store::InMemoryRuleStore;
