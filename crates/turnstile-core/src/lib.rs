//! # turnstile-core
//!
//! Foundation crate for the Turnstile access-decision engine.
//! Defines the rule and event models, the cache key scheme, the seams to
//! external collaborators (rule store, state cache, device gateway),
//! errors, config, and tracing setup. Every other crate depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod keys;
pub mod models;
pub mod traits;
pub mod tracing;

// Re-export the most commonly used types at the crate root.
pub use config::TurnstileConfig;
pub use errors::{AccessError, AccessResult, CacheError, RuleStoreError, TurnstileErrorCode};
pub use models::{AccessEvent, AccessEventType, DecisionResult, ResultCode};
pub use traits::{Clock, CommandSink, DeviceGateway, RuleStore, StateCache};
