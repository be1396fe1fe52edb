//! Configuration system for Turnstile.
//! TOML-based, 4-layer resolution: env > project > user > defaults.

pub mod anti_passback_config;
pub mod cache_config;
pub mod capacity_config;
pub mod dispatch_config;
pub mod engine_config;
pub mod turnstile_config;

pub use anti_passback_config::{AntiPassbackSettings, TtlPolicy};
pub use cache_config::CacheConfig;
pub use capacity_config::CapacitySettings;
pub use dispatch_config::DispatchConfig;
pub use engine_config::EngineConfig;
pub use turnstile_config::TurnstileConfig;
