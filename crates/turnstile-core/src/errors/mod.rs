//! Error handling for Turnstile.
//! One error enum per subsystem, `thiserror` only.

pub mod access_error;
pub mod cache_error;
pub mod config_error;
pub mod dispatch_error;
pub mod error_code;
pub mod gateway_error;
pub mod rule_store_error;

pub use access_error::{AccessError, AccessResult};
pub use cache_error::CacheError;
pub use config_error::ConfigError;
pub use dispatch_error::DispatchError;
pub use error_code::TurnstileErrorCode;
pub use gateway_error::GatewayError;
pub use rule_store_error::RuleStoreError;
