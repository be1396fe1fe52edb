//! TurnstileErrorCode trait for the administrative API boundary.

/// Every error enum implements this to give administrative callers a stable
/// code string alongside the human-readable message.
pub trait TurnstileErrorCode {
    /// Returns the error code string (e.g., "RULE_NOT_FOUND").
    fn error_code(&self) -> &'static str;

    /// Returns the formatted API string: `[ERROR_CODE] message`.
    fn api_string(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }
}

pub const CACHE_ERROR: &str = "CACHE_ERROR";
pub const CACHE_SCHEMA_MISMATCH: &str = "CACHE_SCHEMA_MISMATCH";
pub const CACHE_CONTENDED: &str = "CACHE_CONTENDED";
pub const RULE_STORE_ERROR: &str = "RULE_STORE_ERROR";
pub const INVALID_RULE: &str = "INVALID_RULE";
pub const RULE_NOT_FOUND: &str = "RULE_NOT_FOUND";
pub const RECORD_NOT_FOUND: &str = "RECORD_NOT_FOUND";
pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const GATEWAY_ERROR: &str = "GATEWAY_ERROR";
pub const DISPATCH_ERROR: &str = "DISPATCH_ERROR";
pub const QUEUE_FULL: &str = "QUEUE_FULL";
