//! Top-level error for administrative operations on the engine.

use super::error_code::{self, TurnstileErrorCode};
use super::{CacheError, ConfigError, DispatchError, RuleStoreError};

/// Errors surfaced to the administrative API.
///
/// These are caller or configuration errors, never access verdicts: a
/// denied swipe is a successful `DecisionResult` with `allowed == false`.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("{kind} rule {rule_id} not found")]
    RuleNotFound { kind: &'static str, rule_id: i64 },

    #[error("detection record {record_id} not found")]
    RecordNotFound { record_id: String },

    #[error("invalid argument {field}: {message}")]
    InvalidArgument { field: String, message: String },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Rule store error: {0}")]
    RuleStore(#[from] RuleStoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

impl TurnstileErrorCode for AccessError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::RuleNotFound { .. } => error_code::RULE_NOT_FOUND,
            Self::RecordNotFound { .. } => error_code::RECORD_NOT_FOUND,
            Self::InvalidArgument { .. } => error_code::INVALID_ARGUMENT,
            Self::Cache(e) => e.error_code(),
            Self::RuleStore(e) => e.error_code(),
            Self::Config(e) => e.error_code(),
            Self::Dispatch(e) => e.error_code(),
        }
    }
}

/// Convenience alias used across the workspace.
pub type AccessResult<T> = Result<T, AccessError>;
