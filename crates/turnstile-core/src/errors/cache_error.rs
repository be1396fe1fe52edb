//! State cache errors.

use super::error_code::{self, TurnstileErrorCode};

/// Errors raised by a `StateCache` backend.
///
/// Evaluators never propagate these into a verdict: a failing cache is
/// treated as "no prior state" and the error is logged.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("state cache unavailable: {message}")]
    Unavailable { message: String },

    #[error("cache value for {key} could not be (de)serialized: {message}")]
    Serialization { key: String, message: String },

    #[error("cache value for {key} is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("cache value for {key} has schema v{found}, supported up to v{supported}")]
    SchemaMismatch { key: String, found: u16, supported: u16 },

    #[error("compare-and-set on {key} lost {attempts} times in a row")]
    Contended { key: String, attempts: u32 },
}

impl TurnstileErrorCode for CacheError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SchemaMismatch { .. } => error_code::CACHE_SCHEMA_MISMATCH,
            Self::Contended { .. } => error_code::CACHE_CONTENDED,
            _ => error_code::CACHE_ERROR,
        }
    }
}
