//! Rule store errors.

use super::error_code::{self, TurnstileErrorCode};

/// Errors raised while loading or reading rule configuration.
#[derive(Debug, thiserror::Error)]
pub enum RuleStoreError {
    #[error("rule store unavailable: {message}")]
    Unavailable { message: String },

    #[error("rule file {path} could not be parsed: {message}")]
    Parse { path: String, message: String },

    #[error("invalid rule {rule}: {message}")]
    InvalidRule { rule: String, message: String },
}

impl TurnstileErrorCode for RuleStoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRule { .. } => error_code::INVALID_RULE,
            _ => error_code::RULE_STORE_ERROR,
        }
    }
}
