//! Device gateway errors.

use super::error_code::{self, TurnstileErrorCode};

/// Errors reported by the external device gateway.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("devices unreachable: {door_ids:?}")]
    DeviceUnreachable { door_ids: Vec<i64> },

    #[error("command rejected by controller: {message}")]
    Rejected { message: String },

    #[error("gateway timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl TurnstileErrorCode for GatewayError {
    fn error_code(&self) -> &'static str {
        error_code::GATEWAY_ERROR
    }
}
