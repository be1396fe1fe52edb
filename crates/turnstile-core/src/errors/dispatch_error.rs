//! Side-effect dispatcher errors.

use super::error_code::{self, TurnstileErrorCode};
use super::GatewayError;

/// Errors raised by the side-effect dispatcher. None of these ever reach a
/// swipe verdict; they are logged and counted.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("side-effect queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("side-effect queue disconnected")]
    Disconnected,

    #[error("device command failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("failed to spawn side-effect worker: {message}")]
    WorkerSpawn { message: String },

    #[error("side-effect worker panicked")]
    WorkerPanicked,
}

impl TurnstileErrorCode for DispatchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::QueueFull { .. } => error_code::QUEUE_FULL,
            Self::Gateway(e) => e.error_code(),
            _ => error_code::DISPATCH_ERROR,
        }
    }
}
