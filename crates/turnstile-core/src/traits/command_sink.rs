use crate::models::DeviceCommand;

/// Where evaluators drop side effects. Never blocks.
pub trait CommandSink: Send + Sync {
    /// Returns `false` when the command was dropped.
    fn submit(&self, command: DeviceCommand) -> bool;
}

/// Discards every command. For callers that want decisions only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl CommandSink for NullSink {
    fn submit(&self, _command: DeviceCommand) -> bool {
        false
    }
}
