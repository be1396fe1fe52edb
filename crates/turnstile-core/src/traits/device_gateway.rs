use std::time::Duration;

use crate::errors::GatewayError;
use crate::models::{AccessAlert, DoorId};

/// Physical door controllers and the operator alert channel.
///
/// Only dispatcher workers call this; calls may block.
pub trait DeviceGateway: Send + Sync {
    fn lock_doors(&self, door_ids: &[DoorId], hold: Option<Duration>) -> Result<(), GatewayError>;

    fn unlock_doors(&self, door_ids: &[DoorId]) -> Result<(), GatewayError>;

    fn raise_alert(&self, alert: &AccessAlert) -> Result<(), GatewayError>;
}
