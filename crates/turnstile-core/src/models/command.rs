//! Side-effect commands queued for the device gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{AreaId, DetectionRecord, DoorId, RuleId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    AntiPassbackViolation,
    CapacityThreshold,
    CapacityOverrun,
}

/// Operator-facing alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessAlert {
    pub kind: AlertKind,
    pub user_id: Option<UserId>,
    pub area_id: AreaId,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

/// Fire-and-forget work for dispatcher workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DeviceCommand {
    LockDoors {
        rule_id: RuleId,
        area_id: AreaId,
        door_ids: Vec<DoorId>,
        /// Controller-side relock delay for timed interlocks.
        hold: Option<Duration>,
    },
    UnlockDoors {
        rule_id: RuleId,
        area_id: AreaId,
        door_ids: Vec<DoorId>,
    },
    RaiseAlert(AccessAlert),
    RecordDetection(DetectionRecord),
}

impl DeviceCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LockDoors { .. } => "lock_doors",
            Self::UnlockDoors { .. } => "unlock_doors",
            Self::RaiseAlert(_) => "raise_alert",
            Self::RecordDetection(_) => "record_detection",
        }
    }

    /// Whether executing the command talks to the device gateway.
    pub fn touches_gateway(&self) -> bool {
        !matches!(self, Self::RecordDetection(_))
    }
}
