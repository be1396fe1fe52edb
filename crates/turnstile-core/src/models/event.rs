//! Inbound swipe events.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AreaId, DetectForm, DeviceId, DoorId, UserId};

/// Kind of access event reported by a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessEventType {
    Entry,
    Exit,
    DoorOpen,
    DoorClose,
}

impl AccessEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "ENTRY",
            Self::Exit => "EXIT",
            Self::DoorOpen => "DOOR_OPEN",
            Self::DoorClose => "DOOR_CLOSE",
        }
    }

    /// Events that admit someone into the area and therefore count as a pass.
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Entry | Self::DoorOpen)
    }
}

impl fmt::Display for AccessEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_headcount() -> u32 {
    1
}

/// A single swipe, as received from event ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub user_id: UserId,
    pub device_id: DeviceId,
    pub area_id: AreaId,
    #[serde(default)]
    pub door_id: Option<DoorId>,
    pub event_type: AccessEventType,
    /// Administrator override: bypasses anti-passback entirely.
    #[serde(default)]
    pub skip_detection: bool,
    /// People admitted by this swipe (group entry). Defaults to 1.
    #[serde(default = "default_headcount")]
    pub headcount: u32,
}

impl AccessEvent {
    fn new(user_id: UserId, device_id: DeviceId, area_id: AreaId, event_type: AccessEventType) -> Self {
        Self {
            user_id,
            device_id,
            area_id,
            door_id: None,
            event_type,
            skip_detection: false,
            headcount: 1,
        }
    }

    pub fn entry(user_id: UserId, device_id: DeviceId, area_id: AreaId) -> Self {
        Self::new(user_id, device_id, area_id, AccessEventType::Entry)
    }

    pub fn exit(user_id: UserId, device_id: DeviceId, area_id: AreaId) -> Self {
        Self::new(user_id, device_id, area_id, AccessEventType::Exit)
    }

    pub fn door_open(user_id: UserId, device_id: DeviceId, area_id: AreaId, door_id: DoorId) -> Self {
        Self::new(user_id, device_id, area_id, AccessEventType::DoorOpen).with_door(door_id)
    }

    pub fn door_close(user_id: UserId, device_id: DeviceId, area_id: AreaId, door_id: DoorId) -> Self {
        Self::new(user_id, device_id, area_id, AccessEventType::DoorClose).with_door(door_id)
    }

    pub fn with_door(mut self, door_id: DoorId) -> Self {
        self.door_id = Some(door_id);
        self
    }

    pub fn with_headcount(mut self, headcount: u32) -> Self {
        self.headcount = headcount;
        self
    }

    pub fn with_skip_detection(mut self) -> Self {
        self.skip_detection = true;
        self
    }

    /// The anti-passback view of this event.
    pub fn detect_form(&self) -> DetectForm {
        DetectForm {
            user_id: self.user_id,
            device_id: self.device_id,
            area_id: self.area_id,
            skip_detection: self.skip_detection,
        }
    }
}
