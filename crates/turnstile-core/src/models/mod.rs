//! Rule, event, decision, and side-effect models.

pub mod anti_passback;
pub mod capacity;
pub mod command;
pub mod decision;
pub mod event;
pub mod interlock;
pub mod recent_pass;
pub mod record;
pub mod scope;

pub use anti_passback::{
    AntiPassbackConfig, AntiPassbackMode, AntiPassbackViolation, DetectForm, DetectOutcome,
    DetectResult, RecentPassInfo, ViolationKind, ViolationResponse,
};
pub use capacity::{CapacityAction, CapacityMode, CapacityRule, OccupancySnapshot};
pub use command::{AccessAlert, AlertKind, DeviceCommand};
pub use decision::{DecisionResult, DecisionStage, PolicyKind, ResultCode};
pub use event::{AccessEvent, AccessEventType};
pub use interlock::{
    InterlockMode, InterlockOutcome, InterlockRule, InterlockStatus, InterlockTestReport,
    UnlockCondition,
};
pub use recent_pass::{PassStamp, RecentPassEntry, RECENT_PASS_SCHEMA_VERSION};
pub use record::{DetectionRecord, RecordFilter};
pub use scope::Scope;

/// Person / credential holder identifier.
pub type UserId = i64;
/// Physical area identifier.
pub type AreaId = i64;
/// Reader / terminal identifier.
pub type DeviceId = i64;
/// Door (lock actuator) identifier.
pub type DoorId = i64;
/// Configured rule identifier.
pub type RuleId = i64;
