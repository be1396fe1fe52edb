//! Capacity (occupancy) control rules.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AreaId, RuleId};
use crate::errors::RuleStoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacityMode {
    /// Entries that would exceed the cap are denied.
    Strict,
    /// Entries are always allowed; overruns only warn.
    Warning,
}

impl CapacityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "STRICT",
            Self::Warning => "WARNING",
        }
    }
}

impl fmt::Display for CapacityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-area occupancy cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityRule {
    pub control_id: RuleId,
    pub area_id: AreaId,
    pub max_capacity: u32,
    /// Last persisted occupancy; used when the cache has no counter.
    #[serde(default)]
    pub current_count: u32,
    pub control_mode: CapacityMode,
    /// Occupancy at which an alert is raised.
    #[serde(default)]
    pub alert_threshold: Option<u32>,
    #[serde(default)]
    pub entry_blocked: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl CapacityRule {
    pub fn validate(&self) -> Result<(), RuleStoreError> {
        let invalid = |message: String| RuleStoreError::InvalidRule {
            rule: format!("capacity#{}", self.control_id),
            message,
        };
        if self.max_capacity == 0 {
            return Err(invalid("max_capacity must be greater than 0".to_string()));
        }
        if let Some(threshold) = self.alert_threshold {
            if threshold == 0 {
                return Err(invalid("alert_threshold must be greater than 0".to_string()));
            }
        }
        Ok(())
    }

    pub fn is_strict(&self) -> bool {
        self.control_mode == CapacityMode::Strict
    }
}

/// What a capacity evaluation does to the area's counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityAction {
    Entry(u32),
    Exit(u32),
    Reset,
}

impl CapacityAction {
    /// `delta > 0` entry, `delta < 0` exit, `delta == 0` reset.
    pub fn from_delta(delta: i64) -> Self {
        let magnitude = u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX);
        match delta {
            d if d > 0 => Self::Entry(magnitude),
            d if d < 0 => Self::Exit(magnitude),
            _ => Self::Reset,
        }
    }
}

/// Point-in-time occupancy of one area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancySnapshot {
    pub area_id: AreaId,
    pub current_count: i64,
    pub max_capacity: u32,
    pub utilization_pct: f64,
    pub entry_blocked: bool,
}

impl OccupancySnapshot {
    pub fn new(area_id: AreaId, current_count: i64, max_capacity: u32, entry_blocked: bool) -> Self {
        let utilization_pct = if max_capacity == 0 {
            0.0
        } else {
            current_count as f64 / f64::from(max_capacity) * 100.0
        };
        Self {
            area_id,
            current_count,
            max_capacity,
            utilization_pct,
            entry_blocked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_from_delta() {
        assert_eq!(CapacityAction::from_delta(10), CapacityAction::Entry(10));
        assert_eq!(CapacityAction::from_delta(-1), CapacityAction::Exit(1));
        assert_eq!(CapacityAction::from_delta(0), CapacityAction::Reset);
    }

    #[test]
    fn utilization_percentage() {
        let snap = OccupancySnapshot::new(1, 75, 100, false);
        assert!((snap.utilization_pct - 75.0).abs() < f64::EPSILON);
    }
}
