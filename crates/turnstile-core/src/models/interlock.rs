//! Interlock (mantrap) rules between two adjoining areas.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::{AreaId, DoorId, RuleId};
use crate::errors::RuleStoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterlockMode {
    /// Opening either side locks the other.
    Bidirectional,
    /// Opening area A locks area B; opening B leaves A alone.
    Unidirectional,
}

impl InterlockMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bidirectional => "BIDIRECTIONAL",
            Self::Unidirectional => "UNIDIRECTIONAL",
        }
    }
}

impl fmt::Display for InterlockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a locked side is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnlockCondition {
    /// A door-close event on the triggering side releases the other side.
    DoorClosed,
    /// The lock lapses after `unlock_delay_seconds`.
    Timeout,
    /// Only an authorized manual unlock releases it.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterlockRule {
    pub rule_id: RuleId,
    pub area_a_id: AreaId,
    pub area_b_id: AreaId,
    #[serde(default)]
    pub area_a_door_ids: Vec<DoorId>,
    #[serde(default)]
    pub area_b_door_ids: Vec<DoorId>,
    pub interlock_mode: InterlockMode,
    pub unlock_condition: UnlockCondition,
    #[serde(default)]
    pub unlock_delay_seconds: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Lower runs first.
    #[serde(default)]
    pub priority: i32,
}

fn default_true() -> bool {
    true
}

impl InterlockRule {
    pub fn validate(&self) -> Result<(), RuleStoreError> {
        let invalid = |message: &str| RuleStoreError::InvalidRule {
            rule: format!("interlock#{}", self.rule_id),
            message: message.to_string(),
        };
        if self.area_a_id == self.area_b_id {
            return Err(invalid("area_a_id and area_b_id must differ"));
        }
        if self.unlock_condition == UnlockCondition::Timeout && self.unlock_delay_seconds == 0 {
            return Err(invalid("TIMEOUT unlock requires unlock_delay_seconds > 0"));
        }
        Ok(())
    }

    pub fn involves(&self, area_id: AreaId) -> bool {
        self.area_a_id == area_id || self.area_b_id == area_id
    }

    /// Whether a door opening in `area_id` arms this rule.
    pub fn is_triggered_by(&self, area_id: AreaId) -> bool {
        self.target_of(area_id).is_some()
    }

    /// The area (and its doors) locked when `trigger_area` opens, honoring
    /// the rule's direction.
    pub fn target_of(&self, trigger_area: AreaId) -> Option<(AreaId, &[DoorId])> {
        if trigger_area == self.area_a_id {
            Some((self.area_b_id, &self.area_b_door_ids))
        } else if trigger_area == self.area_b_id
            && self.interlock_mode == InterlockMode::Bidirectional
        {
            Some((self.area_a_id, &self.area_a_door_ids))
        } else {
            None
        }
    }

    pub fn doors_of(&self, area_id: AreaId) -> Option<&[DoorId]> {
        if area_id == self.area_a_id {
            Some(&self.area_a_door_ids)
        } else if area_id == self.area_b_id {
            Some(&self.area_b_door_ids)
        } else {
            None
        }
    }

    /// How long the controller should hold a lock on its own.
    pub fn hold_duration(&self) -> Option<Duration> {
        match self.unlock_condition {
            UnlockCondition::Timeout => {
                Some(Duration::from_secs(u64::from(self.unlock_delay_seconds)))
            }
            UnlockCondition::DoorClosed | UnlockCondition::Manual => None,
        }
    }
}

/// Result of `trigger_interlock`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterlockOutcome {
    pub message: String,
    pub rules_triggered: usize,
    pub locked_areas: Vec<AreaId>,
    /// Areas released by a door-close.
    pub released_areas: Vec<AreaId>,
}

impl InterlockOutcome {
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Dry-run report of what a trigger would lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterlockTestReport {
    pub rule_id: RuleId,
    pub trigger_area_id: AreaId,
    pub would_lock_area: Option<AreaId>,
    pub door_ids: Vec<DoorId>,
    pub hold: Option<Duration>,
}

/// Current lock state of one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterlockStatus {
    pub rule_id: RuleId,
    pub locked_area: Option<AreaId>,
    pub trigger_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(mode: InterlockMode) -> InterlockRule {
        InterlockRule {
            rule_id: 1,
            area_a_id: 10,
            area_b_id: 20,
            area_a_door_ids: vec![101, 102],
            area_b_door_ids: vec![201],
            interlock_mode: mode,
            unlock_condition: UnlockCondition::DoorClosed,
            unlock_delay_seconds: 0,
            enabled: true,
            priority: 0,
        }
    }

    #[test]
    fn bidirectional_targets_opposite_side() {
        let r = rule(InterlockMode::Bidirectional);
        assert_eq!(r.target_of(10), Some((20, &[201][..])));
        assert_eq!(r.target_of(20), Some((10, &[101, 102][..])));
        assert_eq!(r.target_of(30), None);
    }

    #[test]
    fn unidirectional_only_from_a() {
        let r = rule(InterlockMode::Unidirectional);
        assert!(r.is_triggered_by(10));
        assert!(!r.is_triggered_by(20));
        assert!(r.involves(20));
    }

    #[test]
    fn timeout_requires_delay() {
        let mut r = rule(InterlockMode::Bidirectional);
        r.unlock_condition = UnlockCondition::Timeout;
        assert!(r.validate().is_err());
        r.unlock_delay_seconds = 5;
        assert!(r.validate().is_ok());
        assert_eq!(r.hold_duration(), Some(Duration::from_secs(5)));
    }
}
