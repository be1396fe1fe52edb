//! Anti-passback configuration and detection results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AreaId, DeviceId, RuleId, Scope, UserId};
use crate::constants::{MSG_HARD_VIOLATION, MSG_NORMAL_PASS, MSG_SOFT_VIOLATION};
use crate::errors::RuleStoreError;

/// The 4 anti-passback modes, in evaluation priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AntiPassbackMode {
    /// One window per user across every area.
    Global,
    /// One window per user per configured area.
    Area,
    /// Area-scoped; violations are flagged but the pass is allowed.
    Soft,
    /// Area-scoped; violations are denied.
    Hard,
}

/// What a mode does once the pass budget of its window is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationResponse {
    Deny,
    Warn,
}

impl AntiPassbackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "GLOBAL",
            Self::Area => "AREA",
            Self::Soft => "SOFT",
            Self::Hard => "HARD",
        }
    }

    pub fn all() -> &'static [AntiPassbackMode] {
        &[Self::Global, Self::Area, Self::Soft, Self::Hard]
    }

    /// Lower runs first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Global => 1,
            Self::Area => 2,
            Self::Soft => 3,
            Self::Hard => 4,
        }
    }

    pub fn is_area_scoped(&self) -> bool {
        !matches!(self, Self::Global)
    }

    pub fn violation_response(&self) -> ViolationResponse {
        match self {
            Self::Soft => ViolationResponse::Warn,
            Self::Global | Self::Area | Self::Hard => ViolationResponse::Deny,
        }
    }

    /// Resolve the scope a swipe falls into under this mode.
    ///
    /// Area-scoped modes only apply to swipes in their own area; the mode
    /// never changes the key, only the response.
    pub fn scope_for(
        &self,
        config_area: Option<AreaId>,
        user_id: UserId,
        event_area: AreaId,
    ) -> Option<Scope> {
        match self {
            Self::Global => Some(Scope::Global { user_id }),
            Self::Area | Self::Soft | Self::Hard => match config_area {
                Some(area_id) if area_id == event_area => Some(Scope::Area { user_id, area_id }),
                _ => None,
            },
        }
    }
}

impl fmt::Display for AntiPassbackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured anti-passback policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiPassbackConfig {
    pub config_id: RuleId,
    pub mode: AntiPassbackMode,
    /// `None` iff `mode == Global`.
    #[serde(default)]
    pub area_id: Option<AreaId>,
    /// Pass-count window. Independent of the cache lifetime.
    pub time_window_ms: u64,
    pub max_pass_count: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `None` means effective immediately.
    #[serde(default)]
    pub effective_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expire_time: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl AntiPassbackConfig {
    /// Check the load-time invariants.
    pub fn validate(&self) -> Result<(), RuleStoreError> {
        let invalid = |message: &str| RuleStoreError::InvalidRule {
            rule: format!("anti_passback#{}", self.config_id),
            message: message.to_string(),
        };
        match (self.mode, self.area_id) {
            (AntiPassbackMode::Global, Some(_)) => {
                return Err(invalid("GLOBAL mode must not name an area"))
            }
            (mode, None) if mode.is_area_scoped() => {
                return Err(invalid("area-scoped mode requires area_id"))
            }
            _ => {}
        }
        if self.max_pass_count < 1 {
            return Err(invalid("max_pass_count must be at least 1"));
        }
        if self.time_window_ms == 0 {
            return Err(invalid("time_window_ms must be greater than 0"));
        }
        if let (Some(from), Some(to)) = (self.effective_time, self.expire_time) {
            if to <= from {
                return Err(invalid("expire_time must be after effective_time"));
            }
        }
        Ok(())
    }

    /// Enabled, already effective, and not yet expired.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && self.effective_time.map_or(true, |t| t <= now)
            && self.expire_time.map_or(true, |t| now < t)
    }

    pub fn scope_for(&self, user_id: UserId, event_area: AreaId) -> Option<Scope> {
        self.mode.scope_for(self.area_id, user_id, event_area)
    }
}

/// Anti-passback input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectForm {
    pub user_id: UserId,
    pub device_id: DeviceId,
    pub area_id: AreaId,
    #[serde(default)]
    pub skip_detection: bool,
}

/// Detection outcome, with the numeric codes terminals expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectOutcome {
    Normal,
    Soft,
    Hard,
}

impl DetectOutcome {
    pub fn code(&self) -> i32 {
        match self {
            Self::Normal => 1,
            Self::Soft => 2,
            Self::Hard => 3,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Normal => MSG_NORMAL_PASS,
            Self::Soft => MSG_SOFT_VIOLATION,
            Self::Hard => MSG_HARD_VIOLATION,
        }
    }

    pub fn allows_pass(&self) -> bool {
        !matches!(self, Self::Hard)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Pass budget of the time window already spent.
    TimeWindow,
}

/// The most recent pass in the violated scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentPassInfo {
    pub pass_time_ms: i64,
    pub device_id: DeviceId,
    pub area_id: AreaId,
    pub seconds_ago: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiPassbackViolation {
    pub kind: ViolationKind,
    pub message: String,
    pub config_id: RuleId,
    pub mode: AntiPassbackMode,
    pub scope_key: String,
    pub count_in_window: u32,
    pub recent_pass: Option<RecentPassInfo>,
}

/// Result of `detect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectResult {
    pub outcome: DetectOutcome,
    pub allowed: bool,
    pub message: String,
    pub violation: Option<AntiPassbackViolation>,
    pub detection_time_ms: u64,
}

impl DetectResult {
    pub fn normal() -> Self {
        Self {
            outcome: DetectOutcome::Normal,
            allowed: true,
            message: MSG_NORMAL_PASS.to_string(),
            violation: None,
            detection_time_ms: 0,
        }
    }

    pub fn violation(outcome: DetectOutcome, violation: AntiPassbackViolation) -> Self {
        Self {
            outcome,
            allowed: outcome.allows_pass(),
            message: outcome.message().to_string(),
            violation: Some(violation),
            detection_time_ms: 0,
        }
    }

    pub fn result_code(&self) -> i32 {
        self.outcome.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: AntiPassbackMode, area_id: Option<AreaId>) -> AntiPassbackConfig {
        AntiPassbackConfig {
            config_id: 1,
            mode,
            area_id,
            time_window_ms: 300_000,
            max_pass_count: 1,
            enabled: true,
            effective_time: None,
            expire_time: None,
        }
    }

    #[test]
    fn global_scope_ignores_event_area() {
        let c = config(AntiPassbackMode::Global, None);
        assert_eq!(c.scope_for(1001, 2001), c.scope_for(1001, 2002));
        assert_eq!(c.scope_for(1001, 2001).unwrap().cache_key(), "anti_passback:user:1001");
    }

    #[test]
    fn area_scoped_modes_share_key_and_skip_other_areas() {
        for mode in [AntiPassbackMode::Area, AntiPassbackMode::Soft, AntiPassbackMode::Hard] {
            let c = config(mode, Some(101));
            assert_eq!(
                c.scope_for(1001, 101).unwrap().cache_key(),
                "anti_passback:user:1001:area:101"
            );
            assert!(c.scope_for(1001, 102).is_none());
        }
    }

    #[test]
    fn validate_rejects_area_on_global_and_missing_area() {
        assert!(config(AntiPassbackMode::Global, Some(1)).validate().is_err());
        assert!(config(AntiPassbackMode::Hard, None).validate().is_err());
        let mut c = config(AntiPassbackMode::Area, Some(1));
        c.max_pass_count = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn activity_respects_time_bounds() {
        let now = Utc::now();
        let mut c = config(AntiPassbackMode::Global, None);
        c.effective_time = Some(now + chrono::Duration::hours(1));
        assert!(!c.is_active_at(now));
        c.effective_time = Some(now - chrono::Duration::hours(1));
        c.expire_time = Some(now);
        assert!(!c.is_active_at(now));
        c.expire_time = None;
        assert!(c.is_active_at(now));
        c.enabled = false;
        assert!(!c.is_active_at(now));
    }

    #[test]
    fn only_soft_warns() {
        for mode in AntiPassbackMode::all() {
            let expected = if *mode == AntiPassbackMode::Soft {
                ViolationResponse::Warn
            } else {
                ViolationResponse::Deny
            };
            assert_eq!(mode.violation_response(), expected);
        }
    }
}
