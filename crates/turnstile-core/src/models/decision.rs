//! Decision results returned to the terminal.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::DetectOutcome;
use crate::constants::MSG_NORMAL_PASS;

/// Numeric verdict codes understood by terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    Normal,
    SoftViolation,
    HardViolation,
    CapacityExceeded,
    CapacityWarning,
}

impl ResultCode {
    pub fn code(&self) -> i32 {
        match self {
            Self::Normal => 1,
            Self::SoftViolation => 2,
            Self::HardViolation => 3,
            Self::CapacityExceeded => 4,
            Self::CapacityWarning => 5,
        }
    }
}

impl From<DetectOutcome> for ResultCode {
    fn from(outcome: DetectOutcome) -> Self {
        match outcome {
            DetectOutcome::Normal => Self::Normal,
            DetectOutcome::Soft => Self::SoftViolation,
            DetectOutcome::Hard => Self::HardViolation,
        }
    }
}

/// Pipeline stage an evaluation reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionStage {
    Received,
    CapacityCheck,
    AntiPassbackCheck,
    InterlockDispatch,
    Responded,
}

impl DecisionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::CapacityCheck => "CAPACITY_CHECK",
            Self::AntiPassbackCheck => "ANTIPASSBACK_CHECK",
            Self::InterlockDispatch => "INTERLOCK_DISPATCH",
            Self::Responded => "RESPONDED",
        }
    }
}

impl fmt::Display for DecisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three policy families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Capacity,
    AntiPassback,
    Interlock,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capacity => "capacity",
            Self::AntiPassback => "anti_passback",
            Self::Interlock => "interlock",
        }
    }

    pub fn all() -> &'static [PolicyKind] {
        &[Self::Capacity, Self::AntiPassback, Self::Interlock]
    }

    /// Parse a config or CLI name. Accepts `anti-passback` as well.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "capacity" => Some(Self::Capacity),
            "anti_passback" | "antipassback" => Some(Self::AntiPassback),
            "interlock" => Some(Self::Interlock),
            _ => None,
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict for one swipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub allowed: bool,
    pub result_code: ResultCode,
    pub message: String,
    pub evaluation_time_ms: u64,
    pub stage: DecisionStage,
    /// Policy that produced a deny or warning, if any.
    pub decided_by: Option<PolicyKind>,
    pub warnings: Vec<String>,
    pub interlock_rules_triggered: usize,
    pub over_budget: bool,
}

impl DecisionResult {
    /// Plain allow with the normal-pass message.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            result_code: ResultCode::Normal,
            message: MSG_NORMAL_PASS.to_string(),
            evaluation_time_ms: 0,
            stage: DecisionStage::Received,
            decided_by: None,
            warnings: Vec::new(),
            interlock_rules_triggered: 0,
            over_budget: false,
        }
    }

    pub fn deny(result_code: ResultCode, message: impl Into<String>, policy: PolicyKind) -> Self {
        Self {
            allowed: false,
            result_code,
            message: message.into(),
            decided_by: Some(policy),
            ..Self::allow()
        }
    }

    /// Allowed, but flagged.
    pub fn warn(result_code: ResultCode, message: impl Into<String>, policy: PolicyKind) -> Self {
        let message = message.into();
        Self {
            allowed: true,
            result_code,
            warnings: vec![message.clone()],
            message,
            decided_by: Some(policy),
            ..Self::allow()
        }
    }

    pub fn at_stage(mut self, stage: DecisionStage) -> Self {
        self.stage = stage;
        self
    }

    pub fn code(&self) -> i32 {
        self.result_code.code()
    }

    pub fn is_warning(&self) -> bool {
        self.allowed && !self.warnings.is_empty()
    }
}
