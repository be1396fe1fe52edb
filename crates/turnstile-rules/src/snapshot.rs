//! Immutable rule sets.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use turnstile_core::errors::RuleStoreError;
use turnstile_core::models::{
    AntiPassbackConfig, AntiPassbackMode, CapacityRule, InterlockRule, Scope,
};

/// Every configured rule at one point in time.
///
/// TOML layout:
///
/// ```toml
/// [[capacity]]
/// control_id = 1
/// area_id = 101
/// max_capacity = 100
/// control_mode = "STRICT"
///
/// [[anti_passback]]
/// config_id = 1
/// mode = "GLOBAL"
/// time_window_ms = 300000
/// max_pass_count = 1
///
/// [[interlock]]
/// rule_id = 1
/// area_a_id = 201
/// area_b_id = 202
/// interlock_mode = "BIDIRECTIONAL"
/// unlock_condition = "DOOR_CLOSED"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSnapshot {
    pub capacity: Vec<CapacityRule>,
    pub anti_passback: Vec<AntiPassbackConfig>,
    pub interlock: Vec<InterlockRule>,
}

/// The rules that own state in one scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopedRules {
    pub anti_passback: Vec<AntiPassbackConfig>,
    pub capacity: Option<CapacityRule>,
    pub interlock: Vec<InterlockRule>,
}

impl RuleSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, rule: CapacityRule) -> Self {
        self.capacity.push(rule);
        self
    }

    pub fn with_anti_passback(mut self, config: AntiPassbackConfig) -> Self {
        self.anti_passback.push(config);
        self
    }

    pub fn with_interlock(mut self, rule: InterlockRule) -> Self {
        self.interlock.push(rule);
        self
    }

    /// Parse and validate a snapshot. `origin` names the source in errors.
    pub fn from_toml_str(toml_str: &str, origin: &str) -> Result<Self, RuleStoreError> {
        let snapshot: Self = toml::from_str(toml_str).map_err(|e| RuleStoreError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn load(path: &Path) -> Result<Self, RuleStoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| RuleStoreError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let snapshot = Self::from_toml_str(&content, &path.display().to_string())?;
        tracing::info!(
            path = %path.display(),
            capacity = snapshot.capacity.len(),
            anti_passback = snapshot.anti_passback.len(),
            interlock = snapshot.interlock.len(),
            "loaded rule snapshot"
        );
        Ok(snapshot)
    }

    /// Per-rule invariants plus unique ids within each family.
    pub fn validate(&self) -> Result<(), RuleStoreError> {
        let mut seen = HashSet::new();
        for rule in &self.capacity {
            rule.validate()?;
            if !seen.insert(rule.control_id) {
                return Err(duplicate("capacity", rule.control_id));
            }
        }
        seen.clear();
        for config in &self.anti_passback {
            config.validate()?;
            if !seen.insert(config.config_id) {
                return Err(duplicate("anti_passback", config.config_id));
            }
        }
        seen.clear();
        for rule in &self.interlock {
            rule.validate()?;
            if !seen.insert(rule.rule_id) {
                return Err(duplicate("interlock", rule.rule_id));
            }
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, RuleStoreError> {
        toml::to_string_pretty(self).map_err(|e| RuleStoreError::Parse {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }

    /// Rules whose state lives in `scope`. Enabled and disabled alike.
    pub fn rules_for(&self, scope: &Scope) -> ScopedRules {
        match *scope {
            Scope::Global { .. } => ScopedRules {
                anti_passback: self
                    .anti_passback
                    .iter()
                    .filter(|c| c.mode == AntiPassbackMode::Global)
                    .cloned()
                    .collect(),
                ..ScopedRules::default()
            },
            Scope::Area { area_id, .. } => ScopedRules {
                anti_passback: self
                    .anti_passback
                    .iter()
                    .filter(|c| c.mode.is_area_scoped() && c.area_id == Some(area_id))
                    .cloned()
                    .collect(),
                capacity: self.capacity.iter().find(|r| r.area_id == area_id).cloned(),
                interlock: Vec::new(),
            },
            Scope::AreaPair { area_a, area_b } => ScopedRules {
                interlock: self
                    .interlock
                    .iter()
                    .filter(|r| r.involves(area_a) && r.involves(area_b))
                    .cloned()
                    .collect(),
                ..ScopedRules::default()
            },
        }
    }
}

fn duplicate(family: &str, id: i64) -> RuleStoreError {
    RuleStoreError::InvalidRule {
        rule: format!("{family}#{id}"),
        message: "duplicate id".to_string(),
    }
}
