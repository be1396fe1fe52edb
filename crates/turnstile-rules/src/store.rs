//! In-memory `RuleStore` over a swappable snapshot.

use std::path::Path;
use std::sync::{Arc, RwLock};

use turnstile_core::errors::RuleStoreError;
use turnstile_core::models::{
    AntiPassbackConfig, AreaId, CapacityRule, InterlockRule, RuleId, Scope,
};
use turnstile_core::traits::{Clock, RuleStore, SystemClock};

use crate::snapshot::{RuleSnapshot, ScopedRules};

/// Serves every read from one `Arc<RuleSnapshot>`; `replace` swaps it.
///
/// Readers hold the lock only long enough to clone the `Arc`.
pub struct InMemoryRuleStore {
    snapshot: RwLock<Arc<RuleSnapshot>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRuleStore {
    pub fn new(snapshot: RuleSnapshot) -> Self {
        Self::with_clock(snapshot, Arc::new(SystemClock))
    }

    /// `clock` decides which anti-passback configs are inside their
    /// effective/expire window.
    pub fn with_clock(snapshot: RuleSnapshot, clock: Arc<dyn Clock>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            clock,
        }
    }

    pub fn load(path: &Path) -> Result<Self, RuleStoreError> {
        RuleSnapshot::load(path).map(Self::new)
    }

    pub fn snapshot(&self) -> Result<Arc<RuleSnapshot>, RuleStoreError> {
        self.snapshot
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| RuleStoreError::Unavailable {
                message: "rule snapshot lock poisoned".to_string(),
            })
    }

    /// Validate and install a new snapshot. In-flight readers keep the old one.
    pub fn replace(&self, snapshot: RuleSnapshot) -> Result<(), RuleStoreError> {
        snapshot.validate()?;
        let next = Arc::new(snapshot);
        let mut guard = self.snapshot.write().map_err(|_| RuleStoreError::Unavailable {
            message: "rule snapshot lock poisoned".to_string(),
        })?;
        *guard = next;
        tracing::info!("rule snapshot replaced");
        Ok(())
    }

    pub fn rules_for(&self, scope: &Scope) -> Result<ScopedRules, RuleStoreError> {
        Ok(self.snapshot()?.rules_for(scope))
    }
}

impl RuleStore for InMemoryRuleStore {
    fn get_enabled_capacity_rule(
        &self,
        area_id: AreaId,
    ) -> Result<Option<CapacityRule>, RuleStoreError> {
        Ok(self
            .snapshot()?
            .capacity
            .iter()
            .find(|r| r.enabled && r.area_id == area_id)
            .cloned())
    }

    fn get_enabled_anti_passback_configs(
        &self,
    ) -> Result<Vec<AntiPassbackConfig>, RuleStoreError> {
        let now = self.clock.now();
        let mut configs: Vec<AntiPassbackConfig> = self
            .snapshot()?
            .anti_passback
            .iter()
            .filter(|c| c.is_active_at(now))
            .cloned()
            .collect();
        configs.sort_by_key(|c| (c.mode.priority(), c.config_id));
        Ok(configs)
    }

    fn get_enabled_interlock_rules_by_area(
        &self,
        area_id: AreaId,
    ) -> Result<Vec<InterlockRule>, RuleStoreError> {
        let mut rules: Vec<InterlockRule> = self
            .snapshot()?
            .interlock
            .iter()
            .filter(|r| r.enabled && r.is_triggered_by(area_id))
            .cloned()
            .collect();
        rules.sort_by_key(|r| (r.priority, r.rule_id));
        Ok(rules)
    }

    fn get_interlock_rule(&self, rule_id: RuleId) -> Result<Option<InterlockRule>, RuleStoreError> {
        Ok(self
            .snapshot()?
            .interlock
            .iter()
            .find(|r| r.rule_id == rule_id)
            .cloned())
    }
}
