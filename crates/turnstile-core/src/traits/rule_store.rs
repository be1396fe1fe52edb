use crate::errors::RuleStoreError;
use crate::models::{AntiPassbackConfig, AreaId, CapacityRule, InterlockRule, RuleId};

/// Read-only view of the configured rules.
///
/// Implementations hand out a consistent snapshot per call; replacing the
/// rule set never blocks readers for longer than a pointer swap.
pub trait RuleStore: Send + Sync {
    fn get_enabled_capacity_rule(
        &self,
        area_id: AreaId,
    ) -> Result<Option<CapacityRule>, RuleStoreError>;

    /// Enabled anti-passback configs, ordered by mode priority then id.
    fn get_enabled_anti_passback_configs(&self)
        -> Result<Vec<AntiPassbackConfig>, RuleStoreError>;

    /// Enabled interlock rules an open in `area_id` can trigger, ordered by
    /// rule priority.
    fn get_enabled_interlock_rules_by_area(
        &self,
        area_id: AreaId,
    ) -> Result<Vec<InterlockRule>, RuleStoreError>;

    /// Any interlock rule by id, enabled or not.
    fn get_interlock_rule(&self, rule_id: RuleId) -> Result<Option<InterlockRule>, RuleStoreError>;
}
