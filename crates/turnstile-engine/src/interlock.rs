//! Interlock (mantrap) enforcement.
//!
//! An open on one side of a rule locks the other side's doors. The locked
//! side is remembered per rule at `interlock:rule:{id}:locked_area`, so at
//! most one side of a rule is ever recorded as locked. Door commands go
//! through the command sink; nothing here waits on a controller.

use tracing::{debug, instrument, warn};

use turnstile_core::constants::{MSG_INTERLOCK_NOT_APPLICABLE, MSG_NO_INTERLOCK_RULE};
use turnstile_core::errors::{AccessError, AccessResult};
use turnstile_core::keys;
use turnstile_core::models::{
    AccessEventType, AreaId, DeviceCommand, DoorId, InterlockOutcome, InterlockRule,
    InterlockStatus, InterlockTestReport, RuleId, UnlockCondition,
};
use turnstile_core::traits::CacheValue;

use crate::EngineContext;

pub struct InterlockEvaluator {
    ctx: EngineContext,
}

impl InterlockEvaluator {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// React to a door event in `area_id`.
    ///
    /// Opens (and entries) lock the opposite side of every matching rule;
    /// closes release sides locked by `DOOR_CLOSED` rules. Returns as soon
    /// as the commands are queued.
    #[instrument(level = "debug", skip(self))]
    pub fn trigger_interlock(
        &self,
        area_id: AreaId,
        door_id: Option<DoorId>,
        event_type: AccessEventType,
    ) -> InterlockOutcome {
        match event_type {
            AccessEventType::DoorOpen | AccessEventType::Entry => self.arm(area_id),
            AccessEventType::DoorClose => self.release_on_close(area_id),
            AccessEventType::Exit => InterlockOutcome::message_only(MSG_INTERLOCK_NOT_APPLICABLE),
        }
    }

    /// Unlock `target_area_id`'s doors on `rule_id`, whatever the rule's
    /// unlock condition. Returns whether the command was queued.
    #[instrument(level = "debug", skip(self))]
    pub fn manual_unlock(&self, rule_id: RuleId, target_area_id: AreaId) -> AccessResult<bool> {
        let rule = self.rule(rule_id)?;
        let doors = rule
            .doors_of(target_area_id)
            .ok_or_else(|| not_in_rule(rule_id, target_area_id))?
            .to_vec();

        let locked_key = keys::interlock_locked_area(rule_id);
        match self.ctx.cache.get(&locked_key) {
            Ok(Some(v)) if v.as_counter() == Some(target_area_id) => {
                if let Err(e) = self.ctx.cache.delete(&locked_key) {
                    warn!(rule_id, error = %e, "interlock state not cleared");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(rule_id, error = %e, "interlock state unreadable"),
        }

        let queued = self.ctx.sink.submit(DeviceCommand::UnlockDoors {
            rule_id,
            area_id: target_area_id,
            door_ids: doors,
        });
        debug!(rule_id, target_area_id, queued, "manual unlock");
        Ok(queued)
    }

    /// What an open in `trigger_area_id` would lock, without doing it.
    pub fn test_rule(
        &self,
        rule_id: RuleId,
        trigger_area_id: AreaId,
    ) -> AccessResult<InterlockTestReport> {
        let rule = self.rule(rule_id)?;
        if !rule.involves(trigger_area_id) {
            return Err(not_in_rule(rule_id, trigger_area_id));
        }
        let target = rule.target_of(trigger_area_id);
        Ok(InterlockTestReport {
            rule_id,
            trigger_area_id,
            would_lock_area: target.map(|(area, _)| area),
            door_ids: target.map(|(_, doors)| doors.to_vec()).unwrap_or_default(),
            hold: target.and_then(|_| rule.hold_duration()),
        })
    }

    pub fn status(&self, rule_id: RuleId) -> AccessResult<InterlockStatus> {
        self.rule(rule_id)?;
        let locked_area = self
            .ctx
            .cache
            .get(&keys::interlock_locked_area(rule_id))?
            .and_then(|v| v.as_counter());
        let trigger_count = self
            .ctx
            .cache
            .get(&keys::interlock_triggers(rule_id))?
            .and_then(|v| v.as_counter())
            .unwrap_or(0);
        Ok(InterlockStatus {
            rule_id,
            locked_area,
            trigger_count,
        })
    }

    fn arm(&self, area_id: AreaId) -> InterlockOutcome {
        let rules = self.rules_triggered_by(area_id);
        if rules.is_empty() {
            return InterlockOutcome::message_only(MSG_NO_INTERLOCK_RULE);
        }

        let mut locked_areas = Vec::with_capacity(rules.len());
        for rule in &rules {
            let Some((target, doors)) = rule.target_of(area_id) else {
                continue;
            };
            let hold = rule.hold_duration();
            let cache = self.ctx.cache.as_ref();
            if let Err(e) = cache.set(
                &keys::interlock_locked_area(rule.rule_id),
                CacheValue::Counter(target),
                hold,
            ) {
                warn!(rule_id = rule.rule_id, error = %e, "interlock state not recorded");
            }
            if let Err(e) = cache.incr_by(&keys::interlock_triggers(rule.rule_id), 1, None) {
                warn!(rule_id = rule.rule_id, error = %e, "interlock trigger count not updated");
            }
            let queued = self.ctx.sink.submit(DeviceCommand::LockDoors {
                rule_id: rule.rule_id,
                area_id: target,
                door_ids: doors.to_vec(),
                hold,
            });
            if !queued {
                warn!(rule_id = rule.rule_id, target, "interlock lock command dropped");
            }
            locked_areas.push(target);
        }

        debug!(area_id, rules_triggered = locked_areas.len(), "interlock armed");
        InterlockOutcome {
            message: format!("互锁触发成功，共触发{}条规则", locked_areas.len()),
            rules_triggered: locked_areas.len(),
            locked_areas,
            released_areas: Vec::new(),
        }
    }

    fn release_on_close(&self, area_id: AreaId) -> InterlockOutcome {
        let rules: Vec<InterlockRule> = self
            .rules_triggered_by(area_id)
            .into_iter()
            .filter(|r| r.unlock_condition == UnlockCondition::DoorClosed)
            .collect();
        if rules.is_empty() {
            return InterlockOutcome::message_only(MSG_NO_INTERLOCK_RULE);
        }

        let mut released_areas = Vec::new();
        for rule in &rules {
            let Some((target, doors)) = rule.target_of(area_id) else {
                continue;
            };
            let key = keys::interlock_locked_area(rule.rule_id);
            let locked = match self.ctx.cache.get(&key) {
                Ok(value) => value.and_then(|v| v.as_counter()) == Some(target),
                Err(e) => {
                    warn!(rule_id = rule.rule_id, error = %e, "interlock state unreadable, releasing anyway");
                    true
                }
            };
            if !locked {
                continue;
            }
            if let Err(e) = self.ctx.cache.delete(&key) {
                warn!(rule_id = rule.rule_id, error = %e, "interlock state not cleared");
            }
            self.ctx.sink.submit(DeviceCommand::UnlockDoors {
                rule_id: rule.rule_id,
                area_id: target,
                door_ids: doors.to_vec(),
            });
            released_areas.push(target);
        }

        debug!(area_id, released = released_areas.len(), "interlock released on close");
        InterlockOutcome {
            message: format!("互锁解除，共解除{}条规则", released_areas.len()),
            rules_triggered: 0,
            locked_areas: Vec::new(),
            released_areas,
        }
    }

    fn rules_triggered_by(&self, area_id: AreaId) -> Vec<InterlockRule> {
        self.ctx
            .rules
            .get_enabled_interlock_rules_by_area(area_id)
            .unwrap_or_else(|e| {
                warn!(area_id, error = %e, "interlock rules unavailable");
                Vec::new()
            })
    }

    fn rule(&self, rule_id: RuleId) -> AccessResult<InterlockRule> {
        self.ctx
            .rules
            .get_interlock_rule(rule_id)?
            .ok_or(AccessError::RuleNotFound {
                kind: "interlock",
                rule_id,
            })
    }
}

fn not_in_rule(rule_id: RuleId, area_id: AreaId) -> AccessError {
    AccessError::InvalidArgument {
        field: "area_id".to_string(),
        message: format!("area {area_id} is not part of interlock rule {rule_id}"),
    }
}
