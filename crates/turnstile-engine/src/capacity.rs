//! Occupancy control.
//!
//! The live count of each area sits at `area:{id}:count`. Entries go
//! through a compare-and-set loop so a STRICT area is never pushed past its
//! cap by two swipes racing each other; exits clamp at zero.

use tracing::{debug, instrument, warn};

use turnstile_core::config::CapacitySettings;
use turnstile_core::errors::{AccessResult, CacheError};
use turnstile_core::keys;
use turnstile_core::models::{
    AccessAlert, AlertKind, AreaId, CapacityAction, CapacityMode, CapacityRule, DecisionResult,
    DecisionStage, DeviceCommand, OccupancySnapshot, PolicyKind, ResultCode,
};
use turnstile_core::traits::CacheValue;

use crate::cas::{self, Step};
use crate::EngineContext;

/// What an entry of `n` people does to an area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryVerdict {
    Admit { after: i64, over: bool },
    Reject { proposed: i64, ceiling: Option<i64> },
}

fn judge_entry(
    rule: &CapacityRule,
    settings: &CapacitySettings,
    current: i64,
    n: i64,
) -> EntryVerdict {
    let proposed = current.saturating_add(n);
    if proposed <= i64::from(rule.max_capacity) {
        return EntryVerdict::Admit { after: proposed, over: false };
    }
    match rule.control_mode {
        CapacityMode::Strict => EntryVerdict::Reject { proposed, ceiling: None },
        CapacityMode::Warning => match settings.warning_ceiling(rule.max_capacity) {
            Some(ceiling) if proposed > ceiling => EntryVerdict::Reject {
                proposed,
                ceiling: Some(ceiling),
            },
            _ => EntryVerdict::Admit { after: proposed, over: true },
        },
    }
}

pub struct CapacityEvaluator {
    ctx: EngineContext,
    settings: CapacitySettings,
}

impl CapacityEvaluator {
    pub fn new(ctx: EngineContext, settings: CapacitySettings) -> Self {
        Self { ctx, settings }
    }

    /// `delta > 0` admits `delta` people, `delta < 0` lets `|delta|` out,
    /// `delta == 0` resets the area.
    ///
    /// Missing rules and cache failures allow. A cache miss falls back to the
    /// rule's persisted `current_count`.
    #[instrument(level = "debug", skip(self))]
    pub fn evaluate(&self, area_id: AreaId, delta: i64) -> DecisionResult {
        let rule = match self.ctx.rules.get_enabled_capacity_rule(area_id) {
            Ok(Some(rule)) => rule,
            Ok(None) => return DecisionResult::allow().at_stage(DecisionStage::CapacityCheck),
            Err(e) => {
                warn!(area_id, error = %e, "capacity rule lookup failed, allowing");
                return DecisionResult::allow().at_stage(DecisionStage::CapacityCheck);
            }
        };

        let result = match CapacityAction::from_delta(delta) {
            CapacityAction::Entry(n) => self.entry(&rule, i64::from(n)),
            CapacityAction::Exit(n) => self.exit(&rule, i64::from(n)),
            CapacityAction::Reset => self.reset_area(&rule),
        };
        result.at_stage(DecisionStage::CapacityCheck)
    }

    /// Same as `evaluate(area_id, 0)`.
    pub fn reset(&self, area_id: AreaId) -> DecisionResult {
        self.evaluate(area_id, 0)
    }

    /// Current occupancy, or `None` when the area has no enabled rule.
    pub fn occupancy(&self, area_id: AreaId) -> AccessResult<Option<OccupancySnapshot>> {
        let Some(rule) = self.ctx.rules.get_enabled_capacity_rule(area_id)? else {
            return Ok(None);
        };
        let count = self
            .ctx
            .cache
            .get(&keys::capacity_count(area_id))?
            .and_then(|v| v.as_counter())
            .unwrap_or(i64::from(rule.current_count));
        let blocked = self
            .ctx
            .cache
            .get(&keys::capacity_blocked(area_id))?
            .and_then(|v| v.as_counter())
            .map_or(rule.entry_blocked, |flag| flag != 0);
        Ok(Some(OccupancySnapshot::new(area_id, count, rule.max_capacity, blocked)))
    }

    fn entry(&self, rule: &CapacityRule, n: i64) -> DecisionResult {
        let area_id = rule.area_id;
        let key = keys::capacity_count(area_id);
        let fallback = i64::from(rule.current_count);

        let attempt = cas::update(
            self.ctx.cache.as_ref(),
            &key,
            None,
            self.settings.effective_cas_retries(),
            |current| {
                let before = current.and_then(CacheValue::as_counter).unwrap_or(fallback);
                match judge_entry(rule, &self.settings, before, n) {
                    EntryVerdict::Admit { after, over } => Step::Write(
                        CacheValue::Counter(after),
                        (before, EntryVerdict::Admit { after, over }),
                    ),
                    reject => Step::Done((before, reject)),
                }
            },
        );

        let (before, verdict) = match attempt {
            Ok(decided) => decided,
            Err(CacheError::Contended { .. }) => match self.entry_by_increment(rule, &key, n) {
                Ok(decided) => decided,
                Err(e) => return self.fail_open_entry(rule, n, &e),
            },
            Err(e) => return self.fail_open_entry(rule, n, &e),
        };

        debug!(area_id, before, ?verdict, "capacity entry");
        self.apply_entry(rule, before, verdict)
    }

    /// Contended fallback: increment natively, then back out if the cap
    /// turned out to be exceeded.
    fn entry_by_increment(
        &self,
        rule: &CapacityRule,
        key: &str,
        n: i64,
    ) -> Result<(i64, EntryVerdict), CacheError> {
        let after = self.ctx.cache.incr_by(key, n, None)?;
        let before = after - n;
        match judge_entry(rule, &self.settings, before, n) {
            admit @ EntryVerdict::Admit { .. } => Ok((before, admit)),
            reject => {
                self.ctx.cache.decr_by(key, n, None)?;
                Ok((before, reject))
            }
        }
    }

    /// An unreachable cache means no known occupancy: admit without counting.
    fn fail_open_entry(&self, rule: &CapacityRule, n: i64, error: &CacheError) -> DecisionResult {
        warn!(area_id = rule.area_id, headcount = n, error = %error, "capacity cache unavailable, allowing");
        DecisionResult::allow()
    }

    fn apply_entry(&self, rule: &CapacityRule, before: i64, verdict: EntryVerdict) -> DecisionResult {
        let area_id = rule.area_id;
        match verdict {
            EntryVerdict::Reject { proposed, ceiling } => {
                self.set_blocked(area_id, true);
                self.rejection(rule, proposed, ceiling)
            }
            EntryVerdict::Admit { after, over } => {
                if let Some(threshold) = rule.alert_threshold.map(i64::from) {
                    if before < threshold && after >= threshold {
                        self.alert(
                            AlertKind::CapacityThreshold,
                            area_id,
                            format!("区域{area_id}人数{after}已达到告警阈值{threshold}"),
                        );
                    }
                }
                if over {
                    self.set_blocked(area_id, true);
                    let message = format!(
                        "警告：区域{area_id}人数{after}超过最大容量{}",
                        rule.max_capacity
                    );
                    self.alert(AlertKind::CapacityOverrun, area_id, message.clone());
                    DecisionResult::warn(ResultCode::CapacityWarning, message, PolicyKind::Capacity)
                } else {
                    DecisionResult::allow()
                }
            }
        }
    }

    fn rejection(&self, rule: &CapacityRule, proposed: i64, ceiling: Option<i64>) -> DecisionResult {
        let area_id = rule.area_id;
        let max = rule.max_capacity;
        let message = match ceiling {
            None => format!("区域{area_id}人数{proposed}超过最大容量{max}，禁止进入"),
            Some(ceiling) => format!(
                "区域{area_id}人数{proposed}超过最大容量{max}的警戒上限{ceiling}，禁止进入"
            ),
        };
        debug!(area_id, proposed, max, "capacity entry rejected");
        DecisionResult::deny(ResultCode::CapacityExceeded, message, PolicyKind::Capacity)
    }

    fn exit(&self, rule: &CapacityRule, n: i64) -> DecisionResult {
        let area_id = rule.area_id;
        let fallback = i64::from(rule.current_count);
        let key = keys::capacity_count(area_id);
        let updated = cas::update(
            self.ctx.cache.as_ref(),
            &key,
            None,
            self.settings.effective_cas_retries(),
            |current| {
                let before = current.and_then(CacheValue::as_counter).unwrap_or(fallback);
                let after = before.saturating_sub(n).max(0);
                Step::Write(CacheValue::Counter(after), after)
            },
        );
        let updated = match updated {
            Err(CacheError::Contended { .. }) => self.exit_by_decrement(&key, n),
            other => other,
        };
        match updated {
            Ok(after) => {
                debug!(area_id, after, "capacity exit");
                if after < i64::from(rule.max_capacity) {
                    self.set_blocked(area_id, false);
                }
            }
            Err(e) => warn!(area_id, error = %e, "capacity exit not recorded"),
        }
        DecisionResult::allow()
    }

    /// Contended fallback: decrement natively, then give back whatever part
    /// of this exit went below zero.
    fn exit_by_decrement(&self, key: &str, n: i64) -> Result<i64, CacheError> {
        let after = self.ctx.cache.decr_by(key, n, None)?;
        if after >= 0 {
            return Ok(after);
        }
        let overshoot = n.min(after.saturating_neg());
        Ok(self.ctx.cache.incr_by(key, overshoot, None)?.max(0))
    }

    fn reset_area(&self, rule: &CapacityRule) -> DecisionResult {
        let area_id = rule.area_id;
        let cache = self.ctx.cache.as_ref();
        let reset = cache
            .delete_prefix(&keys::capacity_area_prefix(area_id))
            .and_then(|_| cache.set(&keys::capacity_count(area_id), CacheValue::Counter(0), None))
            .and_then(|_| cache.set(&keys::capacity_blocked(area_id), CacheValue::Counter(0), None));
        if let Err(e) = reset {
            warn!(area_id, error = %e, "capacity reset failed");
        }
        debug!(area_id, "capacity reset");
        DecisionResult {
            message: format!("区域{area_id}人数已重置为0"),
            ..DecisionResult::allow()
        }
    }

    fn set_blocked(&self, area_id: AreaId, blocked: bool) {
        let flag = CacheValue::Counter(i64::from(blocked));
        if let Err(e) = self.ctx.cache.set(&keys::capacity_blocked(area_id), flag, None) {
            warn!(area_id, blocked, error = %e, "entry_blocked flag not updated");
        }
    }

    fn alert(&self, kind: AlertKind, area_id: AreaId, message: String) {
        let alert = AccessAlert {
            kind,
            user_id: None,
            area_id,
            message,
            raised_at: self.ctx.clock.now(),
        };
        if !self.ctx.sink.submit(DeviceCommand::RaiseAlert(alert)) {
            warn!(area_id, ?kind, "capacity alert dropped");
        }
    }
}
