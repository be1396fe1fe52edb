//! Anti-passback detection.
//!
//! Every applicable config is judged against the pass history at its scope
//! key before anything is written. A deny leaves the cache untouched; an
//! allow (including a SOFT warning) then records the pass at every key
//! through a compare-and-set loop that re-judges on conflict.

mod window;

use std::time::Instant;

use tracing::{debug, instrument, warn};

use turnstile_core::config::AntiPassbackSettings;
use turnstile_core::errors::{AccessResult, CacheError};
use turnstile_core::keys;
use turnstile_core::models::{
    AccessAlert, AlertKind, DetectForm, DetectOutcome, DetectResult, DetectionRecord,
    DeviceCommand, PassStamp, RecentPassEntry, Scope, UserId,
};
use turnstile_core::traits::CacheValue;

use self::window::{decisive, findings, plan, Finding, KeyPlan};
use crate::cas::{self, Step};
use crate::EngineContext;

/// What one key's commit ran into.
#[derive(Default)]
struct Commit<'a> {
    /// A concurrent pass spent the budget between judging and writing.
    late_deny: Option<Finding<'a>>,
    warn: Option<Finding<'a>>,
}

pub struct AntiPassbackEvaluator {
    ctx: EngineContext,
    settings: AntiPassbackSettings,
}

impl AntiPassbackEvaluator {
    pub fn new(ctx: EngineContext, settings: AntiPassbackSettings) -> Self {
        Self { ctx, settings }
    }

    /// Judge one swipe.
    ///
    /// `skip_detection` returns at once without reading rules or cache.
    /// Missing configs and cache failures allow.
    #[instrument(level = "debug", skip(self), fields(user_id = form.user_id, area_id = form.area_id))]
    pub fn detect(&self, form: &DetectForm) -> DetectResult {
        let started = Instant::now();
        if form.skip_detection {
            debug!("anti-passback skipped by override");
            return DetectResult::normal();
        }

        let configs = match self.ctx.rules.get_enabled_anti_passback_configs() {
            Ok(configs) => configs,
            Err(e) => {
                warn!(error = %e, "anti-passback configs unavailable, allowing");
                return DetectResult::normal();
            }
        };
        let plans = plan(&configs, form);
        if plans.is_empty() {
            return DetectResult::normal();
        }

        let mut result = self.judge_and_commit(form, &plans);
        result.detection_time_ms = started.elapsed().as_millis() as u64;

        if let Some(ref violation) = result.violation {
            self.submit(DeviceCommand::RaiseAlert(AccessAlert {
                kind: AlertKind::AntiPassbackViolation,
                user_id: Some(form.user_id),
                area_id: form.area_id,
                message: format!("{}：{}", result.message, violation.message),
                raised_at: self.ctx.clock.now(),
            }));
        }
        self.submit(DeviceCommand::RecordDetection(DetectionRecord::new(
            form,
            &result,
            self.ctx.clock.now(),
        )));
        result
    }

    /// Judge swipes one after another; later swipes see earlier passes.
    pub fn batch_detect(&self, forms: &[DetectForm]) -> Vec<DetectResult> {
        forms.iter().map(|form| self.detect(form)).collect()
    }

    /// Drop every pass history of one user. Returns how many keys went.
    pub fn clear_user_cache(&self, user_id: UserId) -> AccessResult<usize> {
        let global = usize::from(self.ctx.cache.delete(&keys::anti_passback_user(user_id))?);
        let areas = self
            .ctx
            .cache
            .delete_prefix(&keys::anti_passback_user_area_prefix(user_id))?;
        debug!(user_id, removed = global + areas, "cleared user anti-passback cache");
        Ok(global + areas)
    }

    /// Drop every anti-passback history.
    pub fn clear_all_cache(&self) -> AccessResult<usize> {
        let removed = self.ctx.cache.delete_prefix(keys::ANTI_PASSBACK_PREFIX)?;
        debug!(removed, "cleared all anti-passback cache");
        Ok(removed)
    }

    /// The pass history currently held for `scope`.
    pub fn recent_passes(&self, scope: &Scope) -> AccessResult<Option<RecentPassEntry>> {
        let key = scope.cache_key();
        match self.ctx.cache.get(&key)? {
            Some(value) => Ok(Some(RecentPassEntry::from_cache_value(&key, &value)?)),
            None => Ok(None),
        }
    }

    /// Phase 1 reads and judges every key. Phase 2 writes, only if nothing
    /// denied.
    fn judge_and_commit(&self, form: &DetectForm, plans: &[KeyPlan<'_>]) -> DetectResult {
        let now_ms = self.ctx.clock.now_ms();

        let mut all_findings = Vec::new();
        let mut writable = Vec::with_capacity(plans.len());
        for p in plans {
            match self.read_entry(&p.key) {
                Ok(entry) => {
                    all_findings.extend(findings(p, entry.as_ref(), now_ms));
                    writable.push(true);
                }
                Err(e) => {
                    warn!(cache_key = %p.key, error = %e, "pass history unreadable, treating as empty");
                    writable.push(false);
                }
            }
        }

        let (deny, warn_finding) = decisive(&all_findings);
        if let Some(deny) = deny {
            debug!(config_id = deny.config.config_id, count = deny.count, "anti-passback deny");
            return DetectResult::violation(DetectOutcome::Hard, deny.to_violation(now_ms));
        }
        let mut soft = warn_finding.cloned();

        let stamp = PassStamp {
            at_ms: now_ms,
            device_id: form.device_id,
            area_id: form.area_id,
        };
        for (p, _) in plans.iter().zip(&writable).filter(|(_, w)| **w) {
            let commit = self.commit(p, stamp, now_ms);
            if let Some(late) = commit.late_deny {
                debug!(config_id = late.config.config_id, "anti-passback deny after concurrent pass");
                return DetectResult::violation(DetectOutcome::Hard, late.to_violation(now_ms));
            }
            if soft.is_none() {
                soft = commit.warn;
            }
        }

        match soft {
            Some(finding) => {
                debug!(config_id = finding.config.config_id, count = finding.count, "anti-passback soft violation");
                DetectResult::violation(DetectOutcome::Soft, finding.to_violation(now_ms))
            }
            None => DetectResult::normal(),
        }
    }

    fn read_entry(&self, key: &str) -> Result<Option<RecentPassEntry>, CacheError> {
        let Some(value) = self.ctx.cache.get(key)? else {
            return Ok(None);
        };
        Ok(decode(key, Some(&value)))
    }

    /// Record `stamp` at `p.key`, re-judging against whatever is there at
    /// write time.
    fn commit<'a>(&self, p: &KeyPlan<'a>, stamp: PassStamp, now_ms: i64) -> Commit<'a> {
        let history_limit = p.history_limit(&self.settings);
        let window_ms = p.window_ms();
        let updated = cas::update(
            self.ctx.cache.as_ref(),
            &p.key,
            Some(p.ttl(&self.settings)),
            self.settings.effective_cas_retries(),
            |current| {
                let entry = decode(&p.key, current);
                let found = findings(p, entry.as_ref(), now_ms);
                let (deny, warn_finding) = decisive(&found);
                if let Some(deny) = deny {
                    return Step::Done(Commit {
                        late_deny: Some(deny.clone()),
                        warn: None,
                    });
                }
                let commit = Commit {
                    late_deny: None,
                    warn: warn_finding.cloned(),
                };
                let mut next = entry.unwrap_or_else(|| RecentPassEntry::new(p.key.as_str()));
                next.record_pass(stamp, history_limit, window_ms);
                match next.to_cache_value(&p.key) {
                    Ok(value) => Step::Write(value, commit),
                    Err(e) => {
                        warn!(cache_key = %p.key, error = %e, "pass history not recorded");
                        Step::Done(commit)
                    }
                }
            },
        );
        updated.unwrap_or_else(|e| {
            warn!(cache_key = %p.key, error = %e, "pass history not recorded");
            Commit::default()
        })
    }

    fn submit(&self, command: DeviceCommand) {
        let kind = command.kind();
        if !self.ctx.sink.submit(command) {
            warn!(command_kind = kind, "anti-passback side effect dropped");
        }
    }
}

/// Decode a cached history. Unreadable values count as no history and are
/// overwritten on the next pass.
fn decode(key: &str, value: Option<&CacheValue>) -> Option<RecentPassEntry> {
    let value = value?;
    match RecentPassEntry::from_cache_value(key, value) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(cache_key = key, error = %e, "discarding unreadable pass history");
            None
        }
    }
}
