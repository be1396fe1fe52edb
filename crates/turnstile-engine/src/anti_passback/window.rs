//! Per-key planning and time-window judging.

use std::time::Duration;

use turnstile_core::config::AntiPassbackSettings;
use turnstile_core::models::{
    AntiPassbackConfig, AntiPassbackViolation, DetectForm, PassStamp, RecentPassEntry,
    RecentPassInfo, ViolationKind, ViolationResponse,
};

/// The configs sharing one cache key.
#[derive(Debug)]
pub(crate) struct KeyPlan<'a> {
    pub key: String,
    pub configs: Vec<&'a AntiPassbackConfig>,
}

impl KeyPlan<'_> {
    /// Longest window among the configs; the entry's count tracks this one.
    pub fn window_ms(&self) -> u64 {
        self.configs.iter().map(|c| c.time_window_ms).max().unwrap_or(0)
    }

    /// Enough history to count up to every config's budget.
    pub fn history_limit(&self, settings: &AntiPassbackSettings) -> usize {
        let budget = self
            .configs
            .iter()
            .map(|c| c.max_pass_count as usize)
            .max()
            .unwrap_or(0);
        settings.effective_history_limit().max(budget)
    }

    pub fn ttl(&self, settings: &AntiPassbackSettings) -> Duration {
        self.configs
            .iter()
            .map(|c| settings.ttl_for_window(c.time_window_ms))
            .max()
            .unwrap_or_else(|| settings.effective_cache_ttl())
    }
}

/// Group the configs that apply to `form` by cache key, keeping the
/// priority order of `configs` both across and within keys.
pub(crate) fn plan<'a>(configs: &'a [AntiPassbackConfig], form: &DetectForm) -> Vec<KeyPlan<'a>> {
    let mut plans: Vec<KeyPlan<'a>> = Vec::new();
    for config in configs {
        let Some(scope) = config.scope_for(form.user_id, form.area_id) else {
            continue;
        };
        let key = scope.cache_key();
        match plans.iter_mut().find(|p| p.key == key) {
            Some(plan) => plan.configs.push(config),
            None => plans.push(KeyPlan { key, configs: vec![config] }),
        }
    }
    plans
}

/// A config whose pass budget is already spent.
#[derive(Debug, Clone)]
pub(crate) struct Finding<'a> {
    pub config: &'a AntiPassbackConfig,
    pub scope_key: String,
    pub count: u32,
    pub latest: Option<PassStamp>,
}

impl Finding<'_> {
    pub fn response(&self) -> ViolationResponse {
        self.config.mode.violation_response()
    }

    pub fn to_violation(&self, now_ms: i64) -> AntiPassbackViolation {
        AntiPassbackViolation {
            kind: ViolationKind::TimeWindow,
            message: format!("时间窗口内已通行{}次", self.count),
            config_id: self.config.config_id,
            mode: self.config.mode,
            scope_key: self.scope_key.clone(),
            count_in_window: self.count,
            recent_pass: self.latest.map(|p| RecentPassInfo {
                pass_time_ms: p.at_ms,
                device_id: p.device_id,
                area_id: p.area_id,
                seconds_ago: now_ms.saturating_sub(p.at_ms) / 1000,
            }),
        }
    }
}

/// Every config of `plan` whose window already holds `max_pass_count`
/// passes, in priority order.
pub(crate) fn findings<'a>(
    plan: &KeyPlan<'a>,
    entry: Option<&RecentPassEntry>,
    now_ms: i64,
) -> Vec<Finding<'a>> {
    let Some(entry) = entry else {
        return Vec::new();
    };
    plan.configs
        .iter()
        .filter_map(|&config| {
            let count = entry.count_in_window(now_ms, config.time_window_ms);
            (count >= config.max_pass_count).then(|| Finding {
                config,
                scope_key: plan.key.clone(),
                count,
                latest: entry.latest().copied(),
            })
        })
        .collect()
}

/// The first denying finding, else the first warning one.
pub(crate) fn decisive<'a, 'b>(
    findings: &'b [Finding<'a>],
) -> (Option<&'b Finding<'a>>, Option<&'b Finding<'a>>) {
    let by_priority = |f: &&Finding<'a>| (f.config.mode.priority(), f.config.config_id);
    let deny = findings
        .iter()
        .filter(|f| f.response() == ViolationResponse::Deny)
        .min_by_key(by_priority);
    let warn = findings
        .iter()
        .filter(|f| f.response() == ViolationResponse::Warn)
        .min_by_key(by_priority);
    (deny, warn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_core::models::AntiPassbackMode;

    fn config(id: i64, mode: AntiPassbackMode, area: Option<i64>, max: u32) -> AntiPassbackConfig {
        AntiPassbackConfig {
            config_id: id,
            mode,
            area_id: area,
            time_window_ms: 60_000,
            max_pass_count: max,
            enabled: true,
            effective_time: None,
            expire_time: None,
        }
    }

    fn form(area_id: i64) -> DetectForm {
        DetectForm { user_id: 7, device_id: 1, area_id, skip_detection: false }
    }

    #[test]
    fn configs_on_one_area_share_a_plan() {
        let configs = vec![
            config(1, AntiPassbackMode::Global, None, 3),
            config(2, AntiPassbackMode::Area, Some(5), 1),
            config(3, AntiPassbackMode::Hard, Some(5), 2),
            config(4, AntiPassbackMode::Hard, Some(6), 1),
        ];
        let plans = plan(&configs, &form(5));
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].key, "anti_passback:user:7");
        assert_eq!(plans[1].key, "anti_passback:user:7:area:5");
        assert_eq!(plans[1].configs.len(), 2);
    }

    #[test]
    fn history_covers_largest_budget() {
        let configs = vec![config(1, AntiPassbackMode::Hard, Some(5), 25)];
        let plans = plan(&configs, &form(5));
        assert_eq!(plans[0].history_limit(&AntiPassbackSettings::default()), 25);
    }

    #[test]
    fn deny_outranks_warn() {
        let configs = vec![
            config(1, AntiPassbackMode::Soft, Some(5), 1),
            config(2, AntiPassbackMode::Hard, Some(5), 1),
        ];
        let plans = plan(&configs, &form(5));
        let mut entry = RecentPassEntry::new(&plans[0].key);
        entry.record_pass(PassStamp { at_ms: 1_000, device_id: 1, area_id: 5 }, 10, 60_000);
        let found = findings(&plans[0], Some(&entry), 2_000);
        let (deny, warn) = decisive(&found);
        assert_eq!(deny.map(|f| f.config.config_id), Some(2));
        assert_eq!(warn.map(|f| f.config.config_id), Some(1));
    }
}
