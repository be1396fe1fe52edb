//! Decision orchestrator.
//!
//! `RECEIVED -> CAPACITY_CHECK -> ANTIPASSBACK_CHECK -> INTERLOCK_DISPATCH
//! -> RESPONDED`. A capacity or anti-passback deny ends the pipeline and
//! the result keeps the stage that denied; interlock only runs for an
//! allowed pass or a door close.

use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use turnstile_core::config::{EngineConfig, TurnstileConfig};
use turnstile_core::models::{
    AccessEvent, AccessEventType, DecisionResult, DecisionStage, DetectOutcome, PolicyKind,
    ResultCode,
};

use crate::{AntiPassbackEvaluator, CapacityEvaluator, EngineContext, InterlockEvaluator};

pub struct DecisionEvaluator {
    capacity: CapacityEvaluator,
    anti_passback: AntiPassbackEvaluator,
    interlock: InterlockEvaluator,
    enabled: Vec<PolicyKind>,
    latency_budget: Duration,
}

impl DecisionEvaluator {
    pub fn new(ctx: EngineContext, config: &TurnstileConfig) -> Self {
        Self {
            capacity: CapacityEvaluator::new(ctx.clone(), config.capacity.clone()),
            anti_passback: AntiPassbackEvaluator::new(ctx.clone(), config.anti_passback.clone()),
            interlock: InterlockEvaluator::new(ctx),
            enabled: config.engine.effective_enabled_policies(),
            latency_budget: Duration::from_millis(config.engine.effective_latency_budget_ms()),
        }
    }

    /// Replace the engine section (enabled policies, latency budget).
    pub fn with_engine_config(mut self, engine: &EngineConfig) -> Self {
        self.enabled = engine.effective_enabled_policies();
        self.latency_budget = Duration::from_millis(engine.effective_latency_budget_ms());
        self
    }

    pub fn capacity(&self) -> &CapacityEvaluator {
        &self.capacity
    }

    pub fn anti_passback(&self) -> &AntiPassbackEvaluator {
        &self.anti_passback
    }

    pub fn interlock(&self) -> &InterlockEvaluator {
        &self.interlock
    }

    fn is_enabled(&self, policy: PolicyKind) -> bool {
        self.enabled.contains(&policy)
    }

    /// Judge one swipe and queue its side effects.
    #[instrument(
        level = "debug",
        skip(self, event),
        fields(user_id = event.user_id, area_id = event.area_id, event_type = %event.event_type)
    )]
    pub fn evaluate(&self, event: &AccessEvent) -> DecisionResult {
        let started = Instant::now();
        let mut result = self.run(event);
        if result.allowed {
            result.stage = DecisionStage::Responded;
        }

        let elapsed = started.elapsed();
        result.evaluation_time_ms = elapsed.as_millis() as u64;
        if elapsed > self.latency_budget {
            result.over_budget = true;
            warn!(
                evaluation_time_ms = result.evaluation_time_ms,
                latency_budget_ms = self.latency_budget.as_millis() as u64,
                "decision over latency budget"
            );
        }
        debug!(
            allowed = result.allowed,
            result_code = result.code(),
            evaluation_time_ms = result.evaluation_time_ms,
            "decision"
        );
        result
    }

    /// Judge swipes in order; each sees the state left by the previous one.
    pub fn evaluate_batch(&self, events: &[AccessEvent]) -> Vec<DecisionResult> {
        events.iter().map(|event| self.evaluate(event)).collect()
    }

    fn run(&self, event: &AccessEvent) -> DecisionResult {
        let mut verdict = DecisionResult::allow();
        let headcount = i64::from(event.headcount.max(1));

        // Capacity
        let capacity_delta = match event.event_type {
            AccessEventType::Entry => Some(headcount),
            AccessEventType::Exit => Some(-headcount),
            AccessEventType::DoorOpen | AccessEventType::DoorClose => None,
        };
        let mut admitted = 0;
        if let (Some(delta), true) = (capacity_delta, self.is_enabled(PolicyKind::Capacity)) {
            let capacity = self.capacity.evaluate(event.area_id, delta);
            if !capacity.allowed {
                return capacity;
            }
            if delta > 0 {
                admitted = delta;
            }
            merge_warning(&mut verdict, capacity);
        }

        // Anti-passback
        if event.event_type.is_pass() && self.is_enabled(PolicyKind::AntiPassback) {
            let detection = self.anti_passback.detect(&event.detect_form());
            if !detection.allowed {
                if admitted > 0 {
                    self.capacity.evaluate(event.area_id, -admitted);
                }
                return DecisionResult::deny(
                    ResultCode::from(detection.outcome),
                    detection.message,
                    PolicyKind::AntiPassback,
                )
                .at_stage(DecisionStage::AntiPassbackCheck);
            }
            if detection.outcome == DetectOutcome::Soft {
                let warning = DecisionResult::warn(
                    ResultCode::SoftViolation,
                    detection.message,
                    PolicyKind::AntiPassback,
                );
                merge_warning(&mut verdict, warning);
            }
        }

        // Interlock
        let interlock_relevant = event.event_type.is_pass()
            || event.event_type == AccessEventType::DoorClose;
        if interlock_relevant && self.is_enabled(PolicyKind::Interlock) {
            let outcome =
                self.interlock
                    .trigger_interlock(event.area_id, event.door_id, event.event_type);
            verdict.interlock_rules_triggered = outcome.rules_triggered;
        }

        verdict
    }
}

/// Fold an allowed stage result into the running verdict. The first
/// warning sets the result code and message; later ones are appended.
fn merge_warning(verdict: &mut DecisionResult, stage: DecisionResult) {
    if stage.warnings.is_empty() {
        return;
    }
    if verdict.warnings.is_empty() {
        verdict.result_code = stage.result_code;
        verdict.message = stage.message;
        verdict.decided_by = stage.decided_by;
    }
    verdict.warnings.extend(stage.warnings);
}
