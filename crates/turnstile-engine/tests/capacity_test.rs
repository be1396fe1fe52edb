//! Capacity evaluator: STRICT/WARNING entries, exits, reset, alerts,
//! occupancy, and fail-open behaviour.

use std::sync::Arc;

use turnstile_cache::MemoryStateCache;
use turnstile_core::config::CapacitySettings;
use turnstile_core::keys;
use turnstile_core::models::{AlertKind, DecisionStage, PolicyKind, ResultCode};
use turnstile_core::traits::{CacheValue, ManualClock, StateCache};
use turnstile_engine::{CapacityEvaluator, EngineContext};

use test_fixtures::{rule_store, FailingCache, RecordingSink};

struct Harness {
    evaluator: CapacityEvaluator,
    cache: Arc<MemoryStateCache>,
    sink: Arc<RecordingSink>,
}

fn harness_with(settings: CapacitySettings) -> Harness {
    let cache = Arc::new(MemoryStateCache::new(1_000));
    let sink = Arc::new(RecordingSink::new());
    let ctx = EngineContext::new(
        Arc::new(rule_store("rules/capacity.toml")),
        cache.clone(),
        sink.clone(),
        Arc::new(ManualClock::starting_now()),
    );
    Harness {
        evaluator: CapacityEvaluator::new(ctx, settings),
        cache,
        sink,
    }
}

fn harness() -> Harness {
    harness_with(CapacitySettings::default())
}

fn count(h: &Harness, area_id: i64) -> Option<i64> {
    h.cache
        .get(&keys::capacity_count(area_id))
        .unwrap()
        .and_then(|v| v.as_counter())
}

fn blocked(h: &Harness, area_id: i64) -> Option<i64> {
    h.cache
        .get(&keys::capacity_blocked(area_id))
        .unwrap()
        .and_then(|v| v.as_counter())
}

// ---- STRICT ----

#[test]
fn strict_denies_entry_past_cap_and_keeps_count() {
    let h = harness();
    h.cache
        .set(&keys::capacity_count(101), CacheValue::Counter(95), None)
        .unwrap();

    let result = h.evaluator.evaluate(101, 10);

    assert!(!result.allowed);
    assert_eq!(result.result_code, ResultCode::CapacityExceeded);
    assert_eq!(result.decided_by, Some(PolicyKind::Capacity));
    assert_eq!(result.stage, DecisionStage::CapacityCheck);
    assert!(result.message.contains("超过最大容量"), "{}", result.message);
    assert!(result.message.contains("禁止进入"), "{}", result.message);
    assert_eq!(count(&h, 101), Some(95));
    assert_eq!(blocked(&h, 101), Some(1));
}

#[test]
fn strict_admits_exactly_up_to_cap() {
    let h = harness();
    h.cache
        .set(&keys::capacity_count(101), CacheValue::Counter(95), None)
        .unwrap();

    let result = h.evaluator.evaluate(101, 5);

    assert!(result.allowed);
    assert_eq!(result.result_code, ResultCode::Normal);
    assert_eq!(result.message, "正常通行");
    assert_eq!(count(&h, 101), Some(100));
}

#[test]
fn first_entry_starts_from_persisted_count() {
    let h = harness();

    assert!(h.evaluator.evaluate(104, 2).allowed);
    assert_eq!(count(&h, 104), Some(50));

    let denied = h.evaluator.evaluate(104, 1);
    assert!(!denied.allowed);
    assert_eq!(count(&h, 104), Some(50));
}

// ---- WARNING ----

#[test]
fn warning_admits_past_cap_and_updates_count() {
    let h = harness();
    h.cache
        .set(&keys::capacity_count(102), CacheValue::Counter(95), None)
        .unwrap();

    let result = h.evaluator.evaluate(102, 10);

    assert!(result.allowed);
    assert_eq!(result.result_code, ResultCode::CapacityWarning);
    assert!(result.message.contains("警告"), "{}", result.message);
    assert!(result.message.contains("超过最大容量"), "{}", result.message);
    assert!(result.is_warning());
    assert_eq!(count(&h, 102), Some(105));

    let overruns: Vec<_> = h
        .sink
        .alerts()
        .into_iter()
        .filter(|a| a.kind == AlertKind::CapacityOverrun)
        .collect();
    assert_eq!(overruns.len(), 1);
}

#[test]
fn warning_ceiling_rejects_when_configured() {
    let h = harness_with(CapacitySettings {
        warning_ceiling_ratio: Some(1.1),
        ..Default::default()
    });
    h.cache
        .set(&keys::capacity_count(102), CacheValue::Counter(105), None)
        .unwrap();

    let result = h.evaluator.evaluate(102, 10);

    assert!(!result.allowed);
    assert!(result.message.contains("警戒上限110"), "{}", result.message);
    assert_eq!(count(&h, 102), Some(105));
}

// ---- Exit / reset ----

#[test]
fn exit_clamps_at_zero() {
    let h = harness();
    h.cache
        .set(&keys::capacity_count(101), CacheValue::Counter(2), None)
        .unwrap();

    let result = h.evaluator.evaluate(101, -5);

    assert!(result.allowed);
    assert_eq!(count(&h, 101), Some(0));
}

#[test]
fn exit_below_cap_clears_blocked_flag() {
    let h = harness();
    h.cache
        .set(&keys::capacity_count(101), CacheValue::Counter(100), None)
        .unwrap();
    assert!(!h.evaluator.evaluate(101, 1).allowed);
    assert_eq!(blocked(&h, 101), Some(1));

    h.evaluator.evaluate(101, -1);

    assert_eq!(count(&h, 101), Some(99));
    assert_eq!(blocked(&h, 101), Some(0));
}

#[test]
fn reset_zeroes_count_and_blocked_flag() {
    let h = harness();
    h.cache
        .set(&keys::capacity_count(101), CacheValue::Counter(100), None)
        .unwrap();
    h.evaluator.evaluate(101, 1);

    let result = h.evaluator.reset(101);

    assert!(result.allowed);
    assert!(result.message.contains("重置为0"), "{}", result.message);
    assert_eq!(count(&h, 101), Some(0));
    assert_eq!(blocked(&h, 101), Some(0));
}

#[test]
fn reset_entry_exit_entry_stays_consistent() {
    let h = harness();
    h.evaluator.reset(101);
    assert!(h.evaluator.evaluate(101, 3).allowed);
    assert!(h.evaluator.evaluate(101, -1).allowed);
    assert!(h.evaluator.evaluate(101, 2).allowed);
    assert_eq!(count(&h, 101), Some(4));
}

// ---- Missing rules ----

#[test]
fn unknown_or_disabled_area_allows_without_state() {
    let h = harness();

    assert!(h.evaluator.evaluate(999, 500).allowed);
    assert!(h.evaluator.evaluate(103, 500).allowed);

    assert_eq!(count(&h, 999), None);
    assert_eq!(count(&h, 103), None);
    assert!(h.sink.commands().is_empty());
}

// ---- Alerts / occupancy ----

#[test]
fn crossing_alert_threshold_raises_one_alert() {
    let h = harness();
    h.cache
        .set(&keys::capacity_count(101), CacheValue::Counter(88), None)
        .unwrap();

    h.evaluator.evaluate(101, 1);
    assert!(h.sink.alerts().is_empty());

    h.evaluator.evaluate(101, 1);
    h.evaluator.evaluate(101, 1);

    let alerts = h.sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::CapacityThreshold);
    assert_eq!(alerts[0].area_id, 101);
}

#[test]
fn occupancy_reports_utilization() {
    let h = harness();
    h.evaluator.evaluate(101, 25);

    let snapshot = h.evaluator.occupancy(101).unwrap().unwrap();

    assert_eq!(snapshot.current_count, 25);
    assert_eq!(snapshot.max_capacity, 100);
    assert!((snapshot.utilization_pct - 25.0).abs() < f64::EPSILON);
    assert!(!snapshot.entry_blocked);
    assert!(h.evaluator.occupancy(999).unwrap().is_none());
}

#[test]
fn occupancy_falls_back_to_persisted_count() {
    let h = harness();
    let snapshot = h.evaluator.occupancy(104).unwrap().unwrap();
    assert_eq!(snapshot.current_count, 48);
}

// ---- Cache down ----

#[test]
fn cache_outage_fails_open() {
    let ctx = EngineContext::new(
        Arc::new(rule_store("rules/capacity.toml")),
        Arc::new(FailingCache),
        Arc::new(RecordingSink::new()),
        Arc::new(ManualClock::starting_now()),
    );
    let evaluator = CapacityEvaluator::new(ctx, CapacitySettings::default());

    // Area 104 persists 48 of 50; an outage must not judge on that count.
    assert!(evaluator.evaluate(104, 2).allowed);
    let result = evaluator.evaluate(104, 3);
    assert!(result.allowed);
    assert_eq!(result.result_code, ResultCode::Normal);
    assert!(evaluator.evaluate(101, 500).allowed);
    assert!(evaluator.evaluate(104, -1).allowed);
    assert!(evaluator.occupancy(104).is_err());
}
