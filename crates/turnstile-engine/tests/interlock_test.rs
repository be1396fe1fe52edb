//! Interlock trigger, release, manual unlock, dry run, and status.

use std::sync::Arc;
use std::time::Duration;

use turnstile_cache::MemoryStateCache;
use turnstile_core::errors::{AccessError, TurnstileErrorCode};
use turnstile_core::models::{AccessEventType, DeviceCommand};
use turnstile_core::traits::ManualClock;
use turnstile_engine::{EngineContext, InterlockEvaluator};

use test_fixtures::{rule_store, FailingCache, RecordingSink};

fn harness() -> (InterlockEvaluator, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let ctx = EngineContext::new(
        Arc::new(rule_store("rules/interlock.toml")),
        Arc::new(MemoryStateCache::new(1_000)),
        sink.clone(),
        Arc::new(ManualClock::starting_now()),
    );
    (InterlockEvaluator::new(ctx), sink)
}

// ---- Trigger ----

#[test]
fn bidirectional_open_locks_the_other_side() {
    let (interlock, sink) = harness();

    let outcome = interlock.trigger_interlock(201, Some(2011), AccessEventType::DoorOpen);

    assert_eq!(outcome.rules_triggered, 1);
    assert_eq!(outcome.locked_areas, vec![202]);
    assert_eq!(outcome.message, "互锁触发成功，共触发1条规则");
    assert_eq!(sink.locks(), vec![(202, vec![2021], None)]);

    sink.clear();
    let reverse = interlock.trigger_interlock(202, Some(2021), AccessEventType::DoorOpen);
    assert_eq!(reverse.locked_areas, vec![201]);
    assert_eq!(sink.locks(), vec![(201, vec![2011, 2012], None)]);
}

#[test]
fn unidirectional_locks_only_forward() {
    let (interlock, sink) = harness();

    let forward = interlock.trigger_interlock(301, None, AccessEventType::Entry);
    assert_eq!(forward.rules_triggered, 1);
    assert_eq!(
        sink.locks(),
        vec![(302, vec![3021, 3022], Some(Duration::from_secs(10)))]
    );

    sink.clear();
    let backward = interlock.trigger_interlock(302, None, AccessEventType::DoorOpen);
    assert_eq!(backward.rules_triggered, 0);
    assert!(sink.locks().is_empty());
}

#[test]
fn no_matching_rule_is_informational() {
    let (interlock, sink) = harness();

    let outcome = interlock.trigger_interlock(999, None, AccessEventType::DoorOpen);

    assert_eq!(outcome.rules_triggered, 0);
    assert_eq!(outcome.message, "未找到匹配的互锁规则");
    assert!(sink.commands().is_empty());
}

#[test]
fn disabled_rule_never_fires() {
    let (interlock, sink) = harness();
    interlock.trigger_interlock(203, None, AccessEventType::DoorOpen);
    assert!(sink.locks().is_empty());

    interlock.trigger_interlock(201, None, AccessEventType::DoorOpen);
    assert!(sink.locks().iter().all(|(area, _, _)| *area != 203));
}

#[test]
fn exit_is_not_an_interlock_event() {
    let (interlock, sink) = harness();
    let outcome = interlock.trigger_interlock(201, None, AccessEventType::Exit);
    assert_eq!(outcome.message, "事件无需互锁处理");
    assert!(sink.commands().is_empty());
}

// ---- Release ----

#[test]
fn door_close_releases_door_closed_rules() {
    let (interlock, sink) = harness();
    interlock.trigger_interlock(201, Some(2011), AccessEventType::DoorOpen);
    assert_eq!(interlock.status(1).unwrap().locked_area, Some(202));

    let outcome = interlock.trigger_interlock(201, Some(2011), AccessEventType::DoorClose);

    assert_eq!(outcome.released_areas, vec![202]);
    assert_eq!(sink.unlocks(), vec![(202, vec![2021])]);
    assert_eq!(interlock.status(1).unwrap().locked_area, None);
}

#[test]
fn door_close_without_lock_does_nothing() {
    let (interlock, sink) = harness();
    let outcome = interlock.trigger_interlock(201, Some(2011), AccessEventType::DoorClose);
    assert!(outcome.released_areas.is_empty());
    assert!(sink.unlocks().is_empty());
}

#[test]
fn door_close_ignores_manual_rules() {
    let (interlock, sink) = harness();
    interlock.trigger_interlock(401, None, AccessEventType::DoorOpen);

    let outcome = interlock.trigger_interlock(401, None, AccessEventType::DoorClose);

    assert_eq!(outcome.message, "未找到匹配的互锁规则");
    assert!(sink.unlocks().is_empty());
    assert_eq!(interlock.status(3).unwrap().locked_area, Some(402));
}

// ---- Manual unlock ----

#[test]
fn manual_unlock_sends_unlock_and_clears_state() {
    let (interlock, sink) = harness();
    interlock.trigger_interlock(401, None, AccessEventType::DoorOpen);

    assert!(interlock.manual_unlock(3, 402).unwrap());

    assert_eq!(sink.unlocks(), vec![(402, vec![4021])]);
    assert_eq!(interlock.status(3).unwrap().locked_area, None);
}

#[test]
fn manual_unlock_unknown_rule_is_an_error() {
    let (interlock, sink) = harness();

    let err = interlock.manual_unlock(42, 1).unwrap_err();

    assert!(matches!(err, AccessError::RuleNotFound { rule_id: 42, .. }));
    assert_eq!(err.error_code(), "RULE_NOT_FOUND");
    assert!(sink.commands().is_empty());
}

#[test]
fn manual_unlock_rejects_foreign_area() {
    let (interlock, _sink) = harness();
    let err = interlock.manual_unlock(3, 999).unwrap_err();
    assert!(matches!(err, AccessError::InvalidArgument { .. }));
}

// ---- Dry run / status ----

#[test]
fn test_rule_has_no_side_effects() {
    let (interlock, sink) = harness();

    let report = interlock.test_rule(2, 301).unwrap();

    assert_eq!(report.would_lock_area, Some(302));
    assert_eq!(report.door_ids, vec![3021, 3022]);
    assert_eq!(report.hold, Some(Duration::from_secs(10)));
    assert!(sink.commands().is_empty());
    assert_eq!(interlock.status(2).unwrap().trigger_count, 0);

    let reverse = interlock.test_rule(2, 302).unwrap();
    assert_eq!(reverse.would_lock_area, None);
    assert!(reverse.door_ids.is_empty());

    assert!(matches!(
        interlock.test_rule(99, 301),
        Err(AccessError::RuleNotFound { .. })
    ));
}

#[test]
fn status_counts_triggers() {
    let (interlock, _sink) = harness();
    interlock.trigger_interlock(201, None, AccessEventType::DoorOpen);
    interlock.trigger_interlock(202, None, AccessEventType::DoorOpen);

    let status = interlock.status(1).unwrap();

    assert_eq!(status.trigger_count, 2);
    assert_eq!(status.locked_area, Some(201));
}

// ---- Cache down ----

#[test]
fn cache_outage_still_dispatches_locks() {
    let sink = Arc::new(RecordingSink::new());
    let ctx = EngineContext::new(
        Arc::new(rule_store("rules/interlock.toml")),
        Arc::new(FailingCache),
        sink.clone(),
        Arc::new(ManualClock::starting_now()),
    );
    let interlock = InterlockEvaluator::new(ctx);

    let outcome = interlock.trigger_interlock(201, None, AccessEventType::DoorOpen);

    assert_eq!(outcome.rules_triggered, 1);
    assert!(matches!(
        sink.commands().as_slice(),
        [DeviceCommand::LockDoors { area_id: 202, .. }]
    ));
    assert!(interlock.status(1).is_err());
}
