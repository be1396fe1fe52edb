//! Rule snapshot parsing/validation and the in-memory rule store.

use std::io::Write;
use std::sync::Arc;

use chrono::Duration;
use turnstile_core::errors::{RuleStoreError, TurnstileErrorCode};
use turnstile_core::models::{AntiPassbackConfig, AntiPassbackMode, Scope};
use turnstile_core::traits::{Clock, ManualClock, RuleStore};
use turnstile_rules::{InMemoryRuleStore, RuleSnapshot};

use test_fixtures::{load_rules, load_rules_merged, rule_store};

fn config(id: i64, mode: AntiPassbackMode, area_id: Option<i64>) -> AntiPassbackConfig {
    AntiPassbackConfig {
        config_id: id,
        mode,
        area_id,
        time_window_ms: 60_000,
        max_pass_count: 1,
        enabled: true,
        effective_time: None,
        expire_time: None,
    }
}

// ---- Parsing & validation ----

#[test]
fn defaults_fill_optional_fields() {
    let snapshot = RuleSnapshot::from_toml_str(
        r#"
        [[capacity]]
        control_id = 1
        area_id = 7
        max_capacity = 10
        control_mode = "WARNING"
        "#,
        "inline",
    )
    .unwrap();

    let rule = &snapshot.capacity[0];
    assert!(rule.enabled);
    assert_eq!(rule.current_count, 0);
    assert_eq!(rule.alert_threshold, None);
    assert!(snapshot.anti_passback.is_empty());
}

#[test]
fn duplicate_ids_are_rejected() {
    let err = RuleSnapshot::from_toml_str(
        r#"
        [[anti_passback]]
        config_id = 1
        mode = "GLOBAL"
        time_window_ms = 1000
        max_pass_count = 1

        [[anti_passback]]
        config_id = 1
        mode = "AREA"
        area_id = 3
        time_window_ms = 1000
        max_pass_count = 1
        "#,
        "inline",
    )
    .unwrap_err();

    assert!(matches!(err, RuleStoreError::InvalidRule { .. }));
    assert_eq!(err.error_code(), "INVALID_RULE");
    assert!(err.to_string().contains("anti_passback#1"));
}

#[test]
fn interlock_needs_two_distinct_areas() {
    let err = RuleSnapshot::from_toml_str(
        r#"
        [[interlock]]
        rule_id = 1
        area_a_id = 5
        area_b_id = 5
        interlock_mode = "BIDIRECTIONAL"
        unlock_condition = "MANUAL"
        "#,
        "inline",
    )
    .unwrap_err();
    assert!(matches!(err, RuleStoreError::InvalidRule { .. }));
}

#[test]
fn unknown_mode_is_a_parse_error() {
    let err = RuleSnapshot::from_toml_str(
        r#"
        [[anti_passback]]
        config_id = 1
        mode = "SOMETIMES"
        time_window_ms = 1000
        max_pass_count = 1
        "#,
        "rules.toml",
    )
    .unwrap_err();
    assert!(matches!(err, RuleStoreError::Parse { ref path, .. } if path == "rules.toml"));
    assert_eq!(err.error_code(), "RULE_STORE_ERROR");
}

#[test]
fn snapshot_survives_toml_round_trip() {
    let original = load_rules("rules/campus.toml");
    let reparsed = RuleSnapshot::from_toml_str(&original.to_toml().unwrap(), "round-trip").unwrap();
    assert_eq!(original, reparsed);
}

#[test]
fn load_from_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("rules.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "[[capacity]]\ncontrol_id = 9\narea_id = 9\nmax_capacity = 3\ncontrol_mode = \"STRICT\""
    )
    .unwrap();

    let store = InMemoryRuleStore::load(&path).unwrap();

    assert_eq!(store.get_enabled_capacity_rule(9).unwrap().unwrap().max_capacity, 3);
    assert!(InMemoryRuleStore::load(&dir.path().join("missing.toml")).is_err());
}

// ---- Store queries ----

#[test]
fn anti_passback_configs_come_in_priority_order() {
    let snapshot = RuleSnapshot::new()
        .with_anti_passback(config(5, AntiPassbackMode::Hard, Some(1)))
        .with_anti_passback(config(4, AntiPassbackMode::Soft, Some(1)))
        .with_anti_passback(config(3, AntiPassbackMode::Area, Some(1)))
        .with_anti_passback(config(9, AntiPassbackMode::Global, None))
        .with_anti_passback(config(2, AntiPassbackMode::Global, None));
    let store = InMemoryRuleStore::new(snapshot);

    let ids: Vec<i64> = store
        .get_enabled_anti_passback_configs()
        .unwrap()
        .iter()
        .map(|c| c.config_id)
        .collect();

    assert_eq!(ids, vec![2, 9, 3, 4, 5]);
}

#[test]
fn configs_follow_the_clock() {
    let clock = Arc::new(ManualClock::starting_now());
    let now = clock.now();
    let mut later = config(1, AntiPassbackMode::Global, None);
    later.effective_time = Some(now + Duration::minutes(10));
    let mut ending = config(2, AntiPassbackMode::Global, None);
    ending.expire_time = Some(now + Duration::minutes(5));
    let store = InMemoryRuleStore::with_clock(
        RuleSnapshot::new().with_anti_passback(later).with_anti_passback(ending),
        clock.clone(),
    );

    let active = |store: &InMemoryRuleStore| -> Vec<i64> {
        store
            .get_enabled_anti_passback_configs()
            .unwrap()
            .iter()
            .map(|c| c.config_id)
            .collect()
    };

    assert_eq!(active(&store), vec![2]);
    clock.advance_ms(6 * 60 * 1000);
    assert!(active(&store).is_empty());
    clock.advance_ms(5 * 60 * 1000);
    assert_eq!(active(&store), vec![1]);
}

#[test]
fn capacity_lookup_skips_disabled_rules() {
    let store = rule_store("rules/capacity.toml");
    assert!(store.get_enabled_capacity_rule(101).unwrap().is_some());
    assert!(store.get_enabled_capacity_rule(103).unwrap().is_none());
    assert!(store.get_enabled_capacity_rule(999).unwrap().is_none());
}

#[test]
fn interlock_lookup_honours_direction_and_priority() {
    let store = rule_store("rules/interlock.toml");

    let from_a: Vec<i64> = store
        .get_enabled_interlock_rules_by_area(201)
        .unwrap()
        .iter()
        .map(|r| r.rule_id)
        .collect();
    assert_eq!(from_a, vec![1]);

    assert_eq!(store.get_enabled_interlock_rules_by_area(301).unwrap().len(), 1);
    assert!(store.get_enabled_interlock_rules_by_area(302).unwrap().is_empty());
    assert!(store.get_interlock_rule(4).unwrap().is_some());
    assert!(store.get_interlock_rule(40).unwrap().is_none());
}

// ---- Scopes ----

#[test]
fn rules_for_scope() {
    let store = InMemoryRuleStore::new(load_rules_merged(&[
        "rules/capacity.toml",
        "rules/anti_passback_global.toml",
        "rules/anti_passback_area.toml",
        "rules/interlock.toml",
    ]));

    let global = store.rules_for(&Scope::Global { user_id: 1 }).unwrap();
    assert_eq!(global.anti_passback.len(), 1);
    assert!(global.capacity.is_none());

    let area = store.rules_for(&Scope::Area { user_id: 1, area_id: 101 }).unwrap();
    assert_eq!(area.anti_passback.len(), 1);
    assert_eq!(area.capacity.map(|r| r.control_id), Some(1));

    let pair = store.rules_for(&Scope::AreaPair { area_a: 202, area_b: 201 }).unwrap();
    assert_eq!(pair.interlock.len(), 1);
    assert_eq!(pair.interlock[0].rule_id, 1);
}

// ---- Replacement ----

#[test]
fn replace_swaps_without_disturbing_held_snapshots() {
    let store = rule_store("rules/capacity.toml");
    let before = store.snapshot().unwrap();

    store.replace(load_rules("rules/campus.toml")).unwrap();

    assert_eq!(before.capacity.len(), 4);
    assert!(store.get_enabled_capacity_rule(101).unwrap().is_none());
    assert!(store.get_enabled_capacity_rule(500).unwrap().is_some());
}

#[test]
fn invalid_replacement_keeps_current_rules() {
    let store = rule_store("rules/capacity.toml");
    let broken = RuleSnapshot::new()
        .with_anti_passback(config(1, AntiPassbackMode::Global, Some(3)));

    assert!(store.replace(broken).is_err());
    assert!(store.get_enabled_capacity_rule(101).unwrap().is_some());
}
