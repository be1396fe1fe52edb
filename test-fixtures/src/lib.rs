//! Rule fixtures and test doubles for Turnstile integration tests.
//!
//! Fixture files live under `test-fixtures/rules/` as TOML rule snapshots.
//! The loaders panic on missing or malformed files; they are for tests only.

pub mod doubles;

use std::path::PathBuf;

use turnstile_rules::{InMemoryRuleStore, RuleSnapshot};

pub use doubles::{
    CountingCache, CountingRuleStore, FailingCache, GatewayCall, RecordingGateway, RecordingSink,
};

/// Root directory of the test-fixtures folder.
pub fn fixtures_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Absolute path to a fixture file.
pub fn fixture_path(relative_path: &str) -> PathBuf {
    fixtures_root().join(relative_path)
}

/// Load and validate a rule snapshot, e.g. `load_rules("rules/campus.toml")`.
///
/// # Panics
/// Panics if the file doesn't exist or fails validation.
pub fn load_rules(relative_path: &str) -> RuleSnapshot {
    let path = fixture_path(relative_path);
    RuleSnapshot::load(&path)
        .unwrap_or_else(|e| panic!("Failed to load rule fixture {}: {}", path.display(), e))
}

/// Merge several fixture files into one snapshot.
pub fn load_rules_merged(relative_paths: &[&str]) -> RuleSnapshot {
    relative_paths
        .iter()
        .map(|p| load_rules(p))
        .fold(RuleSnapshot::default(), |mut acc, s| {
            acc.capacity.extend(s.capacity);
            acc.anti_passback.extend(s.anti_passback);
            acc.interlock.extend(s.interlock);
            acc
        })
}

/// In-memory rule store over a fixture file.
pub fn rule_store(relative_path: &str) -> InMemoryRuleStore {
    InMemoryRuleStore::new(load_rules(relative_path))
}

/// All TOML files in a fixture subdirectory.
pub fn list_fixtures(subdir: &str) -> Vec<PathBuf> {
    let dir = fixtures_root().join(subdir);
    if !dir.exists() {
        return Vec::new();
    }
    std::fs::read_dir(&dir)
        .unwrap_or_else(|e| panic!("Failed to read directory {}: {}", dir.display(), e))
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            path.extension().is_some_and(|ext| ext == "toml").then_some(path)
        })
        .collect()
}
