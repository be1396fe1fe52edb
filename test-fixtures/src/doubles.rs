//! Test doubles for the engine's collaborator traits.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use turnstile_core::errors::{CacheError, GatewayError, RuleStoreError};
use turnstile_core::models::{
    AccessAlert, AntiPassbackConfig, AreaId, CapacityRule, DetectionRecord, DeviceCommand, DoorId,
    InterlockRule, RuleId,
};
use turnstile_core::traits::{CacheValue, CommandSink, DeviceGateway, RuleStore, StateCache};

/// Command sink that keeps everything it is given.
#[derive(Debug)]
pub struct RecordingSink {
    commands: Mutex<Vec<DeviceCommand>>,
    accepting: AtomicBool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            accepting: AtomicBool::new(true),
        }
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `submit` drop everything, like a full queue.
    pub fn reject_all(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// `(area_id, door_ids, hold)` of every lock command.
    pub fn locks(&self) -> Vec<(AreaId, Vec<DoorId>, Option<Duration>)> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCommand::LockDoors { area_id, door_ids, hold, .. } => {
                    Some((area_id, door_ids, hold))
                }
                _ => None,
            })
            .collect()
    }

    pub fn unlocks(&self) -> Vec<(AreaId, Vec<DoorId>)> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCommand::UnlockDoors { area_id, door_ids, .. } => Some((area_id, door_ids)),
                _ => None,
            })
            .collect()
    }

    pub fn alerts(&self) -> Vec<AccessAlert> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCommand::RaiseAlert(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    pub fn records(&self) -> Vec<DetectionRecord> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCommand::RecordDetection(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.commands.lock().unwrap().clear();
    }
}

impl CommandSink for RecordingSink {
    fn submit(&self, command: DeviceCommand) -> bool {
        if !self.accepting.load(Ordering::SeqCst) {
            return false;
        }
        self.commands.lock().unwrap().push(command);
        true
    }
}

/// A cache whose backend is down.
#[derive(Debug, Default)]
pub struct FailingCache;

fn down() -> CacheError {
    CacheError::Unavailable {
        message: "connection refused".to_string(),
    }
}

impl StateCache for FailingCache {
    fn get(&self, _key: &str) -> Result<Option<CacheValue>, CacheError> {
        Err(down())
    }

    fn set(&self, _key: &str, _value: CacheValue, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Err(down())
    }

    fn incr_by(&self, _key: &str, _delta: i64, _ttl: Option<Duration>) -> Result<i64, CacheError> {
        Err(down())
    }

    fn compare_and_set(
        &self,
        _key: &str,
        _expected: Option<&CacheValue>,
        _new: CacheValue,
        _ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        Err(down())
    }

    fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        Err(down())
    }

    fn delete_prefix(&self, _prefix: &str) -> Result<usize, CacheError> {
        Err(down())
    }
}

/// Delegating cache that counts every call, and writes separately.
pub struct CountingCache {
    inner: Arc<dyn StateCache>,
    calls: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingCache {
    pub fn new(inner: Arc<dyn StateCache>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that could mutate state: everything but `get`.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn tick_write(&self) {
        self.tick();
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl StateCache for CountingCache {
    fn get(&self, key: &str) -> Result<Option<CacheValue>, CacheError> {
        self.tick();
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.tick_write();
        self.inner.set(key, value, ttl)
    }

    fn incr_by(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64, CacheError> {
        self.tick_write();
        self.inner.incr_by(key, delta, ttl)
    }

    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&CacheValue>,
        new: CacheValue,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        self.tick_write();
        self.inner.compare_and_set(key, expected, new, ttl)
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.tick_write();
        self.inner.delete(key)
    }

    fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        self.tick_write();
        self.inner.delete_prefix(prefix)
    }
}

/// Delegating rule store that counts every call.
pub struct CountingRuleStore {
    inner: Arc<dyn RuleStore>,
    calls: AtomicUsize,
}

impl CountingRuleStore {
    pub fn new(inner: Arc<dyn RuleStore>) -> Self {
        Self { inner, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl RuleStore for CountingRuleStore {
    fn get_enabled_capacity_rule(
        &self,
        area_id: AreaId,
    ) -> Result<Option<CapacityRule>, RuleStoreError> {
        self.tick();
        self.inner.get_enabled_capacity_rule(area_id)
    }

    fn get_enabled_anti_passback_configs(
        &self,
    ) -> Result<Vec<AntiPassbackConfig>, RuleStoreError> {
        self.tick();
        self.inner.get_enabled_anti_passback_configs()
    }

    fn get_enabled_interlock_rules_by_area(
        &self,
        area_id: AreaId,
    ) -> Result<Vec<InterlockRule>, RuleStoreError> {
        self.tick();
        self.inner.get_enabled_interlock_rules_by_area(area_id)
    }

    fn get_interlock_rule(&self, rule_id: RuleId) -> Result<Option<InterlockRule>, RuleStoreError> {
        self.tick();
        self.inner.get_interlock_rule(rule_id)
    }
}

/// One call seen by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Lock(Vec<DoorId>, Option<Duration>),
    Unlock(Vec<DoorId>),
    Alert(String),
}

/// Gateway that records calls and can be told to fail the next N of them.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
    failures_remaining: AtomicUsize,
    attempts: AtomicUsize,
    latency: Option<Duration>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `latency` before returning.
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency: Some(latency), ..Self::default() }
    }

    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Successful calls only.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Successful and failed calls.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn call(&self, call: GatewayCall) -> Result<(), GatewayError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(GatewayError::Rejected {
                message: "controller busy".to_string(),
            });
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl DeviceGateway for RecordingGateway {
    fn lock_doors(&self, door_ids: &[DoorId], hold: Option<Duration>) -> Result<(), GatewayError> {
        self.call(GatewayCall::Lock(door_ids.to_vec(), hold))
    }

    fn unlock_doors(&self, door_ids: &[DoorId]) -> Result<(), GatewayError> {
        self.call(GatewayCall::Unlock(door_ids.to_vec()))
    }

    fn raise_alert(&self, alert: &AccessAlert) -> Result<(), GatewayError> {
        self.call(GatewayCall::Alert(alert.message.clone()))
    }
}
