//! Detection record log, a concurrent record store over DashMap.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tracing::debug;

use turnstile_core::constants::DEFAULT_DISPATCH_RECORD_LIMIT;
use turnstile_core::errors::{AccessError, AccessResult};
use turnstile_core::models::{DetectionRecord, RecordFilter};
use turnstile_core::traits::{Clock, SystemClock};

/// Detection records keyed by `record_id`, written on submit and read by
/// the administrative API.
///
/// Holds at most `limit` records; inserting past the limit evicts the
/// oldest insertions first.
pub struct DetectionRecordLog {
    records: DashMap<String, DetectionRecord>,
    order: Mutex<VecDeque<String>>,
    limit: usize,
    clock: Arc<dyn Clock>,
}

impl Default for DetectionRecordLog {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionRecordLog {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_DISPATCH_RECORD_LIMIT)
    }

    /// Log retaining at most `limit` records (at least one).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            records: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            limit: limit.max(1),
            clock: Arc::new(SystemClock),
        }
    }

    /// `clock` stamps `handled_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Store a record, evicting the oldest ones beyond the limit.
    pub fn insert(&self, record: DetectionRecord) {
        let mut order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        let id = record.record_id.clone();
        if self.records.insert(id.clone(), record).is_none() {
            order.push_back(id);
        }
        let mut evicted = 0usize;
        while order.len() > self.limit {
            if let Some(oldest) = order.pop_front() {
                self.records.remove(&oldest);
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!(evicted, limit = self.limit, "detection records evicted");
        }
    }

    /// Cloned snapshot of one record.
    pub fn get(&self, record_id: &str) -> Option<DetectionRecord> {
        self.records.get(record_id).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Matching records, newest first, at most `filter.limit` of them.
    pub fn query(&self, filter: &RecordFilter) -> Vec<DetectionRecord> {
        let mut matching: Vec<DetectionRecord> = self
            .records
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        matching.sort_by(|a, b| {
            b.detected_at
                .cmp(&a.detected_at)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        if let Some(limit) = filter.limit {
            matching.truncate(limit);
        }
        matching
    }

    /// Mark one record handled. Handling twice overwrites the remark.
    pub fn handle(&self, record_id: &str, remark: Option<String>) -> AccessResult<DetectionRecord> {
        let mut entry = self
            .records
            .get_mut(record_id)
            .ok_or_else(|| AccessError::RecordNotFound {
                record_id: record_id.to_string(),
            })?;
        entry.mark_handled(remark, self.clock.now());
        debug!(record_id, "detection record handled");
        Ok(entry.clone())
    }

    /// Mark every listed record handled. Unknown ids are skipped; returns
    /// how many were updated.
    pub fn batch_handle(&self, record_ids: &[String], remark: Option<String>) -> usize {
        let now = self.clock.now();
        let updated = record_ids
            .iter()
            .filter(|id| match self.records.get_mut(id.as_str()) {
                Some(mut entry) => {
                    entry.mark_handled(remark.clone(), now);
                    true
                }
                None => false,
            })
            .count();
        debug!(requested = record_ids.len(), updated, "detection records handled");
        updated
    }
}
