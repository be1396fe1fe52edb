//! Capacity evaluator configuration.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CAS_RETRIES;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CapacitySettings {
    /// Hard ceiling for WARNING areas as a multiple of `max_capacity`
    /// (e.g. `1.5`). Unset means WARNING areas are unbounded.
    pub warning_ceiling_ratio: Option<f64>,
    pub cas_retries: Option<u32>,
}

impl CapacitySettings {
    pub fn effective_cas_retries(&self) -> u32 {
        self.cas_retries.unwrap_or(DEFAULT_CAS_RETRIES)
    }

    /// Absolute WARNING ceiling for an area capped at `max_capacity`.
    pub fn warning_ceiling(&self, max_capacity: u32) -> Option<i64> {
        self.warning_ceiling_ratio
            .map(|ratio| (f64::from(max_capacity) * ratio).floor() as i64)
    }
}
