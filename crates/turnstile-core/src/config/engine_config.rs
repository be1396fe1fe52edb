//! Decision orchestrator configuration.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_LATENCY_BUDGET_MS;
use crate::models::PolicyKind;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Default: 100.
    pub latency_budget_ms: Option<u64>,
    /// Policy names to run. Default: all of them.
    pub enabled_policies: Option<Vec<String>>,
}

impl EngineConfig {
    pub fn effective_latency_budget_ms(&self) -> u64 {
        self.latency_budget_ms.unwrap_or(DEFAULT_LATENCY_BUDGET_MS)
    }

    /// Unknown names are skipped here; `TurnstileConfig::validate` rejects them.
    pub fn effective_enabled_policies(&self) -> Vec<PolicyKind> {
        match &self.enabled_policies {
            Some(names) => names.iter().filter_map(|n| PolicyKind::parse(n)).collect(),
            None => PolicyKind::all().to_vec(),
        }
    }

    pub fn is_enabled(&self, policy: PolicyKind) -> bool {
        self.effective_enabled_policies().contains(&policy)
    }
}
