//! Scope: the unit of state isolation for a rule.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AreaId, UserId};
use crate::keys;

/// What a rule's state is keyed on. Immutable once a rule is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    /// User-wide, across every area.
    Global { user_id: UserId },
    /// One user within one area.
    Area { user_id: UserId, area_id: AreaId },
    /// Two adjoining areas joined by an interlock.
    AreaPair { area_a: AreaId, area_b: AreaId },
}

impl Scope {
    /// The cache key owning this scope's state.
    pub fn cache_key(&self) -> String {
        match *self {
            Self::Global { user_id } => keys::anti_passback_user(user_id),
            Self::Area { user_id, area_id } => keys::anti_passback_user_area(user_id, area_id),
            Self::AreaPair { area_a, area_b } => keys::interlock_pair(area_a, area_b),
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global { .. })
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}
