//! State cache key scheme.
//!
//! Every key the engine reads or writes is built here so the layout stays
//! greppable and stable across releases.

use crate::models::{AreaId, RuleId, UserId};

/// Prefix shared by all anti-passback keys.
pub const ANTI_PASSBACK_PREFIX: &str = "anti_passback:";

pub fn anti_passback_user(user_id: UserId) -> String {
    format!("anti_passback:user:{user_id}")
}

pub fn anti_passback_user_area(user_id: UserId, area_id: AreaId) -> String {
    format!("anti_passback:user:{user_id}:area:{area_id}")
}

/// Prefix matching every per-area key of one user. The global key
/// (`anti_passback_user`) is not covered and must be deleted separately.
pub fn anti_passback_user_area_prefix(user_id: UserId) -> String {
    format!("anti_passback:user:{user_id}:")
}

pub fn capacity_count(area_id: AreaId) -> String {
    format!("area:{area_id}:count")
}

pub fn capacity_blocked(area_id: AreaId) -> String {
    format!("area:{area_id}:blocked")
}

/// Prefix covering every capacity key of one area.
pub fn capacity_area_prefix(area_id: AreaId) -> String {
    format!("area:{area_id}:")
}

pub fn interlock_locked_area(rule_id: RuleId) -> String {
    format!("interlock:rule:{rule_id}:locked_area")
}

pub fn interlock_triggers(rule_id: RuleId) -> String {
    format!("interlock:rule:{rule_id}:triggers")
}

/// Order-independent key for a pair of interlocked areas.
pub fn interlock_pair(area_a: AreaId, area_b: AreaId) -> String {
    let (lo, hi) = if area_a <= area_b { (area_a, area_b) } else { (area_b, area_a) };
    format!("interlock:pair:{lo}:{hi}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anti_passback_keys() {
        assert_eq!(anti_passback_user(1001), "anti_passback:user:1001");
        assert_eq!(anti_passback_user_area(1001, 101), "anti_passback:user:1001:area:101");
        assert!(anti_passback_user_area(1001, 101)
            .starts_with(&anti_passback_user_area_prefix(1001)));
        assert!(!anti_passback_user_area(10011, 101)
            .starts_with(&anti_passback_user_area_prefix(1001)));
        assert!(anti_passback_user(1001).starts_with(ANTI_PASSBACK_PREFIX));
    }

    #[test]
    fn capacity_keys_share_area_prefix() {
        assert_eq!(capacity_count(7), "area:7:count");
        assert!(capacity_blocked(7).starts_with(&capacity_area_prefix(7)));
    }

    #[test]
    fn pair_key_is_symmetric() {
        assert_eq!(interlock_pair(2, 1), interlock_pair(1, 2));
    }
}
