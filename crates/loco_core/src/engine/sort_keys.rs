//! Stable Sort Key Utilities
//!
//! Every replica must visit collision and avoidance candidates in the same
//! order. Candidate lists coming out of the spatial index are ordered by
//! immutable id, never by hash-map iteration order or float distance.

use super::body::{ObstacleId, UnitId};

/// Stable tie-breaker key for a unit.
#[inline]
pub const fn stable_key_for_unit(id: UnitId) -> u32 {
    id.0
}

/// Stable tie-breaker key for an obstacle.
#[inline]
pub const fn stable_key_for_obstacle(id: ObstacleId) -> u32 {
    id.0
}

/// Sort and deduplicate a candidate id list in place.
pub fn canonical_unit_order(ids: &mut Vec<UnitId>) {
    ids.sort_unstable_by_key(|id| stable_key_for_unit(*id));
    ids.dedup();
}

/// Sort and deduplicate an obstacle id list in place.
pub fn canonical_obstacle_order(ids: &mut Vec<ObstacleId>) {
    ids.sort_unstable_by_key(|id| stable_key_for_obstacle(*id));
    ids.dedup();
}
