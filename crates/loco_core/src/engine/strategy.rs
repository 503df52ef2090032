//! Move strategy selection
//!
//! One controller serves every ground unit; the strategy picked at spawn time
//! only switches the behaviours where the legacy mover must stay
//! replay-compatible.

use serde::{Deserialize, Serialize};

/// Move-type variant, fixed for the lifetime of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveStrategy {
    /// Zeroes velocity in front of impassable cells, may reverse, weights
    /// avoidance and collision shares by mass and speed.
    Modern,
    /// Legacy mover: may tunnel through an impassable cell (the move is
    /// flagged as rejected), never reverses, splits collisions by mass only.
    Classic,
}

impl Default for MoveStrategy {
    fn default() -> Self {
        if cfg!(feature = "classic_default") {
            MoveStrategy::Classic
        } else {
            MoveStrategy::Modern
        }
    }
}

impl MoveStrategy {
    /// Position updates into an impassable cell still commit.
    #[inline]
    pub fn allows_tunneling(self) -> bool {
        matches!(self, MoveStrategy::Classic)
    }

    #[inline]
    pub fn supports_reverse(self) -> bool {
        matches!(self, MoveStrategy::Modern)
    }

    /// Collision displacement split uses speed and facing, not only mass.
    #[inline]
    pub fn drive_weighted_collisions(self) -> bool {
        matches!(self, MoveStrategy::Modern)
    }

    /// Avoidance strength used by the legacy mover regardless of tuning.
    pub const CLASSIC_AVOIDANCE_STRENGTH: f32 = 2.0;
}
