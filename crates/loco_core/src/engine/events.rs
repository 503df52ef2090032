//! Notifications raised by the locomotion core to the owning layer

use serde::{Deserialize, Serialize};

use super::body::{ObstacleId, UnitId};

/// Why a move order was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// The oracle returned no path
    PathNotFound,
    /// Waypoint distance stopped shrinking, and a repath did not help
    Stuck,
    /// Too much of the area around a nearby goal is blocked
    GoalClogged,
    /// Repeated path requests from the same spot
    NonMoving,
    /// The oracle stopped handing out waypoints for a held path
    PathLost,
}

/// Something hit by a collision or impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Unit(UnitId),
    Obstacle(ObstacleId),
}

/// What killed a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KillCause {
    Crushed,
    Impact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MoveEventKind {
    StartedMoving,
    StoppedMoving,
    Arrived,
    MoveFailed { reason: FailureReason },
    Repathed,
    /// The tick's displacement was refused (static blocker or impassable cell)
    RejectedMove,
    SkidStarted { flying: bool },
    SkidEnded,
    Landed,
    Damaged { target: Target, amount: f32 },
    Killed { target: Target, cause: KillCause },
}

impl MoveEventKind {
    /// Stable snake_case name, used as a key in scenario reports.
    pub fn name(&self) -> &'static str {
        match self {
            MoveEventKind::StartedMoving => "started_moving",
            MoveEventKind::StoppedMoving => "stopped_moving",
            MoveEventKind::Arrived => "arrived",
            MoveEventKind::MoveFailed { .. } => "move_failed",
            MoveEventKind::Repathed => "repathed",
            MoveEventKind::RejectedMove => "rejected_move",
            MoveEventKind::SkidStarted { .. } => "skid_started",
            MoveEventKind::SkidEnded => "skid_ended",
            MoveEventKind::Landed => "landed",
            MoveEventKind::Damaged { .. } => "damaged",
            MoveEventKind::Killed { .. } => "killed",
        }
    }
}

/// Event tagged with the tick and the unit whose mover raised it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveEvent {
    pub tick: u64,
    pub unit: UnitId,
    pub kind: MoveEventKind,
}

impl MoveEvent {
    pub fn new(tick: u64, unit: UnitId, kind: MoveEventKind) -> Self {
        Self { tick, unit, kind }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.kind, MoveEventKind::MoveFailed { .. })
    }
}
