//! Physical constants for ground locomotion
//!
//! Distances are elmos, speeds elmos/tick, accelerations elmos/tick².
//! Tuning knobs that differ between move strategies live in
//! [`crate::engine::config`] instead.

// ============================================================
// Map grid
// ============================================================
pub mod grid {
    /// Heightmap square edge (elmos)
    pub const SQUARE_SIZE: f32 = 8.0;

    /// Move square edge: the terrain cell tracked by the controller
    pub const MOVE_SQUARE_SIZE: f32 = SQUARE_SIZE * 2.0;

    /// Spacing of waypoints handed out by the path oracle
    pub const PATH_RESOLUTION: f32 = MOVE_SQUARE_SIZE;

    /// Terrain speed modifier at or below which a cell is impassable
    pub const MIN_PASSABLE_SPEED_MOD: f32 = 0.01;
}

// ============================================================
// Path following
// ============================================================
pub mod path_follow {
    /// Distance at which a waypoint counts as reached
    pub const MIN_WAYPOINT_DISTANCE: f32 = 8.0;

    /// Steering alignment (cosine) considered "facing the waypoint"
    pub const WAYPOINT_ALIGNMENT: f32 = 0.995;

    /// Speeds below this are rounded to a standstill
    pub const MINIMUM_SPEED: f32 = 0.01;

    /// Lookahead handed to the oracle when pulling the next waypoint
    pub const WAYPOINT_LOOKAHEAD: f32 = 2.0;

    /// Waypoint ETA: `ETA_BASE_DISTANCE / speed + ETA_SLACK_TICKS`
    pub const ETA_BASE_DISTANCE: f32 = 30.0;
    pub const ETA_SLACK_TICKS: u64 = 50;

    /// Second (goal-clog) ETA: `ETA2_BASE_DISTANCE / speed + ETA2_SLACK_TICKS`
    pub const ETA2_BASE_DISTANCE: f32 = 25.0;
    pub const ETA2_SLACK_TICKS: u64 = 10;

    /// Ticks added to the goal-clog ETA when the goal is still feasible
    pub const ETA2_EXTENSION_TICKS: u64 = 100;

    /// ETA failures added when a waypoint deadline passes
    pub const ETA_MISS_PENALTY: u32 = 10;

    /// Squared move-square distance for the waypoint skip-ahead lookahead
    pub const LOOKAHEAD_SQUARES_SQ: i32 = 11;

    /// Waypoints skipped at most per new move square
    pub const LOOKAHEAD_MAX_SKIPS: u32 = 6;

    /// Minimum progress per tick (fraction of max speed) not counted as idling
    pub const IDLE_PROGRESS_FRACTION: f32 = 0.05;
}

// ============================================================
// Skid / flight
// ============================================================
pub mod skid {
    /// Gravity (elmos/tick²), negative is down
    pub const GRAVITY: f32 = -0.144;

    /// Random yaw spin range on skid start/landing (heading units/tick)
    pub const SPIN_RANGE: f32 = 1500.0;

    /// Random tumble range when launched airborne (turns/tick)
    pub const TUMBLE_RANGE: f32 = 0.04;

    /// Speed retained per tick when bouncing off the ground
    pub const GROUND_BOUNCE_RETAIN: f32 = 0.95;

    /// Normal push-back and damping applied when sinking into the ground
    pub const GROUND_PUSH_BACK: f32 = 1.9;
    pub const GROUND_SINK_DAMPING: f32 = 0.8;

    /// Downhill slide damping scale (times normal.y)
    pub const SLOPE_SLIDE_DAMPING: f32 = 0.1;
}

// ============================================================
// Collision
// ============================================================
pub mod collision {
    /// Separation below which two bodies are considered coincident
    pub const MIN_SEPARATION: f32 = 0.001;

    /// Bodies closer than `radius_sum + CONTACT_SLOP` at the start of a tick
    /// were already touching; pressing on does not count as a new impact
    pub const CONTACT_SLOP: f32 = 0.5;
}

// ============================================================
// Obstacle avoidance
// ============================================================
pub mod avoidance {
    /// Search radius: `speed * SPEED_SCALE + BASE_RADIUS + radius`
    pub const SEARCH_SPEED_SCALE: f32 = 35.0;
    pub const SEARCH_BASE_RADIUS: f32 = 30.0;

    /// Extra margin on the per-object closeness test
    pub const CLOSE_MARGIN: f32 = 10.0;

    /// Gap kept between the steered line and a body's combined radius
    pub const CLEARANCE: f32 = 8.0;

    /// Largest turn away from the desired direction one body can ask for (radians)
    pub const MAX_STEER_ANGLE: f32 = 1.4;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_consistency() {
        assert_eq!(grid::MOVE_SQUARE_SIZE, 16.0);
        assert_eq!(grid::PATH_RESOLUTION, grid::MOVE_SQUARE_SIZE);
        assert!(path_follow::MIN_WAYPOINT_DISTANCE <= grid::PATH_RESOLUTION);
    }

    #[test]
    fn test_gravity_points_down() {
        assert!(skid::GRAVITY < 0.0);
    }
}
