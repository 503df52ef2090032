//! Per-unit movement state
//!
//! Everything the controller remembers between ticks. Owned by the unit's
//! [`crate::GroundMover`] and only mutated by it.

use serde::{Deserialize, Serialize};

use super::body::PhysicalState;
use super::external::PathId;
use super::math::Vec3;

/// Progress of the current move order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProgressState {
    #[default]
    Idle,
    Active,
    Failed,
    Done,
}

/// Loss-of-control sub-state; present only while skidding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkidState {
    /// Airborne rather than sliding on the ground
    pub flying: bool,
    /// Yaw spin (heading units/tick)
    pub rot_speed: f32,
    /// Tumble around `rot_vector` (turns/tick) and its accumulated angle
    pub tumble_speed: f32,
    pub tumble_pos: f32,
    /// Horizontal axis orthogonal to the skid direction
    pub rot_vector: Vec3,
    /// Ground contact to restore once the skid ends
    pub old_physical_state: PhysicalState,
}

impl SkidState {
    pub fn new(old_physical_state: PhysicalState) -> Self {
        Self {
            flying: false,
            rot_speed: 0.0,
            tumble_speed: 0.0,
            tumble_pos: 0.0,
            rot_vector: Vec3::new(1.0, 0.0, 0.0),
            old_physical_state,
        }
    }
}

/// Heading the unit keeps pointing at when not following a path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MainHeading {
    pub target: Vec3,
    /// Engagement range; 0 means unlimited
    pub distance: f32,
    pub aggressive: bool,
}

/// Waypoint deadlines and the failure count they feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EtaState {
    /// Missing it adds ETA failures
    pub waypoint_deadline: u64,
    /// Missing it checks whether a nearby goal is clogged
    pub clog_deadline: u64,
    pub failures: u32,
}

impl Default for EtaState {
    fn default() -> Self {
        Self {
            waypoint_deadline: u64::MAX,
            clog_deadline: u64::MAX,
            failures: 0,
        }
    }
}

/// Progress-toward-waypoint tracking for stuck detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct IdleState {
    /// Raised each tick without progress, lowered each tick with progress
    pub ticks: u32,
    pub last_waypoint_distance: f32,
    /// One stuck-repath has been spent on the current order
    pub repathed: bool,
}

/// Controller state of one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementState {
    pub progress: ProgressState,

    // ---- speed control ----
    /// Speed magnitude along the facing (or against it while reversing)
    pub current_speed: f32,
    pub wanted_speed: f32,
    pub delta_speed: f32,
    /// Speed asked for by the order, capped at `max_speed`
    pub requested_speed: f32,
    pub max_speed: f32,
    pub max_reverse_speed: f32,
    pub turn_rate: f32,
    pub acc_rate: f32,
    pub dec_rate: f32,
    pub reversing: bool,

    // ---- loss of control ----
    pub skid: Option<SkidState>,

    // ---- path following ----
    pub path: Option<PathId>,
    pub waypoint: Vec3,
    pub next_waypoint: Vec3,
    pub goal_pos: Vec3,
    pub goal_radius: f32,
    pub at_goal: bool,
    pub have_final_waypoint: bool,
    pub current_waypoint_distance: f32,

    // ---- failure bookkeeping ----
    pub eta: EtaState,
    pub idle: IdleState,
    pub non_moving_failures: u32,
    pub last_path_request_pos: Vec3,
    /// Earliest tick for the next full path request
    pub restart_delay: u64,
    /// Repath requested while `restart_delay` was pending
    pub want_repath: bool,

    // ---- terrain cell ----
    pub move_square: (i32, i32),
    pub terrain_speed: f32,

    // ---- steering ----
    pub main_heading: Option<MainHeading>,
    pub avoidance_vec: Vec3,
    pub next_avoidance_update: u64,
    /// Position at the end of the previous update
    pub old_pos: Vec3,
}

impl MovementState {
    pub fn new(
        pos: Vec3,
        max_speed: f32,
        max_reverse_speed: f32,
        turn_rate: f32,
        acc_rate: f32,
        dec_rate: f32,
    ) -> Self {
        Self {
            progress: ProgressState::Idle,
            current_speed: 0.0,
            wanted_speed: 0.0,
            delta_speed: 0.0,
            requested_speed: max_speed,
            max_speed,
            max_reverse_speed,
            turn_rate,
            acc_rate,
            dec_rate,
            reversing: false,
            skid: None,
            path: None,
            waypoint: pos,
            next_waypoint: pos,
            goal_pos: pos,
            goal_radius: 0.0,
            at_goal: false,
            have_final_waypoint: false,
            current_waypoint_distance: 0.0,
            eta: EtaState::default(),
            idle: IdleState::default(),
            non_moving_failures: 0,
            last_path_request_pos: Vec3::zeros(),
            restart_delay: 0,
            want_repath: false,
            move_square: (0, 0),
            terrain_speed: 1.0,
            main_heading: None,
            avoidance_vec: Vec3::zeros(),
            next_avoidance_update: 0,
            old_pos: pos,
        }
    }

    #[inline]
    pub fn is_skidding(&self) -> bool {
        self.skid.is_some()
    }

    #[inline]
    pub fn is_flying(&self) -> bool {
        self.skid.as_ref().map(|s| s.flying).unwrap_or(false)
    }

    /// Speed cap for the current direction of travel.
    #[inline]
    pub fn direction_cap(&self) -> f32 {
        if self.reversing {
            self.max_reverse_speed
        } else {
            self.max_speed
        }
    }
}
