//! Speed and direction control
//!
//! Pure functions over the controller's speed state: how fast the unit wants
//! to go toward its waypoint, whether backing up gets there sooner, and the
//! acceleration-limited step toward the wanted speed.
//!
//! ## Wanted speed
//! 1. requested speed, capped for the current direction of travel
//! 2. × terrain speed modifier under the unit
//! 3. × alignment factor `clamp(dot(desired, motion) + 0.1, 0, 1)`
//! 4. capped by the turn speed `(dist + 8) / (|turn| / turn_rate) * 0.5`
//! 5. capped by `sqrt(dist * dec_rate)` inside braking distance of the final waypoint

use std::f32::consts::TAU;

use super::math::{heading_delta, heading_from_vector, opposite_heading, Vec3, HEADING_CIRCLE};
use super::physics_constants::path_follow::{MINIMUM_SPEED, MIN_WAYPOINT_DISTANCE};
use super::state::MovementState;

/// Distance needed to stop from `speed`.
#[inline]
pub fn braking_distance(speed: f32, dec_rate: f32) -> f32 {
    if dec_rate <= 0.0 {
        return 0.0;
    }
    (speed * speed) / (2.0 * dec_rate)
}

/// Radius of the circle driven at `speed` while turning at `turn_rate`.
#[inline]
pub fn turn_radius(speed: f32, turn_rate: f32) -> f32 {
    if turn_rate <= 0.0 {
        return 0.0;
    }
    speed * (HEADING_CIRCLE / turn_rate) / TAU
}

/// Absolute heading difference as a positive integer.
#[inline]
fn turn_amount(from: i16, to: i16) -> f32 {
    (heading_delta(from, to) as i32).abs() as f32
}

/// ETA comparison between driving forwards and backing up to a waypoint.
///
/// Each side sums: travel time at full speed, turn time, time to stop when
/// the direction has to change, and time to accelerate back to full speed.
pub fn reverse_is_faster(
    state: &MovementState,
    heading: i16,
    waypoint_dir: Vec3,
    waypoint_dist: f32,
) -> bool {
    if state.max_reverse_speed <= 0.0 || waypoint_dir == Vec3::zeros() {
        return false;
    }
    let turn_rate = state.turn_rate.max(1.0);
    let fwd_heading = heading_from_vector(waypoint_dir.x, waypoint_dir.z);
    let rev_heading = opposite_heading(fwd_heading);

    let fwd_turn_time = turn_amount(heading, fwd_heading) / turn_rate;
    let rev_turn_time = turn_amount(heading, rev_heading) / turn_rate;

    // turning bleeds off speed
    let cur = state.current_speed;
    let fwd_left = (cur - 0.125 * fwd_turn_time * state.dec_rate).max(0.0);
    let rev_left = (cur - 0.125 * rev_turn_time * state.dec_rate).max(0.0);

    let (fwd_stop_time, rev_stop_time) = if state.reversing {
        (cur / state.dec_rate, 0.0)
    } else {
        (0.0, cur / state.dec_rate)
    };
    let (fwd_start, rev_start) = if state.reversing {
        (0.0, rev_left)
    } else {
        (fwd_left, 0.0)
    };
    let fwd_acc_time = (state.max_speed - fwd_start).max(0.0) / state.acc_rate;
    let rev_acc_time = (state.max_reverse_speed - rev_start).max(0.0) / state.acc_rate;

    let fwd_eta = waypoint_dist / state.max_speed.max(MINIMUM_SPEED)
        + fwd_turn_time
        + fwd_acc_time
        + fwd_stop_time;
    let rev_eta =
        waypoint_dist / state.max_reverse_speed + rev_turn_time + rev_acc_time + rev_stop_time;
    rev_eta < fwd_eta
}

/// Inputs for [`wanted_speed`] sampled by the controller this tick.
#[derive(Debug, Clone, Copy)]
pub struct SpeedInputs {
    /// Terrain speed modifier under the unit
    pub ground_mod: f32,
    /// dot(steering direction, direction of travel)
    pub alignment: f32,
    /// Heading units still to turn
    pub turn_delta: i32,
    pub waypoint_dist: f32,
    pub have_final_waypoint: bool,
}

pub fn wanted_speed(state: &MovementState, inputs: SpeedInputs) -> f32 {
    let mut speed =
        state.requested_speed.min(state.direction_cap()) * inputs.ground_mod.clamp(0.0, 1.0);
    speed *= (inputs.alignment + 0.1).clamp(0.0, 1.0);

    if inputs.turn_delta != 0 {
        let turn_ticks = inputs.turn_delta.abs() as f32 / state.turn_rate.max(1.0);
        let turn_speed = (inputs.waypoint_dist + MIN_WAYPOINT_DISTANCE) / turn_ticks * 0.5;
        speed = speed.min(turn_speed);
    }

    if inputs.have_final_waypoint
        && inputs.waypoint_dist < braking_distance(state.current_speed, state.dec_rate)
    {
        speed = speed.min((inputs.waypoint_dist * state.dec_rate).sqrt());
    }
    speed.max(0.0)
}

/// One acceleration-limited step from `current` toward `wanted`, capped at `cap`.
/// Returns the new speed and the applied delta.
pub fn step_speed(current: f32, wanted: f32, acc_rate: f32, dec_rate: f32, cap: f32) -> (f32, f32) {
    let delta = (wanted - current).clamp(-dec_rate, acc_rate);
    let mut next = (current + delta).clamp(0.0, cap.max(0.0));
    if next < MINIMUM_SPEED && wanted < MINIMUM_SPEED {
        next = 0.0;
    }
    (next, next - current)
}
