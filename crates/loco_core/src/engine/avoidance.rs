//! Obstacle-avoidance steering
//!
//! Every `AVOIDANCE_INTERVAL` ticks the controller gathers the blocking
//! bodies ahead of it and turns them into a sideways offset added to the
//! desired direction. The offset is cached between evaluations.
//!
//! ## Rules
//! - crushable bodies and non-blocking obstacles are driven through
//! - idle allied units are left to the collision resolver to push aside
//! - moving units are evaluated where they will be
//!   `AVOIDANCE_LOOKAHEAD_TICKS` ahead
//! - only bodies in front of the unit and closer than the goal count
//! - the same pass checks the line to the current waypoint for blocked squares

use super::body::UnitBody;
use super::controller::MoveContext;
use super::math::{flat, flat_dist, flat_dir, flat_len, up, Vec3};
use super::physics_constants::avoidance::{
    CLEARANCE, CLOSE_MARGIN, MAX_STEER_ANGLE, SEARCH_BASE_RADIUS, SEARCH_SPEED_SCALE,
};
use super::physics_constants::collision::MIN_SEPARATION;
use super::state::{MovementState, ProgressState};
use super::strategy::MoveStrategy;
use super::terrain_cell::{line_blocked, move_square_of};
use super::timestep::{AVOIDANCE_INTERVAL, AVOIDANCE_LOOKAHEAD_TICKS};

/// Body considered by one avoidance pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvoidanceCandidate {
    pub pos: Vec3,
    pub radius: f32,
    /// Relative-mass weight; 1 for static obstacles
    pub mass_scale: f32,
}

#[derive(Debug, Default)]
struct SideWeights {
    left: f32,
    right: f32,
}

/// Sideways steering offset for `desired` from a set of candidates.
///
/// `desired` must be a flat unit vector. The result is perpendicular to it.
/// Each body asks for the turn that puts the steered line
/// `radius_sum + CLEARANCE` clear of its centre, scaled by `strength` and
/// its mass weight; far bodies need little turn, near ones a lot. The side
/// is picked from the unit's current facing, so once it has started around
/// a body it keeps going the same way even when the waypoint lies behind it.
pub fn lateral_offset(
    body: &UnitBody,
    desired: Vec3,
    speed: f32,
    goal_dist: f32,
    strength: f32,
    candidates: &[AvoidanceCandidate],
) -> Vec3 {
    let right_of_path = desired.cross(&up());
    let right_of_front = flat_dir(body.front()).cross(&up());
    let reach = speed * SEARCH_SPEED_SCALE + CLOSE_MARGIN;
    let mut sides = SideWeights::default();

    for c in candidates {
        let to_obj = flat(c.pos - body.pos);
        let dist = flat_len(to_obj);
        let along = to_obj.dot(&desired);
        let radius_sum = body.radius() + c.radius;
        if along <= 0.0 || dist > goal_dist || dist - radius_sum > reach {
            continue;
        }
        // positive when the body sits right of the path line
        let bearing = to_obj.dot(&right_of_path).atan2(along);
        let half_width = ((radius_sum + CLEARANCE) / dist.max(MIN_SEPARATION)).min(1.0).asin();
        let steer_left = to_obj.dot(&right_of_front) > 0.0;
        let turn = if steer_left {
            half_width - bearing
        } else {
            half_width + bearing
        };
        if turn <= 0.0 {
            continue;
        }
        let weight = turn.min(MAX_STEER_ANGLE).tan() * strength * c.mass_scale;
        if steer_left {
            sides.left += weight;
        } else {
            sides.right += weight;
        }
    }
    right_of_path * (sides.right - sides.left)
}

/// Blocking bodies around `body` worth steering around.
fn gather_candidates(
    state: &MovementState,
    strategy: MoveStrategy,
    body: &UnitBody,
    ctx: &MoveContext<'_>,
) -> Vec<AvoidanceCandidate> {
    let search = state.current_speed * SEARCH_SPEED_SCALE + SEARCH_BASE_RADIUS + body.radius();
    let mass_weighted = match strategy {
        MoveStrategy::Classic => false,
        MoveStrategy::Modern => ctx.config.steering.mass_weighted_avoidance,
    };
    let mut candidates = Vec::new();

    for id in ctx.spatial.units_near(body.pos, search) {
        if id == body.id {
            continue;
        }
        let Some(other) = ctx.units.get(id) else {
            continue;
        };
        let o = &other.body;
        if o.dead || o.in_transport {
            continue;
        }
        let allied = body.allied_with(o.team);
        if !allied && !o.profile.crush_resistant && o.mass() <= body.profile.crush_strength {
            continue;
        }
        if allied && other.mover.progress() != ProgressState::Active {
            continue;
        }
        let mass_scale = if mass_weighted {
            2.0 * o.mass() / (o.mass() + body.mass())
        } else {
            1.0
        };
        candidates.push(AvoidanceCandidate {
            pos: o.pos + o.velocity * AVOIDANCE_LOOKAHEAD_TICKS,
            radius: o.radius(),
            mass_scale,
        });
    }

    for id in ctx.spatial.obstacles_near(body.pos, search) {
        let Some(o) = ctx.obstacles.get(id) else {
            continue;
        };
        if o.dead || !o.blocking || (!o.crush_resistant && o.mass <= body.profile.crush_strength) {
            continue;
        }
        candidates.push(AvoidanceCandidate {
            pos: o.pos,
            radius: o.radius,
            mass_scale: 1.0,
        });
    }
    candidates
}

/// Steering direction toward `desired` after avoidance.
///
/// Re-evaluates the cached offset when due; otherwise reuses it.
pub fn steer(
    state: &mut MovementState,
    strategy: MoveStrategy,
    body: &UnitBody,
    desired: Vec3,
    ctx: &MoveContext<'_>,
) -> Vec3 {
    if desired == Vec3::zeros() {
        return desired;
    }
    if ctx.tick >= state.next_avoidance_update {
        state.next_avoidance_update = ctx.tick + AVOIDANCE_INTERVAL;

        let capability = &body.profile.capability;
        let to = move_square_of(state.waypoint);
        let (spatial, obstacles) = (&*ctx.spatial, &*ctx.obstacles);
        if line_blocked(capability, ctx.terrain, spatial, obstacles, state.move_square, to) {
            state.eta.failures += 1;
        }

        let strength = match strategy {
            MoveStrategy::Classic => MoveStrategy::CLASSIC_AVOIDANCE_STRENGTH,
            MoveStrategy::Modern => ctx.config.steering.avoidance_strength,
        };
        let candidates = gather_candidates(state, strategy, body, ctx);
        state.avoidance_vec = lateral_offset(
            body,
            desired,
            state.current_speed,
            flat_dist(body.pos, state.goal_pos),
            strength,
            &candidates,
        );
    }
    let steered = flat_dir(desired + state.avoidance_vec);
    if steered == Vec3::zeros() {
        desired
    } else {
        steered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::body::UnitId;
    use crate::MoveProfile;

    /// Radius-8 unit at the origin facing `heading`.
    fn unit(heading: i16) -> UnitBody {
        UnitBody::new(UnitId(1), 0, MoveProfile::default(), Vec3::zeros(), heading)
    }

    fn candidate(x: f32, z: f32) -> AvoidanceCandidate {
        AvoidanceCandidate {
            pos: Vec3::new(x, 0.0, z),
            radius: 8.0,
            mass_scale: 1.0,
        }
    }

    #[test]
    fn test_body_ahead_pushes_sideways() {
        let desired = Vec3::new(1.0, 0.0, 0.0);
        let right_of_path = desired.cross(&up());
        // slightly on the right-of-path side
        let c = candidate(40.0, 4.0 * right_of_path.z);
        let offset = lateral_offset(&unit(16384), desired, 2.0, 200.0, 1.5, &[c]);
        assert!(offset.dot(&right_of_path) < 0.0);
        assert!(offset.dot(&desired).abs() < 1e-5);
    }

    #[test]
    fn test_mirrored_bodies_cancel() {
        let desired = Vec3::new(0.0, 0.0, 1.0);
        let a = candidate(5.0, 40.0);
        let b = candidate(-5.0, 40.0);
        let offset = lateral_offset(&unit(0), desired, 2.0, 200.0, 1.5, &[a, b]);
        assert!(flat_len(offset) < 1e-5);
    }

    #[test]
    fn test_ignores_behind_and_beyond_goal() {
        let desired = Vec3::new(1.0, 0.0, 0.0);
        let behind = candidate(-30.0, 0.0);
        let past_goal = candidate(60.0, 0.0);
        let offset = lateral_offset(&unit(16384), desired, 2.0, 50.0, 1.5, &[behind, past_goal]);
        assert_eq!(offset, Vec3::zeros());
    }

    #[test]
    fn test_wide_miss_ignored() {
        let desired = Vec3::new(1.0, 0.0, 0.0);
        let c = candidate(40.0, 30.0);
        let offset = lateral_offset(&unit(16384), desired, 2.0, 200.0, 1.5, &[c]);
        assert_eq!(offset, Vec3::zeros());
    }

    #[test]
    fn test_heavier_body_pushes_harder() {
        let desired = Vec3::new(1.0, 0.0, 0.0);
        let light = AvoidanceCandidate {
            mass_scale: 0.5,
            ..candidate(40.0, 3.0)
        };
        let heavy = AvoidanceCandidate {
            mass_scale: 1.5,
            ..candidate(40.0, 3.0)
        };
        let a = lateral_offset(&unit(16384), desired, 2.0, 200.0, 1.5, &[light]);
        let b = lateral_offset(&unit(16384), desired, 2.0, 200.0, 1.5, &[heavy]);
        assert!(flat_len(b) > flat_len(a));
    }

    #[test]
    fn test_steered_line_clears_body_on_path() {
        let desired = Vec3::new(1.0, 0.0, 0.0);
        let rock = AvoidanceCandidate {
            pos: Vec3::new(60.0, 0.0, 0.0),
            radius: 16.0,
            mass_scale: 1.0,
        };
        let offset = lateral_offset(&unit(16384), desired, 2.0, 200.0, 1.5, &[rock]);
        let steered = flat_dir(desired + offset);
        let miss = (steered.x * rock.pos.z - steered.z * rock.pos.x).abs();
        assert!(miss >= 8.0 + 16.0 + CLEARANCE, "steered line passes {} from centre", miss);
    }

    #[test]
    fn test_keeps_side_it_is_turning_toward() {
        // waypoint pull has swung the path line just left of the body,
        // but the unit is already turned 20 degrees to the right of it
        let desired = Vec3::new(1.0, 0.0, 0.0);
        let right_of_path = desired.cross(&up());
        let c = candidate(40.0, 1.0 * right_of_path.z);
        let offset = lateral_offset(&unit(12743), desired, 2.0, 200.0, 1.5, &[c]);
        assert!(offset.dot(&right_of_path) > 0.0);
    }
}
