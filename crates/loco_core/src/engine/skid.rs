//! Skid, flight and controlled-drop physics
//!
//! A unit hit by a large enough impulse loses steering: its velocity is set
//! from the impulse and it spins freely until friction brings it to rest.
//!
//! ## Sub-states
//! - **Grounded skid**: speed drops by `speed_reduction` per tick; on a slope
//!   steeper than the unit can climb it slides downhill instead
//! - **Flying**: gravity integrates each tick; landing applies impact damage
//!
//! The skid ends once the unit is grounded, slower than `speed_reduction`
//! and not on an excessive slope. Contact with other bodies while skidding
//! uses its own momentum exchange instead of the post-move resolver.
//!
//! A controlled drop (`falling`) is a separate, gentler fall used for units
//! released from the air: capped gravity, no bounce, no damage.

use std::f32::consts::TAU;

use log::debug;
use nalgebra::Rotation3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::body::{PhysicalState, UnitBody};
use super::collision::{hurt_obstacle, hurt_unit, impact_hurts};
use super::config::SkidConfig;
use super::controller::MoveContext;
use super::debug_flags::controller_debug_enabled;
use super::events::{MoveEvent, MoveEventKind};
use super::external::TerrainSampler;
use super::math::{flat, flat_dir, flat_len, max_heading_step, up, Vec3};
use super::physics_constants::collision::MIN_SEPARATION;
use super::physics_constants::skid::{
    GRAVITY, GROUND_BOUNCE_RETAIN, GROUND_PUSH_BACK, GROUND_SINK_DAMPING, SLOPE_SLIDE_DAMPING,
    SPIN_RANGE,
    TUMBLE_RANGE,
};
use super::state::{MovementState, ProgressState, SkidState};

/// Units that cannot be knocked around right now.
#[inline]
fn immune(body: &UnitBody) -> bool {
    body.being_built || body.dead || body.in_transport || body.falling
}

/// Random yaw spin in `[-SPIN_RANGE/2, SPIN_RANGE/2)`.
#[inline]
fn draw_spin(rng: &mut ChaCha8Rng) -> f32 {
    (rng.gen::<f32>() - 0.5) * SPIN_RANGE
}

/// Up vector for a unit at rest.
#[inline]
fn rest_up(body: &UnitBody, terrain: &dyn TerrainSampler) -> Vec3 {
    if body.profile.upright {
        up()
    } else {
        terrain.normal(body.pos.x, body.pos.z)
    }
}

fn begin_skid(
    state: &mut MovementState,
    body: &mut UnitBody,
    flying: bool,
    rng: &mut ChaCha8Rng,
    tick: u64,
    events: &mut Vec<MoveEvent>,
) {
    let mut skid = SkidState::new(body.physical_state);
    skid.flying = flying;
    let mut dir = flat_dir(body.velocity);
    if dir == Vec3::zeros() {
        dir = body.front();
    }
    skid.rot_vector = dir.cross(&up());
    skid.rot_speed = draw_spin(rng);
    if flying {
        skid.tumble_speed = (rng.gen::<f32>() - 0.5) * TUMBLE_RANGE;
    }

    body.physical_state = PhysicalState::Flying;
    state.current_speed = 0.0;
    state.wanted_speed = 0.0;
    state.delta_speed = 0.0;
    state.reversing = false;
    state.skid = Some(skid);

    if controller_debug_enabled() {
        debug!("{}: skid start vel={:?} flying={}", body.id, body.velocity, flying);
    }
    events.push(MoveEvent::new(tick, body.id, MoveEventKind::SkidStarted { flying }));
}

/// Feed an external impulse; returns whether the unit is skidding afterwards.
///
/// Impulses accumulate in `residual_impulse`. Once the accumulated impulse,
/// minus any part driving into the ground, is larger than
/// `impulse_threshold` or lifts off the ground harder than
/// `normal_threshold`, it becomes the unit's velocity and the skid begins.
pub fn on_impulse(
    state: &mut MovementState,
    body: &mut UnitBody,
    impulse: Vec3,
    cfg: &SkidConfig,
    terrain: &dyn TerrainSampler,
    rng: &mut ChaCha8Rng,
    tick: u64,
    events: &mut Vec<MoveEvent>,
) -> bool {
    if immune(body) {
        return false;
    }
    body.residual_impulse += impulse;
    if state.is_skidding() {
        body.velocity += body.residual_impulse;
        body.residual_impulse = Vec3::zeros();
        return true;
    }

    let normal = terrain.normal(body.pos.x, body.pos.z);
    let residual = body.residual_impulse;
    let effective = residual - normal * residual.dot(&normal).min(0.0);
    if effective.norm() <= cfg.impulse_threshold && effective.dot(&normal) <= cfg.normal_threshold {
        return false;
    }

    body.velocity += effective;
    body.residual_impulse = Vec3::zeros();
    let flying = body.velocity.dot(&normal) > cfg.flying_threshold;
    begin_skid(state, body, flying, rng, tick, events);
    true
}

/// Force a skid from a body-to-body hit, whatever its strength.
pub(crate) fn knock(
    state: &mut MovementState,
    body: &mut UnitBody,
    impulse: Vec3,
    rng: &mut ChaCha8Rng,
    tick: u64,
    events: &mut Vec<MoveEvent>,
) {
    if immune(body) {
        return;
    }
    body.velocity += impulse;
    if !state.is_skidding() {
        begin_skid(state, body, false, rng, tick, events);
    }
}

/// Start sliding down a slope too steep to stand on.
pub(crate) fn start_slope_slide(
    state: &mut MovementState,
    body: &mut UnitBody,
    rng: &mut ChaCha8Rng,
    tick: u64,
    events: &mut Vec<MoveEvent>,
) {
    let signed = if state.reversing {
        -state.current_speed
    } else {
        state.current_speed
    };
    body.velocity = body.front() * signed;
    begin_skid(state, body, false, rng, tick, events);
}

fn end_skid(
    state: &mut MovementState,
    body: &mut UnitBody,
    skid: SkidState,
    ctx: &mut MoveContext<'_>,
) {
    body.velocity = Vec3::zeros();
    body.physical_state = skid.old_physical_state;
    body.up = rest_up(body, ctx.terrain);
    state.current_speed = 0.0;
    state.skid = None;
    // pose changed under the path; plan again from here
    if state.progress == ProgressState::Active {
        state.want_repath = true;
    }
    if controller_debug_enabled() {
        debug!("{}: skid end at {:?}", body.id, body.pos);
    }
    ctx.emit(body.id, MoveEventKind::SkidEnded);
}

/// Yaw spin and airborne tumble.
fn calc_skid_rot(skid: &mut SkidState, body: &mut UnitBody, terrain: &dyn TerrainSampler) {
    let max_step = max_heading_step(body.profile.turn_rate);
    let step = (skid.rot_speed.round() as i32).clamp(-max_step, max_step);
    body.heading = body.heading.wrapping_add(step as i16);

    skid.tumble_pos += skid.tumble_speed;
    let base = rest_up(body, terrain);
    body.up = if skid.tumble_pos != 0.0 && skid.rot_vector.norm() > MIN_SEPARATION {
        let axis = nalgebra::Unit::new_normalize(skid.rot_vector);
        Rotation3::from_axis_angle(&axis, skid.tumble_pos * TAU) * base
    } else {
        base
    };
}

/// Simplified contact response while skidding: momentum exchange with
/// movable units, a rebound off immovable ones and off static blockers.
fn check_collision_skid(body: &mut UnitBody, ctx: &mut MoveContext<'_>) {
    let config = ctx.config;
    let cfg = &config.skid;
    let tick = ctx.tick;
    let me = body.id;

    for id in ctx.spatial.units_near(body.pos, body.radius()) {
        if id == me || body.dead {
            continue;
        }
        let Some(other) = ctx.units.get_mut(id) else {
            continue;
        };
        if other.body.dead || other.body.in_transport {
            continue;
        }
        let sep = flat(body.pos - other.body.pos);
        let dist = flat_len(sep);
        if dist >= body.radius() + other.body.radius() || dist < MIN_SEPARATION {
            continue;
        }
        let dif = sep / dist;

        if other.body.profile.push_resistant {
            let impact = -body.velocity.dot(&dif);
            if impact <= 0.0 {
                continue;
            }
            body.pos += dif * impact;
            body.velocity += dif * (impact * cfg.collision_bounce);
            let amount = impact * body.mass() * cfg.impact_damage_factor;
            if impact_hurts(body.profile.min_collision_speed, impact) {
                hurt_unit(body, amount, tick, me, ctx.events);
            }
            if impact_hurts(other.body.profile.min_collision_speed, impact) {
                hurt_unit(&mut other.body, amount, tick, me, ctx.events);
            }
            continue;
        }

        let impact = (other.body.velocity - body.velocity).dot(&dif);
        if impact <= 0.0 {
            continue;
        }
        let part = body.mass() / (body.mass() + other.body.mass());
        let mine = dif * (impact * (1.0 - part) * 2.0);
        let theirs = dif * (impact * part * 2.0);

        body.pos += mine;
        body.velocity += mine;
        other.body.pos -= theirs;
        ctx.spatial.unit_moved(id, other.body.pos, other.body.radius());
        other.mover.knock(&mut other.body, -theirs, ctx.rng, tick, ctx.events);

        if impact_hurts(body.profile.min_collision_speed, impact) {
            let amount = impact * body.mass() * cfg.impact_damage_factor * (1.0 - part);
            hurt_unit(body, amount, tick, me, ctx.events);
        }
        if impact_hurts(other.body.profile.min_collision_speed, impact) {
            let amount = impact * body.mass() * cfg.impact_damage_factor * part;
            hurt_unit(&mut other.body, amount, tick, me, ctx.events);
        }
        body.velocity *= cfg.collision_speed_retain;
    }

    for id in ctx.spatial.obstacles_near(body.pos, body.radius()) {
        let Some(obstacle) = ctx.obstacles.get_mut(id) else {
            continue;
        };
        if obstacle.dead || !obstacle.blocking {
            continue;
        }
        let sep = flat(body.pos - obstacle.pos);
        let dist = flat_len(sep);
        if dist >= body.radius() + obstacle.radius || dist < MIN_SEPARATION {
            continue;
        }
        let dif = sep / dist;
        let impact = -body.velocity.dot(&dif);
        if impact <= 0.0 {
            continue;
        }
        body.pos += dif * impact;
        body.velocity += dif * (impact * cfg.collision_bounce);
        let amount = impact * body.mass() * cfg.impact_damage_factor;
        if impact_hurts(body.profile.min_collision_speed, impact) {
            hurt_unit(body, amount, tick, me, ctx.events);
        }
        if impact_hurts(obstacle.min_collision_speed, impact) {
            hurt_obstacle(obstacle, amount, tick, me, ctx.events);
        }
    }
}

/// One tick of skid motion. Owns `body.velocity` while the skid lasts.
pub fn update_skid(state: &mut MovementState, body: &mut UnitBody, ctx: &mut MoveContext<'_>) {
    let Some(mut skid) = state.skid.take() else {
        return;
    };
    let config = ctx.config;
    let cfg = &config.skid;
    let me = body.id;

    if skid.flying {
        body.velocity.y += GRAVITY;
    } else {
        let speed = body.velocity.norm();
        let on_slope =
            ctx.terrain.slope(body.pos.x, body.pos.z) > body.profile.capability.max_slope;
        if speed < cfg.speed_reduction && !on_slope {
            end_skid(state, body, skid, ctx);
            return;
        }
        let normal = ctx.terrain.normal(body.pos.x, body.pos.z);
        if on_slope {
            let gravity = Vec3::new(0.0, GRAVITY, 0.0);
            body.velocity += gravity - normal * normal.dot(&gravity);
            body.velocity *= 1.0 - SLOPE_SLIDE_DAMPING * normal.y;
        } else {
            let keep = 1.0 - (cfg.speed_reduction / speed).min(1.0);
            body.velocity *= keep;
            skid.rot_speed *= keep;
        }

        let gap = ctx.terrain.height(body.pos.x, body.pos.z) - body.pos.y;
        if gap < body.velocity.y + GRAVITY {
            body.velocity.y += GRAVITY;
            skid.flying = true;
        } else if gap > body.velocity.y {
            let dot = body.velocity.dot(&normal);
            if dot > 0.0 {
                body.velocity *= GROUND_BOUNCE_RETAIN;
            } else {
                body.velocity += normal * ((dot.abs() + 0.1) * GROUND_PUSH_BACK);
                body.velocity *= GROUND_SINK_DAMPING;
            }
        }
    }

    calc_skid_rot(&mut skid, body, ctx.terrain);
    body.pos += body.velocity;

    let ground = ctx.terrain.height(body.pos.x, body.pos.z);
    if skid.flying {
        if body.pos.y <= ground {
            body.pos.y = ground;
            let normal = ctx.terrain.normal(body.pos.x, body.pos.z);
            let impact = -body.velocity.dot(&normal);
            if impact_hurts(body.profile.min_collision_speed, impact) {
                let amount = impact * body.mass() * cfg.impact_damage_factor;
                hurt_unit(body, amount, ctx.tick, me, ctx.events);
            }
            if impact > 0.0 {
                body.velocity += normal * impact;
            }
            skid.flying = false;
            skid.tumble_speed = 0.0;
            skid.tumble_pos = skid.tumble_pos.round();
            skid.rot_speed += draw_spin(ctx.rng);
            ctx.emit(me, MoveEventKind::Landed);
        }
    } else if body.pos.y < ground {
        body.pos.y = ground;
    }

    state.skid = Some(skid);
    check_collision_skid(body, ctx);
}

/// One tick of a controlled drop.
pub fn update_controlled_drop(body: &mut UnitBody, ctx: &mut MoveContext<'_>) {
    body.velocity.y = (body.velocity.y + GRAVITY * body.fall_speed).min(0.0);
    body.pos += body.velocity;
    let ground = ctx.terrain.height(body.pos.x, body.pos.z);
    if body.pos.y <= ground {
        body.pos.y = ground;
        body.falling = false;
        body.velocity = Vec3::zeros();
        body.physical_state = PhysicalState::OnGround;
        ctx.emit(body.id, MoveEventKind::Landed);
    }
}
