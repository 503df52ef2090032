//! Post-move collision resolution
//!
//! Runs after a unit's position update commits. Overlaps with other units
//! are split between the two bodies; overlaps with static obstacles are
//! absorbed by the mover, or refuse the tick's move outright when the mover
//! drove into the obstacle.
//!
//! ## Split weights
//! - Modern: each side pushes with `mass * (1 + speed * alignment)`, where
//!   alignment is how squarely it is moving into the other body
//! - Classic: mover weight `m`, neighbour weight `2 * m_other`
//!
//! The two shares always add up to the penetration depth.
//!
//! ## Ordering
//! Candidates come from the spatial index in ascending id order, units
//! first and then static obstacles. Pushed neighbours are re-registered in
//! the index before the next candidate is looked at.

use log::trace;

use super::body::{Obstacle, UnitBody, UnitId};
use super::controller::MoveContext;
use super::debug_flags::collision_debug_enabled;
use super::events::{KillCause, MoveEvent, MoveEventKind, Target};
use super::external::SpatialIndex;
use super::math::{flat, flat_dir, flat_len, Vec3};
use super::physics_constants::collision::{CONTACT_SLOP, MIN_SEPARATION};
use super::physics_constants::grid::MIN_PASSABLE_SPEED_MOD;
use super::state::MovementState;
use super::strategy::MoveStrategy;
use super::world::UnitStore;

/// What the resolver did to the mover this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollisionOutcome {
    /// The tick's displacement was reverted
    pub rejected: bool,
    /// A blocker inside the forward cone asks for a new path
    pub repath: bool,
    /// Bodies the mover was separated from
    pub contacts: u32,
}

/// Split `penetration` between mover and neighbour.
///
/// The heavier-pushing side displaces the other more: the neighbour gets
/// `penetration * mover_weight / (mover_weight + other_weight)`. Returns
/// `(mover_share, other_share)`.
pub fn split_overlap(penetration: f32, mover_weight: f32, other_weight: f32) -> (f32, f32) {
    let total = mover_weight + other_weight;
    if !(total > 0.0) {
        let half = penetration * 0.5;
        return (penetration - half, half);
    }
    let other_share = penetration * (mover_weight / total);
    (penetration - other_share, other_share)
}

/// Push weight of a body moving at `speed` with `alignment` toward the other.
#[inline]
pub fn drive_weight(mass: f32, speed: f32, alignment: f32) -> f32 {
    mass * (1.0 + speed * alignment.max(0.0))
}

/// Separation normal pointing from `other` to `me`.
fn separation_normal(me: Vec3, other: Vec3, motion: Vec3, front: Vec3) -> (Vec3, f32) {
    let sep = flat(me - other);
    let dist = flat_len(sep);
    if dist > MIN_SEPARATION {
        return (sep / dist, dist);
    }
    // coincident: back off against the direction of travel
    let back = -flat_dir(motion);
    if back != Vec3::zeros() {
        (back, dist)
    } else {
        (-front, dist)
    }
}

pub(crate) fn hurt_unit(
    target: &mut UnitBody,
    amount: f32,
    tick: u64,
    source: UnitId,
    events: &mut Vec<MoveEvent>,
) {
    if amount <= 0.0 || target.dead {
        return;
    }
    events.push(MoveEvent::new(
        tick,
        source,
        MoveEventKind::Damaged {
            target: Target::Unit(target.id),
            amount,
        },
    ));
    if target.apply_damage(amount) {
        events.push(MoveEvent::new(
            tick,
            source,
            MoveEventKind::Killed {
                target: Target::Unit(target.id),
                cause: KillCause::Impact,
            },
        ));
    }
}

pub(crate) fn hurt_obstacle(
    target: &mut Obstacle,
    amount: f32,
    tick: u64,
    source: UnitId,
    events: &mut Vec<MoveEvent>,
) {
    if amount <= 0.0 || target.dead {
        return;
    }
    events.push(MoveEvent::new(
        tick,
        source,
        MoveEventKind::Damaged {
            target: Target::Obstacle(target.id),
            amount,
        },
    ));
    if target.apply_damage(amount) {
        events.push(MoveEvent::new(
            tick,
            source,
            MoveEventKind::Killed {
                target: Target::Obstacle(target.id),
                cause: KillCause::Impact,
            },
        ));
    }
}

/// Impact speed `closing` hurts a body whose floor is non-negative and below it.
#[inline]
pub(crate) fn impact_hurts(min_collision_speed: f32, closing: f32) -> bool {
    min_collision_speed >= 0.0 && closing > min_collision_speed
}

/// The pair was apart when the tick began, so touching now is an impact.
#[inline]
fn fresh_contact(old_pos: Vec3, other_pos: Vec3, radius_sum: f32) -> bool {
    flat_len(flat(old_pos - other_pos)) >= radius_sum + CONTACT_SLOP
}

/// Put pushed neighbours back where they stood before this tick's pushes.
fn undo_pushes(pushed: &[(UnitId, Vec3)], units: &mut UnitStore, spatial: &mut dyn SpatialIndex) {
    for &(id, pos) in pushed.iter().rev() {
        if let Some(other) = units.get_mut(id) {
            other.body.pos = pos;
            spatial.unit_moved(id, pos, other.body.radius());
        }
    }
}

/// Separate the mover from everything it overlaps after moving from `old_pos`.
///
/// Impacts are judged on committed velocities (`body.velocity` is last
/// tick's displacement) and only for pairs that were apart at `old_pos`, so
/// a unit leaning on a body does not keep hurting it. A rejected move also
/// reverts every neighbour push made earlier in the same call.
pub fn resolve_collisions(
    state: &mut MovementState,
    strategy: MoveStrategy,
    body: &mut UnitBody,
    old_pos: Vec3,
    ctx: &mut MoveContext<'_>,
) -> CollisionOutcome {
    let mut outcome = CollisionOutcome::default();
    let cfg = ctx.config.collision.clone();
    let tick = ctx.tick;
    let me = body.id;
    let motion = flat(body.pos - old_pos);
    let motion_dir = flat_dir(motion);
    let my_vel = flat(body.velocity);
    let mut pushed: Vec<(UnitId, Vec3)> = Vec::new();

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
        let radius_sum = body.radius() + other.body.radius();
        let (normal, dist) = separation_normal(body.pos, other.body.pos, motion, body.front());
        if dist >= radius_sum {
            continue;
        }
        let penetration = radius_sum - dist;
        let toward = -normal;
        outcome.contacts += 1;

        let allied = body.allied_with(other.body.team);
        if !allied
            && !other.body.profile.crush_resistant
            && other.body.mass() <= body.profile.crush_strength
        {
            other.body.health = 0.0;
            other.body.dead = true;
            ctx.events.push(MoveEvent::new(
                tick,
                me,
                MoveEventKind::Killed {
                    target: Target::Unit(id),
                    cause: KillCause::Crushed,
                },
            ));
            continue;
        }

        let other_vel = flat(other.body.velocity);
        let fresh = fresh_contact(old_pos, other.body.pos, radius_sum);
        let closing = if fresh {
            (my_vel - other_vel).dot(&toward).max(0.0)
        } else {
            0.0
        };

        let pushable = !other.body.profile.push_resistant
            && (allied || cfg.push_enemies)
            && !other.mover.state().is_skidding();
        let (mut mover_share, mut other_share) = if !pushable {
            (penetration, 0.0)
        } else if strategy.drive_weighted_collisions() {
            let mover_w =
                drive_weight(body.mass(), state.current_speed, motion_dir.dot(&toward));
            let other_w = drive_weight(
                other.body.mass(),
                flat_len(other_vel),
                flat_dir(other_vel).dot(&normal),
            );
            split_overlap(penetration, mover_w, other_w)
        } else {
            split_overlap(penetration, body.mass(), 2.0 * other.body.mass())
        };

        if other_share > 0.0 {
            let dest = other.body.pos + toward * other_share;
            let capability = &other.body.profile.capability;
            if ctx.terrain.speed_modifier(capability, dest) <= MIN_PASSABLE_SPEED_MOD {
                mover_share = penetration;
                other_share = 0.0;
            } else {
                pushed.push((id, other.body.pos));
                other.body.pos = Vec3::new(dest.x, ctx.terrain.height(dest.x, dest.z), dest.z);
                ctx.spatial.unit_moved(id, other.body.pos, other.body.radius());
            }
        }
        body.pos += normal * mover_share;

        if collision_debug_enabled() {
            trace!(
                "{} vs {}: pen={:.3} mover={:.3} other={:.3} closing={:.3}",
                me,
                id,
                penetration,
                mover_share,
                other_share,
                closing
            );
        }

        let amount = closing * body.mass() * cfg.damage_factor;
        if impact_hurts(body.profile.min_collision_speed, closing) {
            hurt_unit(body, amount, tick, me, ctx.events);
        }
        if impact_hurts(other.body.profile.min_collision_speed, closing) {
            hurt_unit(&mut other.body, amount, tick, me, ctx.events);
        }
        state.current_speed *= cfg.speed_decay;
    }

    for id in ctx.spatial.obstacles_near(body.pos, body.radius()) {
        if body.dead {
            break;
        }
        let Some(obstacle) = ctx.obstacles.get_mut(id) else {
            continue;
        };
        if obstacle.dead {
            continue;
        }
        let radius_sum = body.radius() + obstacle.radius;
        let (normal, dist) = separation_normal(body.pos, obstacle.pos, motion, body.front());
        if dist >= radius_sum {
            continue;
        }

        if !obstacle.crush_resistant && obstacle.mass <= body.profile.crush_strength {
            obstacle.health = 0.0;
            obstacle.dead = true;
            ctx.events.push(MoveEvent::new(
                tick,
                me,
                MoveEventKind::Killed {
                    target: Target::Obstacle(id),
                    cause: KillCause::Crushed,
                },
            ));
            continue;
        }
        if !obstacle.blocking {
            continue;
        }
        outcome.contacts += 1;

        let toward = -normal;
        if motion.dot(&toward) > 0.0 {
            if !outcome.rejected {
                undo_pushes(&pushed, ctx.units, &mut *ctx.spatial);
                pushed.clear();
                body.pos = old_pos;
                outcome.rejected = true;
                ctx.events.push(MoveEvent::new(tick, me, MoveEventKind::RejectedMove));
            }
            if motion_dir.dot(&toward) > cfg.repath_cone_cos {
                outcome.repath = true;
            }
            let closing = if fresh_contact(old_pos, obstacle.pos, radius_sum) {
                my_vel.dot(&toward).max(0.0)
            } else {
                0.0
            };
            let amount = closing * body.mass() * cfg.damage_factor;
            if impact_hurts(body.profile.min_collision_speed, closing) {
                hurt_unit(body, amount, tick, me, ctx.events);
            }
            if impact_hurts(obstacle.min_collision_speed, closing) {
                hurt_obstacle(obstacle, amount, tick, me, ctx.events);
            }
        }

        // still overlapping (pushed in earlier, or not moving into it): push out
        let (normal, dist) = separation_normal(body.pos, obstacle.pos, motion, body.front());
        if dist < radius_sum {
            body.pos += normal * (radius_sum - dist);
        }
        state.current_speed *= cfg.speed_decay;
    }

    let capability = &body.profile.capability;
    if !strategy.allows_tunneling()
        && !outcome.rejected
        && ctx.terrain.speed_modifier(capability, body.pos) <= MIN_PASSABLE_SPEED_MOD
        && ctx.terrain.speed_modifier(capability, old_pos) > MIN_PASSABLE_SPEED_MOD
    {
        undo_pushes(&pushed, ctx.units, &mut *ctx.spatial);
        body.pos = old_pos;
        outcome.rejected = true;
        ctx.events.push(MoveEvent::new(tick, me, MoveEventKind::RejectedMove));
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_fixtures::Harness;
    use crate::MoveProfile;

    #[test]
    fn test_split_sums_to_penetration() {
        let (a, b) = split_overlap(4.0, 300.0, 100.0);
        assert!((a + b - 4.0).abs() < 1e-6);
        assert!((b - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_classic_split_weights() {
        // equal masses: neighbour moves a third, mover two thirds
        let (mover, other) = split_overlap(3.0, 100.0, 200.0);
        assert!((mover - 2.0).abs() < 1e-6);
        assert!((other - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_drive_weight_favours_fast_aligned_mover() {
        assert!(drive_weight(100.0, 2.0, 1.0) > drive_weight(100.0, 2.0, 0.2));
        assert_eq!(drive_weight(100.0, 2.0, -1.0), 100.0);
    }

    #[test]
    fn test_equal_masses_split_evenly() {
        let mut h = Harness::flat(64, 64);
        let a = h.add_unit(MoveProfile::default(), Vec3::new(100.0, 0.0, 100.0), 0);
        let b = h.add_unit(MoveProfile::default(), Vec3::new(112.0, 0.0, 100.0), 0);
        let mut unit_a = h.units.take(a).unwrap();
        let old = unit_a.body.pos - Vec3::new(0.0, 0.0, 1.0);
        let outcome = {
            let mut ctx = h.ctx(1);
            let strategy = unit_a.mover.strategy();
            resolve_collisions(unit_a.mover.state_mut(), strategy, &mut unit_a.body, old, &mut ctx)
        };
        assert_eq!(outcome.contacts, 1);
        assert!(!outcome.rejected);
        assert!((unit_a.body.pos.x - 98.0).abs() < 1e-4);
        assert!((h.units.get(b).unwrap().body.pos.x - 114.0).abs() < 1e-4);
    }

    #[test]
    fn test_enemy_not_pushed_by_default() {
        let mut h = Harness::flat(64, 64);
        let a = h.add_unit(MoveProfile::default(), Vec3::new(100.0, 0.0, 100.0), 0);
        let b = h.add_unit(MoveProfile::default(), Vec3::new(112.0, 0.0, 100.0), 1);
        let mut unit_a = h.units.take(a).unwrap();
        let old = unit_a.body.pos;
        {
            let mut ctx = h.ctx(1);
            let strategy = unit_a.mover.strategy();
            resolve_collisions(unit_a.mover.state_mut(), strategy, &mut unit_a.body, old, &mut ctx);
        }
        assert!((unit_a.body.pos.x - 96.0).abs() < 1e-4);
        assert_eq!(h.units.get(b).unwrap().body.pos.x, 112.0);
    }

    #[test]
    fn test_light_enemy_is_crushed() {
        let mut h = Harness::flat(64, 64);
        let a = h.add_unit(MoveProfile::default(), Vec3::new(100.0, 0.0, 100.0), 0);
        let light = MoveProfile {
            mass: 10.0,
            radius: 4.0,
            ..MoveProfile::default()
        };
        let b = h.add_unit(light, Vec3::new(108.0, 0.0, 100.0), 1);
        let mut unit_a = h.units.take(a).unwrap();
        let old = unit_a.body.pos - Vec3::new(2.0, 0.0, 0.0);
        {
            let mut ctx = h.ctx(1);
            let strategy = unit_a.mover.strategy();
            resolve_collisions(unit_a.mover.state_mut(), strategy, &mut unit_a.body, old, &mut ctx);
        }
        assert!(h.units.get(b).unwrap().body.dead);
        assert!(h.events.iter().any(|e| matches!(
            e.kind,
            MoveEventKind::Killed {
                target: Target::Unit(id),
                cause: KillCause::Crushed
            } if id == b
        )));
    }

    #[test]
    fn test_driving_into_static_blocker_is_rejected() {
        let mut h = Harness::flat(64, 64);
        let a = h.add_unit(MoveProfile::default(), Vec3::new(100.0, 0.0, 100.0), 0);
        h.add_obstacle(Obstacle::new(Vec3::new(115.0, 0.0, 100.0), 8.0, 1000.0));
        let mut unit_a = h.units.take(a).unwrap();
        let old = Vec3::new(98.0, 0.0, 100.0);
        let outcome = {
            let mut ctx = h.ctx(1);
            let strategy = unit_a.mover.strategy();
            resolve_collisions(unit_a.mover.state_mut(), strategy, &mut unit_a.body, old, &mut ctx)
        };
        assert!(outcome.rejected);
        assert!(outcome.repath);
        assert_eq!(unit_a.body.pos, old);
    }

    #[test]
    fn test_rejected_move_restores_pushed_ally() {
        let mut h = Harness::flat(64, 64);
        let a = h.add_unit(MoveProfile::default(), Vec3::new(100.0, 0.0, 100.0), 0);
        let b = h.add_unit(MoveProfile::default(), Vec3::new(100.0, 0.0, 114.0), 0);
        h.add_obstacle(Obstacle::new(Vec3::new(115.0, 0.0, 100.0), 8.0, 1000.0));
        let ally_before = h.unit(b).body.pos;
        let mut unit_a = h.units.take(a).unwrap();
        let old = Vec3::new(98.0, 0.0, 100.0);
        let outcome = {
            let mut ctx = h.ctx(1);
            let strategy = unit_a.mover.strategy();
            resolve_collisions(unit_a.mover.state_mut(), strategy, &mut unit_a.body, old, &mut ctx)
        };
        assert!(outcome.rejected);
        assert_eq!(outcome.contacts, 2);
        assert_eq!(unit_a.body.pos, old);
        assert!(flat_len(h.unit(b).body.pos - ally_before) < 1e-5);
    }

    #[test]
    fn test_fresh_impact_hurts_both_once() {
        let mut h = Harness::flat(64, 64);
        let wall = MoveProfile {
            push_resistant: true,
            ..MoveProfile::default()
        };
        let a = h.add_unit(MoveProfile::default(), Vec3::new(102.0, 0.0, 100.0), 0);
        let b = h.add_unit(wall, Vec3::new(116.0, 0.0, 100.0), 0);
        let mut unit_a = h.units.take(a).unwrap();
        unit_a.body.velocity = Vec3::new(2.0, 0.0, 0.0);
        let old = Vec3::new(97.0, 0.0, 100.0);
        {
            let mut ctx = h.ctx(1);
            let strategy = unit_a.mover.strategy();
            resolve_collisions(unit_a.mover.state_mut(), strategy, &mut unit_a.body, old, &mut ctx);
        }
        // 2 elmos/tick * mover mass 100 * damage factor 0.2
        assert!((unit_a.body.health - 960.0).abs() < 1e-3);
        assert!((h.unit(b).body.health - 960.0).abs() < 1e-3);
        assert!((unit_a.body.pos.x - 100.0).abs() < 1e-4);

        // leaning on it next tick is not another impact
        h.events.clear();
        let old = unit_a.body.pos;
        unit_a.body.pos.x += 2.0;
        {
            let mut ctx = h.ctx(2);
            let strategy = unit_a.mover.strategy();
            resolve_collisions(unit_a.mover.state_mut(), strategy, &mut unit_a.body, old, &mut ctx);
        }
        assert!(!h.events.iter().any(|e| matches!(e.kind, MoveEventKind::Damaged { .. })));
        assert!((unit_a.body.health - 960.0).abs() < 1e-3);
    }

    #[test]
    fn test_impact_below_floor_is_harmless() {
        let mut h = Harness::flat(64, 64);
        let a = h.add_unit(MoveProfile::default(), Vec3::new(100.0, 0.0, 100.0), 0);
        let rock = h.add_obstacle(Obstacle::new(Vec3::new(115.0, 0.0, 100.0), 8.0, 1000.0));
        let mut unit_a = h.units.take(a).unwrap();
        unit_a.body.velocity = Vec3::new(0.8, 0.0, 0.0);
        let old = Vec3::new(92.0, 0.0, 100.0);
        let outcome = {
            let mut ctx = h.ctx(1);
            let strategy = unit_a.mover.strategy();
            resolve_collisions(unit_a.mover.state_mut(), strategy, &mut unit_a.body, old, &mut ctx)
        };
        assert!(outcome.rejected);
        assert!(h.events.iter().all(|e| !matches!(e.kind, MoveEventKind::Damaged { .. })));
        assert_eq!(h.obstacles.get(rock).unwrap().health, 200.0);
    }

    #[test]
    fn test_impact_proof_obstacle_keeps_health() {
        let mut h = Harness::flat(64, 64);
        let a = h.add_unit(MoveProfile::default(), Vec3::new(100.0, 0.0, 100.0), 0);
        let mut tough = Obstacle::new(Vec3::new(115.0, 0.0, 100.0), 8.0, 1000.0);
        tough.min_collision_speed = -1.0;
        let rock = h.add_obstacle(tough);
        let mut unit_a = h.units.take(a).unwrap();
        unit_a.body.velocity = Vec3::new(2.0, 0.0, 0.0);
        let old = Vec3::new(92.0, 0.0, 100.0);
        {
            let mut ctx = h.ctx(1);
            let strategy = unit_a.mover.strategy();
            resolve_collisions(unit_a.mover.state_mut(), strategy, &mut unit_a.body, old, &mut ctx);
        }
        assert_eq!(h.obstacles.get(rock).unwrap().health, 200.0);
        // the mover still feels it
        assert!(unit_a.body.health < 1000.0);
    }
}
