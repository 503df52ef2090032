//! End-to-end locomotion scenarios driven through [`Simulation`].

use super::body::{Obstacle, UnitId};
use super::config::LocoConfig;
use super::events::{FailureReason, MoveEventKind};
use super::math::{flat_dist, heading_delta, Vec3};
use super::path_oracle::DirectPathOracle;
use super::profile::MoveProfile;
use super::spatial::GridSpatialIndex;
use super::state::ProgressState;
use super::strategy::MoveStrategy;
use super::terrain::HeightGrid;
use super::test_fixtures::Harness;
use super::world::{Simulation, UnitSpawn};
use crate::engine::collision::resolve_collisions;

fn sim_with(terrain: HeightGrid, config: LocoConfig, seed: u64) -> Simulation {
    Simulation::new(
        config,
        Box::new(terrain),
        Box::new(DirectPathOracle::new()),
        Box::new(GridSpatialIndex::default()),
        seed,
    )
}

fn flat_sim() -> Simulation {
    sim_with(HeightGrid::flat(64, 64), LocoConfig::default(), 7)
}

fn spawn(sim: &mut Simulation, x: f32, z: f32) -> UnitId {
    sim.spawn_unit(UnitSpawn::new(MoveProfile::default(), Vec3::new(x, 0.0, z)))
        .unwrap()
}

/// Four units crossing paths in the middle of the map.
fn crossing(sim: &mut Simulation) -> Vec<UnitId> {
    let legs = [
        ((100.0, 250.0), (400.0, 250.0)),
        ((400.0, 260.0), (100.0, 260.0)),
        ((250.0, 100.0), (250.0, 400.0)),
        ((260.0, 400.0), (260.0, 100.0)),
    ];
    legs.iter()
        .map(|&((sx, sz), (gx, gz))| {
            let id = spawn(sim, sx, sz);
            sim.start_moving(id, Vec3::new(gx, 0.0, gz), 16.0, None).unwrap();
            id
        })
        .collect()
}

// ========== Path following ==========

#[test]
fn test_straight_run_arrives_within_bound() {
    let mut sim = flat_sim();
    let id = spawn(&mut sim, 100.0, 100.0);
    let goal = Vec3::new(200.0, 0.0, 100.0);
    sim.start_moving(id, goal, 8.0, None).unwrap();

    let profile = MoveProfile::default();
    let half_turn = (profile.turn_period_ticks() / 2.0).ceil() as u64;
    let bound = (100.0 / profile.max_speed).ceil() as u64 + half_turn;
    let mut arrived_at = None;
    for _ in 0..bound {
        sim.step();
        if sim.unit(id).unwrap().mover.progress() == ProgressState::Done {
            arrived_at = Some(sim.tick());
            break;
        }
    }
    assert!(arrived_at.is_some(), "not done after {} ticks", bound);
    let unit = sim.unit(id).unwrap();
    assert!(flat_dist(unit.body.pos, goal) <= 8.0 + profile.max_speed);
    assert!(!unit.mover.has_path());
    assert!(sim.events().iter().any(|e| e.unit == id && e.kind == MoveEventKind::Arrived));
}

#[test]
fn test_run_from_map_corner_arrives_within_bound() {
    let mut sim = flat_sim();
    let id = spawn(&mut sim, 0.0, 0.0);
    assert_eq!(sim.unit(id).unwrap().body.pos, Vec3::zeros());
    let goal = Vec3::new(100.0, 0.0, 0.0);
    sim.start_moving(id, goal, 8.0, None).unwrap();

    let profile = MoveProfile::default();
    let half_turn = (profile.turn_period_ticks() / 2.0).ceil() as u64;
    let bound = (100.0 / profile.max_speed).ceil() as u64 + half_turn;
    sim.run(bound);

    let unit = sim.unit(id).unwrap();
    assert_eq!(unit.mover.progress(), ProgressState::Done);
    assert!(flat_dist(unit.body.pos, goal) <= 8.0 + profile.max_speed);
    assert!(unit.body.pos.x >= 0.0 && unit.body.pos.z >= 0.0);
    assert!(!sim.events().iter().any(|e| e.kind == MoveEventKind::RejectedMove));
}

#[test]
fn test_unreachable_goal_fails_in_place() {
    let mut grid = HeightGrid::flat(64, 64);
    grid.block_rect(Vec3::new(280.0, 0.0, 280.0), Vec3::new(330.0, 0.0, 330.0));
    let mut sim = sim_with(grid, LocoConfig::default(), 7);
    let id = spawn(&mut sim, 100.0, 100.0);
    let start = sim.unit(id).unwrap().body.pos;
    sim.start_moving(id, Vec3::new(305.0, 0.0, 305.0), 4.0, None).unwrap();
    sim.run(40);

    let unit = sim.unit(id).unwrap();
    assert_eq!(unit.mover.progress(), ProgressState::Failed);
    assert_eq!(unit.body.pos, start);
    assert!(sim.events().iter().any(|e| e.kind
        == MoveEventKind::MoveFailed {
            reason: FailureReason::PathNotFound
        }));
}

#[test]
fn test_heading_and_speed_limits_hold_in_traffic() {
    let mut sim = flat_sim();
    let ids = crossing(&mut sim);
    let mut last: Vec<i16> = ids.iter().map(|&id| sim.unit(id).unwrap().body.heading).collect();
    for _ in 0..300 {
        sim.step();
        for (i, &id) in ids.iter().enumerate() {
            let unit = sim.unit(id).unwrap();
            let p = &unit.body.profile;
            assert!(unit.mover.current_speed().abs() <= p.max_any_speed() + 1e-4);
            if !unit.mover.is_skidding() {
                let turned = heading_delta(last[i], unit.body.heading) as i32;
                assert!(turned.abs() <= p.turn_rate as i32);
            }
            last[i] = unit.body.heading;
        }
    }
}

#[test]
fn test_stop_moving_is_idempotent() {
    let mut sim = flat_sim();
    let id = spawn(&mut sim, 100.0, 100.0);
    sim.start_moving(id, Vec3::new(400.0, 0.0, 100.0), 8.0, None).unwrap();
    sim.run(20);
    sim.stop_moving(id).unwrap();
    let once = sim.unit(id).unwrap().clone();
    let events = sim.events().len();
    sim.stop_moving(id).unwrap();
    assert_eq!(sim.unit(id).unwrap(), &once);
    assert_eq!(sim.events().len(), events);
    assert_eq!(once.mover.progress(), ProgressState::Done);
}

// ========== Failure paths ==========

fn failures(sim: &Simulation, id: UnitId) -> Vec<FailureReason> {
    sim.events()
        .iter()
        .filter(|e| e.unit == id)
        .filter_map(|e| match e.kind {
            MoveEventKind::MoveFailed { reason } => Some(reason),
            _ => None,
        })
        .collect()
}

fn first_tick(sim: &Simulation, id: UnitId, kind: MoveEventKind) -> Option<u64> {
    sim.events().iter().find(|e| e.unit == id && e.kind == kind).map(|e| e.tick)
}

/// Map with a single open move-square row at z 96..112.
fn corridor() -> HeightGrid {
    let mut grid = HeightGrid::flat(64, 64);
    grid.block_rect(Vec3::new(0.0, 0.0, 64.0), Vec3::new(512.0, 0.0, 96.0));
    grid.block_rect(Vec3::new(0.0, 0.0, 112.0), Vec3::new(512.0, 0.0, 144.0));
    grid
}

fn no_avoidance() -> LocoConfig {
    let mut config = LocoConfig::default();
    config.steering.avoidance_strength = 0.0;
    config
}

fn facing_east(sim: &mut Simulation, profile: MoveProfile, x: f32, z: f32) -> UnitId {
    let spawn = UnitSpawn::new(profile, Vec3::new(x, 0.0, z))
        .heading(16384)
        .strategy(MoveStrategy::Modern);
    sim.spawn_unit(spawn).unwrap()
}

#[test]
fn test_blocked_by_immovable_ally_repaths_once_then_fails_stuck() {
    let mut sim = sim_with(corridor(), LocoConfig::default(), 7);
    let id = facing_east(&mut sim, MoveProfile::default(), 100.0, 104.0);
    let wall = MoveProfile {
        push_resistant: true,
        ..MoveProfile::default()
    };
    let ally = sim.spawn_unit(UnitSpawn::new(wall, Vec3::new(200.0, 0.0, 104.0))).unwrap();
    sim.start_moving(id, Vec3::new(480.0, 0.0, 104.0), 8.0, None).unwrap();
    sim.run(600);

    let mover = sim.unit(id).unwrap();
    assert_eq!(mover.mover.progress(), ProgressState::Failed);
    assert_eq!(failures(&sim, id), vec![FailureReason::Stuck]);
    assert!(first_tick(&sim, id, MoveEventKind::Repathed).is_some());
    assert!(mover.body.pos.x < 200.0);

    // one impact when they met, nothing for the leaning that followed
    let ally_body = &sim.unit(ally).unwrap().body;
    assert!(!mover.body.dead && !ally_body.dead);
    let hits = sim
        .events()
        .iter()
        .filter(|e| matches!(e.kind, MoveEventKind::Damaged { .. }))
        .count();
    assert!(hits <= 2, "{} damage events", hits);
    assert!(mover.body.health > 900.0 && ally_body.health > 900.0);
}

#[test]
fn test_blocked_line_to_waypoint_repaths_before_contact() {
    let mut config = no_avoidance();
    config.failure.max_eta_failures = 1;
    let mut sim = sim_with(HeightGrid::flat(64, 64), config, 7);
    // wide turning circle keeps the waypoint four or five squares ahead
    let profile = MoveProfile {
        turn_rate: 652.0,
        ..MoveProfile::default()
    };
    let id = facing_east(&mut sim, profile, 100.0, 104.0);
    let pebble = sim.add_obstacle(Obstacle::new(Vec3::new(232.0, 0.0, 104.0), 2.0, 1000.0));
    sim.start_moving(id, Vec3::new(480.0, 0.0, 104.0), 8.0, None).unwrap();

    let mut touched = None;
    for _ in 0..120 {
        sim.step();
        let gap =
            flat_dist(sim.unit(id).unwrap().body.pos, sim.obstacle(pebble).unwrap().pos) - 10.0;
        if touched.is_none() && gap <= 0.01 {
            touched = Some(sim.tick());
        }
    }
    let repathed = first_tick(&sim, id, MoveEventKind::Repathed).expect("no repath");
    let rejected = first_tick(&sim, id, MoveEventKind::RejectedMove);
    assert!(rejected.map_or(true, |t| repathed < t));
    assert!(touched.map_or(true, |t| repathed < t));
}

#[test]
fn test_goal_under_boulder_fails_clogged() {
    let mut config = no_avoidance();
    config.failure.goal_clog_fraction = 0.1;
    let mut sim = sim_with(HeightGrid::flat(64, 64), config, 7);
    let id = facing_east(&mut sim, MoveProfile::default(), 100.0, 104.0);
    let boulder = sim.add_obstacle(Obstacle::new(Vec3::new(300.0, 0.0, 104.0), 40.0, 5000.0));
    sim.start_moving(id, Vec3::new(300.0, 0.0, 104.0), 8.0, None).unwrap();
    sim.run(300);

    let unit = sim.unit(id).unwrap();
    assert_eq!(unit.mover.progress(), ProgressState::Failed);
    assert_eq!(failures(&sim, id), vec![FailureReason::GoalClogged]);
    assert!(!unit.mover.has_path());
    let boulder = sim.obstacle(boulder).unwrap();
    assert!(!boulder.dead);
    assert!(flat_dist(unit.body.pos, boulder.pos) >= 48.0 - 0.01);
}

#[test]
fn test_repeated_requests_from_same_spot_fail_non_moving() {
    let mut config = no_avoidance();
    config.failure.max_non_moving_failures = 2;
    let mut sim = sim_with(HeightGrid::flat(64, 64), config, 7);
    let id = facing_east(&mut sim, MoveProfile::default(), 100.0, 104.0);
    sim.add_obstacle(Obstacle::new(Vec3::new(220.0, 0.0, 104.0), 40.0, 5000.0));
    sim.start_moving(id, Vec3::new(480.0, 0.0, 104.0), 8.0, None).unwrap();
    sim.run(400);

    assert_eq!(sim.unit(id).unwrap().mover.progress(), ProgressState::Failed);
    assert_eq!(failures(&sim, id), vec![FailureReason::NonMoving]);
    let repaths = sim
        .events()
        .iter()
        .filter(|e| e.unit == id && e.kind == MoveEventKind::Repathed)
        .count();
    assert!(repaths >= 2);
}

#[test]
fn test_classic_tunnels_through_thin_impassable_strip() {
    let run = |strategy: MoveStrategy| {
        let mut h = Harness::flat(64, 64);
        let id = h.add_unit_with(MoveProfile::default(), Vec3::new(104.0, 0.0, 100.0), 0, strategy);
        h.with_unit(id, 0, |unit, ctx| {
            unit.mover
                .start_moving(&mut unit.body, Vec3::new(104.0, 0.0, 300.0), 8.0, None, ctx)
        });
        // appears after the path was handed out
        h.terrain
            .block_rect(Vec3::new(96.0, 0.0, 144.0), Vec3::new(112.0, 0.0, 152.0));
        for tick in 1..=80 {
            h.update(id, tick);
        }
        let rejected = h
            .events
            .iter()
            .filter(|e| e.unit == id && e.kind == MoveEventKind::RejectedMove)
            .count();
        (h.unit(id).body.pos.z, rejected)
    };

    let (classic_z, classic_rejected) = run(MoveStrategy::Classic);
    assert!(classic_z > 152.0, "classic stopped at z={}", classic_z);
    assert_eq!(classic_rejected, 1);

    let (modern_z, modern_rejected) = run(MoveStrategy::Modern);
    assert!(modern_z < 144.0, "modern entered the strip at z={}", modern_z);
    assert_eq!(modern_rejected, 0);
}

// ========== Collisions ==========

#[test]
fn test_equal_masses_share_overlap() {
    let mut h = Harness::flat(64, 64);
    let a = h.add_unit(MoveProfile::default(), Vec3::new(100.0, 0.0, 100.0), 0);
    let b = h.add_unit(MoveProfile::default(), Vec3::new(110.0, 0.0, 100.0), 0);
    let before_b = h.unit(b).body.pos;
    let mut unit_a = h.units.take(a).unwrap();
    let before_a = unit_a.body.pos;
    {
        let mut ctx = h.ctx(1);
        let strategy = unit_a.mover.strategy();
        resolve_collisions(
            unit_a.mover.state_mut(),
            strategy,
            &mut unit_a.body,
            before_a,
            &mut ctx,
        );
    }
    let moved_a = unit_a.body.pos - before_a;
    let moved_b = h.unit(b).body.pos - before_b;
    // 16 elmos of radius, 10 apart: 6 to resolve
    assert!((moved_a.x + 3.0).abs() < 1e-4);
    assert!((moved_b.x - 3.0).abs() < 1e-4);
    assert!((moved_b.x - moved_a.x - 6.0).abs() < 1e-4);
}

#[test]
fn test_heavier_body_is_displaced_less() {
    let mut h = Harness::flat(64, 64);
    let heavy = MoveProfile {
        mass: 300.0,
        ..MoveProfile::default()
    };
    let a = h.add_unit(MoveProfile::default(), Vec3::new(100.0, 0.0, 100.0), 0);
    let b = h.add_unit(heavy, Vec3::new(112.0, 0.0, 100.0), 0);
    let mut unit_a = h.units.take(a).unwrap();
    let before = unit_a.body.pos;
    {
        let mut ctx = h.ctx(1);
        let strategy = unit_a.mover.strategy();
        resolve_collisions(unit_a.mover.state_mut(), strategy, &mut unit_a.body, before, &mut ctx);
    }
    let moved_a = (unit_a.body.pos - before).x.abs();
    let moved_b = h.unit(b).body.pos.x - 112.0;
    assert!(moved_b < moved_a);
    assert!((moved_a + moved_b - 4.0).abs() < 1e-4);
}

#[test]
fn test_units_never_sink_into_static_blocker() {
    let mut sim = flat_sim();
    let rock = sim.add_obstacle(Obstacle::new(Vec3::new(200.0, 0.0, 100.0), 16.0, 1000.0));
    let id = spawn(&mut sim, 100.0, 100.0);
    sim.start_moving(id, Vec3::new(320.0, 0.0, 100.0), 8.0, None).unwrap();
    for _ in 0..250 {
        sim.step();
        let unit = sim.unit(id).unwrap();
        let obstacle = sim.obstacle(rock).unwrap();
        let gap = flat_dist(unit.body.pos, obstacle.pos) - (unit.body.radius() + obstacle.radius);
        assert!(gap > -0.01, "penetrated by {} at tick {}", -gap, sim.tick());
    }
}

#[test]
fn test_steers_around_rock_on_straight_path() {
    let mut sim = flat_sim();
    let rock = sim.add_obstacle(Obstacle::new(Vec3::new(200.0, 0.0, 100.0), 16.0, 1000.0));
    let id = facing_east(&mut sim, MoveProfile::default(), 100.0, 100.0);
    let goal = Vec3::new(320.0, 0.0, 100.0);
    sim.start_moving(id, goal, 8.0, None).unwrap();
    sim.run(400);

    let unit = sim.unit(id).unwrap();
    assert_eq!(unit.mover.progress(), ProgressState::Done);
    assert!(flat_dist(unit.body.pos, goal) <= 8.0 + unit.body.profile.max_speed);
    assert!(!sim.events().iter().any(|e| e.kind == MoveEventKind::RejectedMove));
    let rock = sim.obstacle(rock).unwrap();
    assert!(!rock.dead);
    assert_eq!(rock.health, 200.0);
}

#[test]
fn test_classic_unit_survives_driving_into_heavy_rock() {
    let mut sim = flat_sim();
    let spawn = UnitSpawn::new(MoveProfile::default(), Vec3::new(100.0, 0.0, 104.0))
        .heading(16384)
        .strategy(MoveStrategy::Classic);
    let id = sim.spawn_unit(spawn).unwrap();
    // goal just short of the rock centre, so steering never looks at the rock
    let rock = sim.add_obstacle(Obstacle::new(Vec3::new(200.0, 0.0, 104.0), 16.0, 1000.0));
    sim.start_moving(id, Vec3::new(190.0, 0.0, 104.0), 8.0, None).unwrap();
    sim.run(200);

    let unit = sim.unit(id).unwrap();
    assert!(sim.events().iter().any(|e| e.kind == MoveEventKind::RejectedMove));
    assert!(!unit.body.dead);
    assert!(unit.body.health >= 1000.0 - 40.0 - 1e-3);
    let rock = sim.obstacle(rock).unwrap();
    assert!(!rock.dead);
    assert!(rock.health >= 200.0 - 40.0 - 1e-3);
}

// ========== Skids ==========

#[test]
fn test_impulse_above_threshold_takes_control() {
    let mut sim = flat_sim();
    let id = spawn(&mut sim, 200.0, 200.0);
    sim.start_moving(id, Vec3::new(200.0, 0.0, 400.0), 8.0, None).unwrap();
    assert!(sim.apply_impulse(id, Vec3::new(10.0, 0.0, 0.0)).unwrap());
    assert!(sim.unit(id).unwrap().mover.is_skidding());
    assert!(sim.events().iter().any(|e| matches!(e.kind, MoveEventKind::SkidStarted { .. })));

    let start = sim.unit(id).unwrap().body.pos;
    sim.run(5);
    let unit = sim.unit(id).unwrap();
    assert!(unit.mover.is_skidding());
    // sliding sideways, not driving toward the goal
    assert!(unit.body.pos.x - start.x > 20.0);
    assert!((unit.body.pos.z - start.z).abs() < 1.0);
    assert_eq!(unit.mover.progress(), ProgressState::Active);

    sim.run(400);
    let unit = sim.unit(id).unwrap();
    assert!(!unit.mover.is_skidding());
    assert_eq!(unit.mover.progress(), ProgressState::Done);
    assert!(sim.events().iter().any(|e| e.kind == MoveEventKind::SkidEnded));
}

#[test]
fn test_impulse_below_threshold_changes_nothing() {
    let mut sim = flat_sim();
    let id = spawn(&mut sim, 200.0, 200.0);
    let before = sim.unit(id).unwrap().mover.clone();
    assert!(!sim.apply_impulse(id, Vec3::new(2.0, 0.0, 0.0)).unwrap());
    assert_eq!(sim.unit(id).unwrap().mover, before);
    assert!(sim.events().is_empty());
}

// ========== Determinism ==========

#[test]
fn test_same_seed_same_hash() {
    let run = || {
        let mut sim = flat_sim();
        let ids = crossing(&mut sim);
        sim.apply_impulse(ids[0], Vec3::new(0.0, 6.0, 8.0)).unwrap();
        sim.run(240);
        sim.state_hash().unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_strategies_push_idle_ally_differently() {
    let run = |strategy: MoveStrategy| {
        let mut sim = flat_sim();
        let id = sim
            .spawn_unit(
                UnitSpawn::new(MoveProfile::default(), Vec3::new(100.0, 0.0, 100.0))
                    .strategy(strategy),
            )
            .unwrap();
        let idle = spawn(&mut sim, 180.0, 104.0);
        sim.start_moving(id, Vec3::new(300.0, 0.0, 100.0), 8.0, None).unwrap();
        sim.run(120);
        sim.unit(idle).unwrap().body.pos
    };
    assert_ne!(run(MoveStrategy::Modern), run(MoveStrategy::Classic));
}

#[test]
fn test_restore_continues_identically_without_paths() {
    let mut sim = flat_sim();
    let ids = crossing(&mut sim);
    sim.run(400);
    for &id in &ids {
        assert!(!sim.unit(id).unwrap().mover.has_path());
    }
    let bytes = sim.snapshot().to_msgpack().unwrap();

    let snapshot = crate::SimulationSnapshot::from_msgpack(&bytes).unwrap();
    let mut resumed = Simulation::restore(
        snapshot,
        Box::new(HeightGrid::flat(64, 64)),
        Box::new(DirectPathOracle::new()),
        Box::new(GridSpatialIndex::default()),
    )
    .unwrap();
    assert_eq!(resumed.state_hash().unwrap(), sim.state_hash().unwrap());

    sim.apply_impulse(ids[1], Vec3::new(5.0, 3.0, 0.0)).unwrap();
    resumed.apply_impulse(ids[1], Vec3::new(5.0, 3.0, 0.0)).unwrap();
    sim.run(60);
    resumed.run(60);
    assert_eq!(resumed.state_hash().unwrap(), sim.state_hash().unwrap());
}

#[test]
fn test_restore_re_requests_active_path() {
    let mut sim = flat_sim();
    let id = spawn(&mut sim, 100.0, 100.0);
    let goal = Vec3::new(400.0, 0.0, 100.0);
    sim.start_moving(id, goal, 8.0, None).unwrap();
    sim.run(30);
    assert!(sim.unit(id).unwrap().mover.has_path());

    let mut resumed = Simulation::restore(
        sim.snapshot(),
        Box::new(HeightGrid::flat(64, 64)),
        Box::new(DirectPathOracle::new()),
        Box::new(GridSpatialIndex::default()),
    )
    .unwrap();
    let unit = resumed.unit(id).unwrap();
    assert!(unit.mover.has_path());
    assert_eq!(unit.mover.progress(), ProgressState::Active);
    resumed.run(300);
    let unit = resumed.unit(id).unwrap();
    assert_eq!(unit.mover.progress(), ProgressState::Done);
    assert!(flat_dist(unit.body.pos, goal) <= 8.0 + unit.body.profile.max_speed);
}

#[test]
fn test_restore_rejects_bad_config() {
    let mut snapshot = flat_sim().snapshot();
    snapshot.config.skid.impulse_threshold = 0.0;
    let result = Simulation::restore(
        snapshot,
        Box::new(HeightGrid::flat(8, 8)),
        Box::new(DirectPathOracle::new()),
        Box::new(GridSpatialIndex::default()),
    );
    assert!(result.is_err());
}

// ========== Property tests ==========

#[cfg(all(test, feature = "proptest"))]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Any open-ground goal is reached within distance / speed plus turning slack
        #[test]
        fn prop_reachable_goal_completes(
            gx in 60.0f32..450.0f32,
            gz in 60.0f32..450.0f32,
            heading in any::<i16>()
        ) {
            let mut sim = flat_sim();
            let id = sim
                .spawn_unit(
                    UnitSpawn::new(MoveProfile::default(), Vec3::new(256.0, 0.0, 256.0))
                        .heading(heading),
                )
                .unwrap();
            let goal = Vec3::new(gx, 0.0, gz);
            sim.start_moving(id, goal, 8.0, None).unwrap();
            let profile = MoveProfile::default();
            let bound = (flat_dist(Vec3::new(256.0, 0.0, 256.0), goal) / profile.max_speed) as u64
                + profile.turn_period_ticks() as u64
                + 60;
            sim.run(bound);
            prop_assert_eq!(sim.unit(id).unwrap().mover.progress(), ProgressState::Done);
        }

        /// Per-tick heading change never exceeds the turn rate
        #[test]
        fn prop_turn_rate_respected(
            turn_rate in 100.0f32..4000.0f32,
            gx in 60.0f32..450.0f32,
            gz in 60.0f32..450.0f32
        ) {
            let mut sim = flat_sim();
            let profile = MoveProfile { turn_rate, ..MoveProfile::default() };
            let id = sim.spawn_unit(UnitSpawn::new(profile, Vec3::new(256.0, 0.0, 256.0))).unwrap();
            sim.start_moving(id, Vec3::new(gx, 0.0, gz), 8.0, None).unwrap();
            let mut last = sim.unit(id).unwrap().body.heading;
            for _ in 0..120 {
                sim.step();
                let heading = sim.unit(id).unwrap().body.heading;
                prop_assert!((heading_delta(last, heading) as i32).abs() <= turn_rate as i32);
                last = heading;
            }
        }
    }
}
