//! Simulation tick driver
//!
//! Owns the bodies, the controllers, the synced RNG and the three
//! collaborators, and advances everything in whole ticks.
//!
//! ## Tick order
//! 1. fast pass: every live unit in ascending id order; each move (pose
//!    and spatial index) commits before the next unit is looked at
//! 2. bodies destroyed by an update are removed right after it
//! 3. slow pass on every `SLOW_UPDATE_INTERVAL`-th tick, same order
//!
//! Within one tick a unit therefore sees already-moved neighbours with
//! lower ids and not-yet-moved neighbours with higher ids, identically on
//! every replica.

use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::body::{Obstacle, ObstacleId, PhysicalState, UnitBody, UnitId};
use super::config::LocoConfig;
use super::controller::{GroundMover, MoveContext};
use super::events::{MoveEvent, MoveEventKind, Target};
use super::external::{PathOracle, SpatialIndex, TerrainSampler};
use super::math::Vec3;
use super::profile::MoveProfile;
use super::snapshot::{SimulationSnapshot, SNAPSHOT_VERSION};
use super::strategy::MoveStrategy;
use super::timestep::is_slow_tick;
use crate::error::{LocoError, Result};

/// A ground unit: its body and its controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub body: UnitBody,
    pub mover: GroundMover,
}

/// Unit slots indexed by id. Ids start at 1 and are never reused.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitStore {
    slots: Vec<Option<Unit>>,
}

impl UnitStore {
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.slots.get_mut(id.0 as usize)?.as_mut()
    }

    /// Remove a unit from its slot; `put` returns it.
    pub fn take(&mut self, id: UnitId) -> Option<Unit> {
        self.slots.get_mut(id.0 as usize)?.take()
    }

    /// Store a unit in the slot of its id.
    pub fn put(&mut self, unit: Unit) {
        let idx = unit.body.id.0 as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        self.slots[idx] = Some(unit);
    }

    /// Id the next spawned unit gets.
    pub fn next_id(&self) -> UnitId {
        UnitId(self.slots.len().max(1) as u32)
    }

    /// Live ids, ascending.
    pub fn ids(&self) -> Vec<UnitId> {
        self.iter().map(|u| u.body.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Static obstacle slots indexed by id. Ids start at 1 and are never reused.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObstacleStore {
    slots: Vec<Option<Obstacle>>,
}

impl ObstacleStore {
    /// Store an obstacle under a fresh id.
    pub fn insert(&mut self, mut obstacle: Obstacle) -> ObstacleId {
        if self.slots.is_empty() {
            self.slots.push(None);
        }
        let id = ObstacleId(self.slots.len() as u32);
        obstacle.id = id;
        self.slots.push(Some(obstacle));
        id
    }

    pub fn get(&self, id: ObstacleId) -> Option<&Obstacle> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: ObstacleId) -> Option<&mut Obstacle> {
        self.slots.get_mut(id.0 as usize)?.as_mut()
    }

    pub fn remove(&mut self, id: ObstacleId) -> Option<Obstacle> {
        self.slots.get_mut(id.0 as usize)?.take()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Obstacle> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Spawn parameters for [`Simulation::spawn_unit`].
#[derive(Debug, Clone)]
pub struct UnitSpawn {
    pub profile: MoveProfile,
    pub pos: Vec3,
    pub team: u8,
    pub heading: i16,
    /// `None` uses the configured default strategy
    pub strategy: Option<MoveStrategy>,
}

impl UnitSpawn {
    pub fn new(profile: MoveProfile, pos: Vec3) -> Self {
        Self {
            profile,
            pos,
            team: 0,
            heading: 0,
            strategy: None,
        }
    }

    pub fn team(mut self, team: u8) -> Self {
        self.team = team;
        self
    }

    pub fn heading(mut self, heading: i16) -> Self {
        self.heading = heading;
        self
    }

    pub fn strategy(mut self, strategy: MoveStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }
}

/// What a unit keeps pointing at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointTarget {
    Position(Vec3),
    /// Resolved to the unit's position when the order is given
    Unit(UnitId),
}

/// Lockstep simulation of ground units.
pub struct Simulation {
    config: LocoConfig,
    terrain: Box<dyn TerrainSampler>,
    paths: Box<dyn PathOracle>,
    spatial: Box<dyn SpatialIndex>,
    units: UnitStore,
    obstacles: ObstacleStore,
    rng: ChaCha8Rng,
    seed: u64,
    tick: u64,
    events: Vec<MoveEvent>,
}

impl Simulation {
    pub fn new(
        config: LocoConfig,
        terrain: Box<dyn TerrainSampler>,
        paths: Box<dyn PathOracle>,
        spatial: Box<dyn SpatialIndex>,
        seed: u64,
    ) -> Self {
        Self {
            config,
            terrain,
            paths,
            spatial,
            units: UnitStore::default(),
            obstacles: ObstacleStore::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            tick: 0,
            events: Vec::new(),
        }
    }

    // ========== Bodies ==========

    pub fn spawn_unit(&mut self, spawn: UnitSpawn) -> Result<UnitId> {
        spawn.profile.validate()?;
        let id = self.units.next_id();
        let mut pos = self.terrain.clamp_in_bounds(spawn.pos);
        pos.y = self.terrain.height(pos.x, pos.z);
        let body = UnitBody::new(id, spawn.team, spawn.profile, pos, spawn.heading);
        let strategy = spawn.strategy.unwrap_or(self.config.default_strategy);
        let mover = GroundMover::new(strategy, &body);
        self.spatial.unit_moved(id, pos, body.radius());
        debug!("{}: spawned '{}' at {:?} ({:?})", id, body.profile.name, pos, strategy);
        self.units.put(Unit { body, mover });
        Ok(id)
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) -> ObstacleId {
        let (pos, radius) = (obstacle.pos, obstacle.radius);
        let id = self.obstacles.insert(obstacle);
        self.spatial.obstacle_placed(id, pos, radius);
        id
    }

    pub fn remove_obstacle(&mut self, id: ObstacleId) -> Result<Obstacle> {
        let obstacle = self.obstacles.remove(id).ok_or(LocoError::UnknownObstacle(id))?;
        self.spatial.remove_obstacle(id);
        Ok(obstacle)
    }

    // ========== Orders ==========

    pub fn start_moving(
        &mut self,
        id: UnitId,
        goal: Vec3,
        goal_radius: f32,
        speed: Option<f32>,
    ) -> Result<()> {
        self.with_unit(id, |unit, ctx| {
            unit.mover.start_moving(&mut unit.body, goal, goal_radius, speed, ctx)
        })
    }

    pub fn stop_moving(&mut self, id: UnitId) -> Result<()> {
        self.with_unit(id, |unit, ctx| unit.mover.stop_moving(&mut unit.body, ctx))
    }

    pub fn keep_pointing_to(
        &mut self,
        id: UnitId,
        target: PointTarget,
        distance: f32,
        aggressive: bool,
    ) -> Result<()> {
        let pos = match target {
            PointTarget::Position(pos) => pos,
            PointTarget::Unit(other) => {
                self.units.get(other).ok_or(LocoError::UnknownUnit(other))?.body.pos
            }
        };
        let unit = self.units.get_mut(id).ok_or(LocoError::UnknownUnit(id))?;
        unit.mover.keep_pointing_to(pos, distance, aggressive);
        Ok(())
    }

    pub fn set_max_speed(&mut self, id: UnitId, speed: f32) -> Result<()> {
        let unit = self.units.get_mut(id).ok_or(LocoError::UnknownUnit(id))?;
        unit.mover.set_max_speed(&unit.body, speed);
        Ok(())
    }

    // ========== Lifecycle hooks ==========

    /// Push a unit; returns whether it is skidding afterwards.
    pub fn apply_impulse(&mut self, id: UnitId, impulse: Vec3) -> Result<bool> {
        self.with_unit(id, |unit, ctx| {
            let cfg = &ctx.config.skid;
            unit.mover
                .on_impulse(
                    &mut unit.body,
                    impulse,
                    cfg,
                    ctx.terrain,
                    ctx.rng,
                    ctx.tick,
                    ctx.events,
                )
        })
    }

    pub fn set_in_transport(&mut self, id: UnitId) -> Result<()> {
        let unit = self.units.get_mut(id).ok_or(LocoError::UnknownUnit(id))?;
        unit.body.in_transport = true;
        Ok(())
    }

    pub fn leave_transport(&mut self, id: UnitId) -> Result<()> {
        let unit = self.units.get_mut(id).ok_or(LocoError::UnknownUnit(id))?;
        unit.mover.leave_transport(&mut unit.body);
        Ok(())
    }

    pub fn set_stunned(&mut self, id: UnitId, stunned: bool) -> Result<()> {
        self.units.get_mut(id).ok_or(LocoError::UnknownUnit(id))?.body.stunned = stunned;
        Ok(())
    }

    pub fn set_being_built(&mut self, id: UnitId, being_built: bool) -> Result<()> {
        self.units.get_mut(id).ok_or(LocoError::UnknownUnit(id))?.body.being_built = being_built;
        Ok(())
    }

    /// Release a unit `height` elmos above the ground for a controlled drop.
    pub fn drop_unit(&mut self, id: UnitId, height: f32, fall_speed: f32) -> Result<()> {
        let ground = {
            let body = &self.units.get(id).ok_or(LocoError::UnknownUnit(id))?.body;
            self.terrain.height(body.pos.x, body.pos.z)
        };
        let body = &mut self.units.get_mut(id).ok_or(LocoError::UnknownUnit(id))?.body;
        body.pos.y = ground + height.max(0.0);
        body.falling = true;
        body.fall_speed = fall_speed.max(0.0);
        body.velocity = Vec3::zeros();
        body.physical_state = PhysicalState::Flying;
        Ok(())
    }

    /// Passability changed inside a box; forwarded to the oracle.
    pub fn notify_terrain_changed(&mut self, min: Vec3, max: Vec3) {
        self.paths.terrain_changed(min, max);
    }

    // ========== Stepping ==========

    pub fn step(&mut self) {
        self.tick += 1;
        for id in self.units.ids() {
            let mark = self.events.len();
            // killed earlier this tick by another unit
            if self.with_unit(id, |unit, ctx| unit.mover.update(&mut unit.body, ctx)).is_ok() {
                self.purge_destroyed(mark);
            }
        }
        if is_slow_tick(self.tick) {
            for id in self.units.ids() {
                let mark = self.events.len();
                if self
                    .with_unit(id, |unit, ctx| unit.mover.slow_update(&mut unit.body, ctx))
                    .is_ok()
                {
                    self.purge_destroyed(mark);
                }
            }
        }
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Remove bodies killed by events raised since `mark`.
    fn purge_destroyed(&mut self, mark: usize) {
        let killed: Vec<Target> = self.events[mark..]
            .iter()
            .filter_map(|e| match e.kind {
                MoveEventKind::Killed { target, .. } => Some(target),
                _ => None,
            })
            .collect();
        for target in killed {
            match target {
                Target::Unit(id) => {
                    if let Some(unit) = self.units.take(id) {
                        if let Some(path) = unit.mover.state().path {
                            self.paths.delete_path(path);
                        }
                        self.spatial.remove_unit(id);
                        info!("{}: destroyed at {:?}", id, unit.body.pos);
                    }
                }
                Target::Obstacle(id) => {
                    if self.obstacles.remove(id).is_some() {
                        self.spatial.remove_obstacle(id);
                        debug!("{}: destroyed", id);
                    }
                }
            }
        }
    }

    /// Run `f` on one unit with the rest of the world as context.
    fn with_unit<R>(
        &mut self,
        id: UnitId,
        f: impl FnOnce(&mut Unit, &mut MoveContext<'_>) -> R,
    ) -> Result<R> {
        let mut unit = self.units.take(id).ok_or(LocoError::UnknownUnit(id))?;
        let result = {
            let mut ctx = MoveContext {
                tick: self.tick,
                config: &self.config,
                terrain: &*self.terrain,
                paths: &mut *self.paths,
                spatial: &mut *self.spatial,
                units: &mut self.units,
                obstacles: &mut self.obstacles,
                rng: &mut self.rng,
                events: &mut self.events,
            };
            f(&mut unit, &mut ctx)
        };
        self.units.put(unit);
        Ok(result)
    }

    // ========== Accessors ==========

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &LocoConfig {
        &self.config
    }

    pub fn terrain(&self) -> &dyn TerrainSampler {
        &*self.terrain
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    pub fn obstacle(&self, id: ObstacleId) -> Option<&Obstacle> {
        self.obstacles.get(id)
    }

    pub fn obstacles(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.iter()
    }

    /// Events raised since the last drain.
    pub fn events(&self) -> &[MoveEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<MoveEvent> {
        std::mem::take(&mut self.events)
    }

    // ========== State ==========

    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            version: SNAPSHOT_VERSION,
            tick: self.tick,
            config: self.config.clone(),
            units: self.units.clone(),
            obstacles: self.obstacles.clone(),
            rng_seed: self.seed,
            rng_word_pos: self.rng.get_word_pos(),
        }
    }

    /// Resume from a snapshot with fresh collaborators.
    ///
    /// Every body is registered with `spatial` and every controller that
    /// held a path asks `paths` for a new one.
    pub fn restore(
        snapshot: SimulationSnapshot,
        terrain: Box<dyn TerrainSampler>,
        paths: Box<dyn PathOracle>,
        spatial: Box<dyn SpatialIndex>,
    ) -> Result<Self> {
        snapshot.check_version()?;
        snapshot.config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(snapshot.rng_seed);
        rng.set_word_pos(snapshot.rng_word_pos);

        let mut sim = Self {
            config: snapshot.config,
            terrain,
            paths,
            spatial,
            units: snapshot.units,
            obstacles: snapshot.obstacles,
            rng,
            seed: snapshot.rng_seed,
            tick: snapshot.tick,
            events: Vec::new(),
        };
        for obstacle in sim.obstacles.iter() {
            sim.spatial.obstacle_placed(obstacle.id, obstacle.pos, obstacle.radius);
        }
        for unit in sim.units.iter() {
            sim.spatial.unit_moved(unit.body.id, unit.body.pos, unit.body.radius());
        }
        for id in sim.units.ids() {
            sim.with_unit(id, |unit, ctx| unit.mover.post_load(&mut unit.body, ctx))?;
        }
        info!("restored simulation at tick {} ({} units)", sim.tick, sim.units.len());
        Ok(sim)
    }

    /// Lockstep sync checksum: SHA-256 hex of the encoded snapshot.
    pub fn state_hash(&self) -> Result<String> {
        let bytes = self.snapshot().to_msgpack()?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }
}
