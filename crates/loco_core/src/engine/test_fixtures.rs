//! Shared builders for controller, collision and scenario tests.
//!
//! [`Harness`] holds the same pieces as a [`super::world::Simulation`] but
//! keeps them public so tests can drive single units and poke at state.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::body::{Obstacle, ObstacleId, UnitBody, UnitId};
use super::config::LocoConfig;
use super::controller::{GroundMover, MoveContext};
use super::events::MoveEvent;
use super::external::{SpatialIndex, TerrainSampler};
use super::math::Vec3;
use super::path_oracle::DirectPathOracle;
use super::profile::MoveProfile;
use super::spatial::GridSpatialIndex;
use super::strategy::MoveStrategy;
use super::terrain::HeightGrid;
use super::world::{ObstacleStore, Unit, UnitStore};

pub const TEST_SEED: u64 = 42;

pub struct Harness {
    pub config: LocoConfig,
    pub terrain: HeightGrid,
    pub paths: DirectPathOracle,
    pub spatial: GridSpatialIndex,
    pub units: UnitStore,
    pub obstacles: ObstacleStore,
    pub rng: ChaCha8Rng,
    pub events: Vec<MoveEvent>,
}

impl Harness {
    /// Flat map of `width` x `depth` squares with default tuning.
    pub fn flat(width: usize, depth: usize) -> Self {
        Self::with_terrain(HeightGrid::flat(width, depth))
    }

    pub fn with_terrain(terrain: HeightGrid) -> Self {
        Self {
            config: LocoConfig::default(),
            terrain,
            paths: DirectPathOracle::new(),
            spatial: GridSpatialIndex::default(),
            units: UnitStore::default(),
            obstacles: ObstacleStore::default(),
            rng: ChaCha8Rng::seed_from_u64(TEST_SEED),
            events: Vec::new(),
        }
    }

    pub fn add_unit(&mut self, profile: MoveProfile, pos: Vec3, team: u8) -> UnitId {
        let strategy = self.config.default_strategy;
        self.add_unit_with(profile, pos, team, strategy)
    }

    pub fn add_unit_with(
        &mut self,
        profile: MoveProfile,
        pos: Vec3,
        team: u8,
        strategy: MoveStrategy,
    ) -> UnitId {
        let id = self.units.next_id();
        let pos = Vec3::new(pos.x, self.terrain.height(pos.x, pos.z), pos.z);
        let body = UnitBody::new(id, team, profile, pos, 0);
        let mover = GroundMover::new(strategy, &body);
        self.spatial.unit_moved(id, pos, body.radius());
        self.units.put(Unit { body, mover });
        id
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) -> ObstacleId {
        let (pos, radius) = (obstacle.pos, obstacle.radius);
        let id = self.obstacles.insert(obstacle);
        self.spatial.obstacle_placed(id, pos, radius);
        id
    }

    pub fn ctx(&mut self, tick: u64) -> MoveContext<'_> {
        MoveContext {
            tick,
            config: &self.config,
            terrain: &self.terrain,
            paths: &mut self.paths,
            spatial: &mut self.spatial,
            units: &mut self.units,
            obstacles: &mut self.obstacles,
            rng: &mut self.rng,
            events: &mut self.events,
        }
    }

    /// Take one unit out, run `f` against the rest of the world, put it back.
    pub fn with_unit<R>(
        &mut self,
        id: UnitId,
        tick: u64,
        f: impl FnOnce(&mut Unit, &mut MoveContext<'_>) -> R,
    ) -> R {
        let mut unit = self.units.take(id).expect("unit present");
        let result = {
            let mut ctx = self.ctx(tick);
            f(&mut unit, &mut ctx)
        };
        self.spatial.unit_moved(id, unit.body.pos, unit.body.radius());
        self.units.put(unit);
        result
    }

    /// Run one fast-pass update for `id`.
    pub fn update(&mut self, id: UnitId, tick: u64) -> bool {
        self.with_unit(id, tick, |unit, ctx| unit.mover.update(&mut unit.body, ctx))
    }

    pub fn unit(&self, id: UnitId) -> &Unit {
        self.units.get(id).expect("unit present")
    }
}
